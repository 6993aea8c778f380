use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::events::{BackendEvent, Notifier};
use crate::{
    common,
    mixer::{
        device::Device,
        stream::{self, Stream, StreamControl},
        switch::{Switch, SwitchOption},
        types::{ControlFlags, State},
        volume::Volume,
    },
};

#[derive(Default)]
struct Topology {
    state: State,
    devices: Vec<Arc<Device>>,
    streams: Vec<Arc<Stream>>,
    stored_controls: Vec<Arc<StreamControl>>,
    default_input: Option<Arc<Stream>>,
    default_output: Option<Arc<Stream>>,
}

impl Topology {
    fn all_streams(&self) -> Vec<Arc<Stream>> {
        self.devices
            .iter()
            .flat_map(|device| device.streams())
            .chain(self.streams.iter().cloned())
            .collect()
    }

    fn has_stream(&self, name: &str) -> bool {
        self.streams.iter().any(|s| s.name() == name)
            || self.devices.iter().any(|d| d.stream(name).is_some())
    }

    fn has_device(&self, device: &Arc<Device>) -> bool {
        self.devices.iter().any(|d| Arc::ptr_eq(d, device))
    }

    /// Drop default references to removed streams, returning the notifications to send
    fn clear_defaults(&mut self, removed: &[Arc<Stream>]) -> Vec<BackendEvent> {
        let is_removed = |current: &Option<Arc<Stream>>| {
            current
                .as_ref()
                .is_some_and(|c| removed.iter().any(|r| Arc::ptr_eq(r, c)))
        };

        let mut events = Vec::new();
        if is_removed(&self.default_input) {
            self.default_input = None;
            events.push(BackendEvent::DefaultInputStreamChanged);
        }
        if is_removed(&self.default_output) {
            self.default_output = None;
            events.push(BackendEvent::DefaultOutputStreamChanged);
        }
        events
    }
}

/// Object graph and connection state shared by every backend
///
/// Backends embed a `BackendCore` and mutate the graph exclusively through
/// it. Each mutation is fully applied before its notification is sent, and
/// a name announced twice without removal in between is ignored.
#[derive(Clone)]
pub struct BackendCore {
    topology: Arc<RwLock<Topology>>,
    notifier: Notifier,
}

impl BackendCore {
    /// Create an empty, idle graph that reports to `notifier`
    pub fn new(notifier: Notifier) -> Self {
        Self {
            topology: Arc::new(RwLock::new(Topology::default())),
            notifier,
        }
    }

    /// Channel to the owning context
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Current connection state
    pub fn state(&self) -> State {
        common::read(&self.topology).state
    }

    /// Change the connection state, notifying on change
    pub fn set_state(&self, state: State) -> bool {
        {
            let mut topology = common::write(&self.topology);
            if topology.state == state {
                return false;
            }
            topology.state = state;
        }
        debug!(%state, "Backend state changed");
        self.notifier.notify(BackendEvent::StateChanged);
        true
    }

    /// Devices in announcement order
    pub fn devices(&self) -> Vec<Arc<Device>> {
        common::read(&self.topology).devices.clone()
    }

    /// Device streams in device order, followed by device-less streams
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        common::read(&self.topology).all_streams()
    }

    /// Stored controls in announcement order
    pub fn stored_controls(&self) -> Vec<Arc<StreamControl>> {
        common::read(&self.topology).stored_controls.clone()
    }

    /// Current default input stream
    pub fn default_input_stream(&self) -> Option<Arc<Stream>> {
        common::read(&self.topology).default_input.clone()
    }

    /// Current default output stream
    pub fn default_output_stream(&self) -> Option<Arc<Stream>> {
        common::read(&self.topology).default_output.clone()
    }

    /// Add a device along with any streams it already owns.
    ///
    /// The device is refused if its name, or the name of one of its streams,
    /// is already part of the graph.
    pub fn add_device(&self, device: Arc<Device>) -> bool {
        let streams = {
            let mut topology = common::write(&self.topology);
            if topology.devices.iter().any(|d| d.name() == device.name()) {
                warn!(device = %device.name(), "Backend announced a duplicate device");
                return false;
            }
            let streams = device.streams();
            if let Some(clash) = streams.iter().find(|s| topology.has_stream(s.name())) {
                warn!(
                    device = %device.name(),
                    stream = %clash.name(),
                    "Device brings a stream whose name is already taken"
                );
                return false;
            }
            topology.devices.push(Arc::clone(&device));
            streams
        };

        self.notifier
            .notify(BackendEvent::DeviceAdded(device.name().to_owned()));
        for stream in streams {
            self.notifier
                .notify(BackendEvent::StreamAdded(stream.name().to_owned()));
        }
        true
    }

    /// Remove a device, its streams and switches.
    ///
    /// Stream removals are announced before the device removal, and default
    /// streams owned by the device are cleared.
    pub fn remove_device(&self, name: &str) -> bool {
        let (device, streams, defaults) = {
            let mut topology = common::write(&self.topology);
            let Some(position) = topology.devices.iter().position(|d| d.name() == name) else {
                warn!(device = %name, "Backend removed an unknown device");
                return false;
            };
            let device = topology.devices.remove(position);
            let streams = device.streams();
            let defaults = topology.clear_defaults(&streams);
            (device, streams, defaults)
        };
        device.release();

        for stream in &streams {
            self.notifier
                .notify(BackendEvent::StreamRemoved(stream.name().to_owned()));
        }
        self.notifier
            .notify(BackendEvent::DeviceRemoved(name.to_owned()));
        self.notify_all(defaults);
        true
    }

    /// Add a stream that belongs to no device
    pub fn add_stream(&self, stream: Arc<Stream>) -> bool {
        {
            let mut topology = common::write(&self.topology);
            if topology.has_stream(stream.name()) {
                warn!(stream = %stream.name(), "Backend announced a duplicate stream");
                return false;
            }
            topology.streams.push(Arc::clone(&stream));
        }
        self.notifier
            .notify(BackendEvent::StreamAdded(stream.name().to_owned()));
        true
    }

    /// Remove a stream that belongs to no device
    pub fn remove_stream(&self, name: &str) -> bool {
        let (stream, defaults) = {
            let mut topology = common::write(&self.topology);
            let Some(position) = topology.streams.iter().position(|s| s.name() == name) else {
                warn!(stream = %name, "Backend removed an unknown stream");
                return false;
            };
            let stream = topology.streams.remove(position);
            let defaults = topology.clear_defaults(std::slice::from_ref(&stream));
            (stream, defaults)
        };
        stream.release();

        self.notifier
            .notify(BackendEvent::StreamRemoved(name.to_owned()));
        self.notify_all(defaults);
        true
    }

    /// Add a stream to a device that is part of the graph
    pub fn add_device_stream(&self, device: &Arc<Device>, stream: Arc<Stream>) -> bool {
        {
            let topology = common::read(&self.topology);
            if !topology.has_device(device) {
                warn!(device = %device.name(), "Stream added to a device outside the graph");
                return false;
            }
            if topology.has_stream(stream.name()) {
                warn!(stream = %stream.name(), "Backend announced a duplicate stream");
                return false;
            }
        }
        if !device.insert_stream(&stream) {
            return false;
        }
        self.notifier
            .notify(BackendEvent::StreamAdded(stream.name().to_owned()));
        true
    }

    /// Remove a stream from a device that is part of the graph
    pub fn remove_device_stream(&self, device: &Arc<Device>, name: &str) -> bool {
        if !common::read(&self.topology).has_device(device) {
            warn!(device = %device.name(), "Stream removed from a device outside the graph");
            return false;
        }
        let Some(stream) = device.remove_stream(name) else {
            warn!(device = %device.name(), stream = %name, "Backend removed an unknown stream");
            return false;
        };
        let defaults = common::write(&self.topology).clear_defaults(std::slice::from_ref(&stream));

        self.notifier
            .notify(BackendEvent::StreamRemoved(name.to_owned()));
        self.notify_all(defaults);
        true
    }

    /// Add a device-level switch
    pub fn add_device_switch(&self, device: &Arc<Device>, switch: &Arc<Switch>) -> bool {
        device.insert_switch(switch)
    }

    /// Remove a device-level switch
    pub fn remove_device_switch(&self, device: &Arc<Device>, name: &str) -> bool {
        device.remove_switch(name).is_some()
    }

    /// Add a control to a stream
    pub fn add_stream_control(&self, stream: &Arc<Stream>, control: &Arc<StreamControl>) -> bool {
        stream.insert_control(control)
    }

    /// Remove a control from a stream, promoting a new default control if needed
    pub fn remove_stream_control(&self, stream: &Arc<Stream>, name: &str) -> bool {
        stream.remove_control(name).is_some()
    }

    /// Add a switch to a stream
    pub fn add_stream_switch(&self, stream: &Arc<Stream>, switch: &Arc<Switch>) -> bool {
        stream.insert_switch(switch)
    }

    /// Remove a switch from a stream
    pub fn remove_stream_switch(&self, stream: &Arc<Stream>, name: &str) -> bool {
        stream.remove_switch(name).is_some()
    }

    /// Designate the default control of a stream
    pub fn set_default_control(
        &self,
        stream: &Arc<Stream>,
        control: Option<&Arc<StreamControl>>,
    ) -> bool {
        stream.set_default_control(control)
    }

    /// Add a control persisted by the backend
    pub fn add_stored_control(&self, control: Arc<StreamControl>) -> bool {
        if !control.flags().contains(ControlFlags::STORED) {
            warn!(control = %control.name(), "Stored control lacks the STORED flag");
            return false;
        }
        {
            let mut topology = common::write(&self.topology);
            if topology
                .stored_controls
                .iter()
                .any(|c| c.name() == control.name())
            {
                warn!(control = %control.name(), "Backend announced a duplicate stored control");
                return false;
            }
            topology.stored_controls.push(Arc::clone(&control));
        }
        self.notifier
            .notify(BackendEvent::StoredControlAdded(control.name().to_owned()));
        true
    }

    /// Remove a stored control
    pub fn remove_stored_control(&self, name: &str) -> bool {
        let control = {
            let mut topology = common::write(&self.topology);
            let Some(position) = topology
                .stored_controls
                .iter()
                .position(|c| c.name() == name)
            else {
                warn!(control = %name, "Backend removed an unknown stored control");
                return false;
            };
            topology.stored_controls.remove(position)
        };
        control.release();

        self.notifier
            .notify(BackendEvent::StoredControlRemoved(name.to_owned()));
        true
    }

    /// Record a new default input stream
    pub fn set_default_input_stream(&self, stream: Option<Arc<Stream>>) -> bool {
        if !self.replace_default(stream, |t| &mut t.default_input) {
            return false;
        }
        self.notifier
            .notify(BackendEvent::DefaultInputStreamChanged);
        true
    }

    /// Record a new default output stream
    pub fn set_default_output_stream(&self, stream: Option<Arc<Stream>>) -> bool {
        if !self.replace_default(stream, |t| &mut t.default_output) {
            return false;
        }
        self.notifier
            .notify(BackendEvent::DefaultOutputStreamChanged);
        true
    }

    /// Record a mute change observed on the hardware
    pub fn report_mute(&self, control: &StreamControl, mute: bool) -> bool {
        control.update_mute(mute)
    }

    /// Record a volume change observed on the hardware
    pub fn report_volume(&self, control: &StreamControl, volume: Volume) -> bool {
        control.update_volume(volume)
    }

    /// Record a balance change observed on the hardware
    pub fn report_balance(&self, control: &StreamControl, balance: f32) -> bool {
        control.update_balance(balance.clamp(-1.0, 1.0))
    }

    /// Record a fade change observed on the hardware
    pub fn report_fade(&self, control: &StreamControl, fade: f32) -> bool {
        control.update_fade(fade.clamp(-1.0, 1.0))
    }

    /// Record a capability change
    pub fn report_flags(&self, control: &StreamControl, flags: ControlFlags) -> bool {
        control.update_flags(flags)
    }

    /// Record a control moved to another stream by someone else.
    ///
    /// Returns `false` if the target already holds a control of that name.
    pub fn report_control_stream(
        &self,
        control: &Arc<StreamControl>,
        target: Option<&Arc<Stream>>,
    ) -> bool {
        stream::move_control(control, target)
    }

    /// Forward a peak level sample
    pub fn report_monitor_value(&self, control: &StreamControl, value: f64) {
        control.emit_monitor_value(value);
    }

    /// Record an active option change observed on the hardware
    pub fn report_active_option(&self, switch: &Switch, option: &Arc<SwitchOption>) -> bool {
        switch.update_active_option(option)
    }

    fn replace_default(
        &self,
        stream: Option<Arc<Stream>>,
        slot: impl FnOnce(&mut Topology) -> &mut Option<Arc<Stream>>,
    ) -> bool {
        let mut topology = common::write(&self.topology);
        let current = slot(&mut *topology);
        let unchanged = match (current.as_ref(), stream.as_ref()) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }
        *current = stream;
        true
    }

    fn notify_all(&self, events: Vec<BackendEvent>) {
        for event in events {
            self.notifier.notify(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mixer::types::Direction;

    fn core() -> (BackendCore, mpsc::UnboundedReceiver<BackendEvent>) {
        let (notifier, rx) = Notifier::channel();
        (BackendCore::new(notifier), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<BackendEvent>) -> Vec<BackendEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(core: &BackendCore) -> Vec<String> {
        core.devices().iter().map(|d| d.name().to_owned()).collect()
    }

    #[test]
    fn duplicate_device_is_ignored_without_notification() {
        let (core, mut rx) = core();

        assert!(core.add_device(Device::new("card0", "Card", None)));
        assert!(!core.add_device(Device::new("card0", "Other", None)));

        assert_eq!(core.devices()[0].label(), "Card");
        assert_eq!(
            drain(&mut rx),
            vec![BackendEvent::DeviceAdded("card0".to_owned())]
        );
    }

    #[test]
    fn adding_populated_device_announces_its_streams() {
        let (core, mut rx) = core();
        let device = Device::new("card0", "Card", None);
        device.insert_stream(&Stream::new("out", "Out", Direction::Output));

        core.add_device(device);

        assert_eq!(
            drain(&mut rx),
            vec![
                BackendEvent::DeviceAdded("card0".to_owned()),
                BackendEvent::StreamAdded("out".to_owned()),
            ]
        );
    }

    #[test]
    fn removing_device_clears_default_stream() {
        let (core, mut rx) = core();
        let device = Device::new("card0", "Card", None);
        core.add_device(Arc::clone(&device));
        let out = Stream::new("out", "Out", Direction::Output);
        core.add_device_stream(&device, Arc::clone(&out));
        core.set_default_output_stream(Some(out));
        drain(&mut rx);

        assert!(core.remove_device("card0"));

        assert!(core.default_output_stream().is_none());
        assert!(core.streams().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![
                BackendEvent::StreamRemoved("out".to_owned()),
                BackendEvent::DeviceRemoved("card0".to_owned()),
                BackendEvent::DefaultOutputStreamChanged,
            ]
        );
    }

    #[test]
    fn stream_names_are_unique_across_devices() {
        let (core, _rx) = core();
        let device = Device::new("card0", "Card", None);
        core.add_device(Arc::clone(&device));
        core.add_stream(Stream::new("net", "Network", Direction::Output));

        assert!(!core.add_device_stream(&device, Stream::new("net", "Dup", Direction::Output)));
        assert_eq!(core.streams().len(), 1);
    }

    #[test]
    fn device_with_taken_stream_name_is_refused() {
        let (core, mut rx) = core();
        core.add_stream(Stream::new("net", "Network", Direction::Output));
        drain(&mut rx);
        let device = Device::new("card0", "Card", None);
        device.insert_stream(&Stream::new("net", "Dup", Direction::Output));

        assert!(!core.add_device(device));

        assert!(core.devices().is_empty());
        assert_eq!(core.streams().len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn removed_device_stream_forgets_device() {
        let (core, _rx) = core();
        let device = Device::new("card0", "Card", None);
        core.add_device(Arc::clone(&device));
        let out = Stream::new("out", "Out", Direction::Output);
        core.add_device_stream(&device, Arc::clone(&out));

        assert!(core.remove_device_stream(&device, "out"));

        assert!(out.device().is_none());
    }

    #[test]
    fn removed_device_releases_streams_held_elsewhere() {
        let (core, _rx) = core();
        let device = Device::new("card0", "Card", None);
        let out = Stream::new("out", "Out", Direction::Output);
        device.insert_stream(&out);
        core.add_device(Arc::clone(&device));

        core.remove_device("card0");

        assert!(out.device().is_none());
    }

    #[test]
    fn control_move_onto_taken_name_is_refused() {
        let (core, _rx) = core();
        let source = Stream::new("a", "A", Direction::Output);
        let target = Stream::new("b", "B", Direction::Output);
        let app = StreamControl::builder("app", "App").build();
        core.add_stream_control(&source, &app);
        core.add_stream_control(&target, &StreamControl::builder("app", "Other").build());

        assert!(!core.report_control_stream(&app, Some(&target)));

        assert!(source.control("app").is_some());
        assert!(Arc::ptr_eq(&app.stream().unwrap(), &source));
    }

    #[test]
    fn stored_control_requires_stored_flag() {
        let (core, mut rx) = core();
        let plain = StreamControl::builder("app", "App").build();
        let stored = StreamControl::stored("app", "App", Direction::Output).build();

        assert!(!core.add_stored_control(plain));
        assert!(core.add_stored_control(stored));
        assert!(core.remove_stored_control("app"));
        assert!(core.stored_controls().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![
                BackendEvent::StoredControlAdded("app".to_owned()),
                BackendEvent::StoredControlRemoved("app".to_owned()),
            ]
        );
    }

    #[test]
    fn unchanged_state_is_not_announced() {
        let (core, mut rx) = core();

        assert!(core.set_state(State::Ready));
        assert!(!core.set_state(State::Ready));
        assert_eq!(drain(&mut rx), vec![BackendEvent::StateChanged]);
    }

    proptest! {
        #[test]
        fn device_list_tracks_add_remove_sequence(
            ops in prop::collection::vec((any::<bool>(), 0usize..5), 0..64)
        ) {
            let (core, mut rx) = core();
            let mut model: Vec<String> = Vec::new();

            for (add, index) in ops {
                let name = format!("card{index}");
                if add {
                    let added = core.add_device(Device::new(name.clone(), "Card", None));
                    prop_assert_eq!(added, !model.contains(&name));
                    if added {
                        model.push(name);
                    }
                } else {
                    let removed = core.remove_device(&name);
                    prop_assert_eq!(removed, model.contains(&name));
                    model.retain(|n| n != &name);
                }
                prop_assert_eq!(&names(&core), &model);
            }

            let mut live: Vec<String> = Vec::new();
            for event in drain(&mut rx) {
                match event {
                    BackendEvent::DeviceAdded(name) => {
                        prop_assert!(!live.contains(&name));
                        live.push(name);
                    }
                    BackendEvent::DeviceRemoved(name) => {
                        prop_assert!(live.contains(&name));
                        live.retain(|n| n != &name);
                    }
                    _ => {}
                }
            }
            prop_assert_eq!(live, model);
        }
    }
}
