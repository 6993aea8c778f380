/// Volume/mute controls owned by streams
pub mod control;

use std::{
    fmt,
    sync::{Arc, RwLock, Weak},
};

use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use control::{ControlBuilder, ControlDriver, ControlEvent, StreamControl};

use super::{device::Device, switch::Switch, types::Direction};
use crate::common;

const EVENTS_BUFFER_SIZE: usize = 64;

/// Notifications emitted by a single stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A control was added
    ControlAdded(String),
    /// A control was removed and can no longer be looked up
    ControlRemoved(String),
    /// A switch was added
    SwitchAdded(String),
    /// A switch was removed and can no longer be looked up
    SwitchRemoved(String),
    /// The effective default control changed
    DefaultControlChanged(Option<String>),
}

/// An input or output signal path
///
/// A stream owns its controls and switches. The owning device is only
/// referenced weakly and reads as `None` once the device is gone.
pub struct Stream {
    name: String,
    label: String,
    direction: Direction,
    device: RwLock<Weak<Device>>,
    controls: RwLock<Vec<Arc<StreamControl>>>,
    switches: RwLock<Vec<Arc<Switch>>>,
    default_control: RwLock<Option<Arc<StreamControl>>>,
    events: broadcast::Sender<StreamEvent>,
}

impl Stream {
    /// Create an empty stream
    pub fn new(name: impl Into<String>, label: impl Into<String>, direction: Direction) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENTS_BUFFER_SIZE);
        Arc::new(Self {
            name: name.into(),
            label: label.into(),
            direction,
            device: RwLock::new(Weak::new()),
            controls: RwLock::new(Vec::new()),
            switches: RwLock::new(Vec::new()),
            default_control: RwLock::new(None),
            events,
        })
    }

    /// Identifier, unique within the backend
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Signal direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Owning device; `None` for device-less streams or once the device is gone
    pub fn device(&self) -> Option<Arc<Device>> {
        common::read(&self.device).upgrade()
    }

    /// Controls in backend order
    pub fn controls(&self) -> Vec<Arc<StreamControl>> {
        common::read(&self.controls).clone()
    }

    /// Look up a control by name
    pub fn control(&self, name: &str) -> Option<Arc<StreamControl>> {
        common::read(&self.controls)
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Switches in backend order
    pub fn switches(&self) -> Vec<Arc<Switch>> {
        common::read(&self.switches).clone()
    }

    /// Look up a switch by name
    pub fn switch(&self, name: &str) -> Option<Arc<Switch>> {
        common::read(&self.switches)
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// The control applications should adjust by default.
    ///
    /// Falls back to the first control when the backend designated none.
    pub fn default_control(&self) -> Option<Arc<StreamControl>> {
        let explicit = common::read(&self.default_control).clone();
        explicit.or_else(|| common::read(&self.controls).first().cloned())
    }

    /// Subscribe to control, switch and default-control changes
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub(crate) fn attach_to_device(&self, device: &Arc<Device>) {
        *common::write(&self.device) = Arc::downgrade(device);
    }

    pub(crate) fn insert_control(self: &Arc<Self>, control: &Arc<StreamControl>) -> bool {
        let before = self.default_name();
        {
            let mut controls = common::write(&self.controls);
            if controls.iter().any(|c| c.name() == control.name()) {
                warn!(stream = %self.name, control = %control.name(), "Duplicate control ignored");
                return false;
            }
            controls.push(Arc::clone(control));
        }
        control.attach_to_stream(self);

        debug!(stream = %self.name, control = %control.name(), "Control added");
        self.emit(StreamEvent::ControlAdded(control.name().to_owned()));
        self.emit_default_change(before);
        true
    }

    /// Unlink a control without releasing it, promoting a new default if needed
    pub(crate) fn detach_control(&self, name: &str) -> Option<Arc<StreamControl>> {
        let before = self.default_name();
        let control = {
            let mut controls = common::write(&self.controls);
            let position = controls.iter().position(|c| c.name() == name)?;
            let control = controls.remove(position);

            let mut default = common::write(&self.default_control);
            if default.as_ref().is_some_and(|d| Arc::ptr_eq(d, &control)) {
                *default = controls.first().cloned();
            }
            control
        };

        self.emit_default_change(before);
        debug!(stream = %self.name, control = %name, "Control removed");
        self.emit(StreamEvent::ControlRemoved(name.to_owned()));
        Some(control)
    }

    pub(crate) fn remove_control(&self, name: &str) -> Option<Arc<StreamControl>> {
        let found = self.control(name)?;
        found.release();
        self.detach_control(name)
    }

    pub(crate) fn insert_switch(self: &Arc<Self>, switch: &Arc<Switch>) -> bool {
        {
            let mut switches = common::write(&self.switches);
            if switches.iter().any(|s| s.name() == switch.name()) {
                warn!(stream = %self.name, switch = %switch.name(), "Duplicate switch ignored");
                return false;
            }
            switches.push(Arc::clone(switch));
        }
        switch.attach_to_stream(self);
        self.emit(StreamEvent::SwitchAdded(switch.name().to_owned()));
        true
    }

    pub(crate) fn remove_switch(&self, name: &str) -> Option<Arc<Switch>> {
        let switch = {
            let mut switches = common::write(&self.switches);
            let position = switches.iter().position(|s| s.name() == name)?;
            switches.remove(position)
        };
        switch.release();
        self.emit(StreamEvent::SwitchRemoved(name.to_owned()));
        Some(switch)
    }

    /// Designate the default control; it must be one of this stream's controls
    pub(crate) fn set_default_control(&self, control: Option<&Arc<StreamControl>>) -> bool {
        let before = self.default_name();
        {
            let controls = common::read(&self.controls);
            if let Some(control) = control {
                if !controls.iter().any(|c| Arc::ptr_eq(c, control)) {
                    warn!(
                        stream = %self.name,
                        control = %control.name(),
                        "Default control does not belong to the stream"
                    );
                    return false;
                }
            }
            *common::write(&self.default_control) = control.cloned();
        }
        self.emit_default_change(before);
        true
    }

    /// Release every control and switch when the stream leaves the graph
    pub(crate) fn release(&self) {
        *common::write(&self.device) = Weak::new();
        let controls = std::mem::take(&mut *common::write(&self.controls));
        let switches = std::mem::take(&mut *common::write(&self.switches));
        *common::write(&self.default_control) = None;

        for control in &controls {
            control.release();
        }
        for switch in &switches {
            switch.release();
        }
    }

    fn default_name(&self) -> Option<String> {
        self.default_control().map(|c| c.name().to_owned())
    }

    fn emit_default_change(&self, before: Option<String>) {
        let after = self.default_name();
        if before != after {
            debug!(stream = %self.name, control = ?after, "Default control changed");
            self.emit(StreamEvent::DefaultControlChanged(after));
        }
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("controls", &common::read(&self.controls).len())
            .field("switches", &common::read(&self.switches).len())
            .finish()
    }
}

/// Move `control` into `target`, or out of any stream with `None`.
///
/// Returns `false` and leaves the control where it was if `target` already
/// holds a different control of the same name.
pub(crate) fn move_control(control: &Arc<StreamControl>, target: Option<&Arc<Stream>>) -> bool {
    if let Some(target) = target {
        if target
            .control(control.name())
            .is_some_and(|resident| !Arc::ptr_eq(&resident, control))
        {
            warn!(
                stream = %target.name(),
                control = %control.name(),
                "Control name already taken in target stream"
            );
            return false;
        }
    }

    let source = control.stream();
    if let Some(source) = &source {
        source.detach_control(control.name());
    }
    if let Some(target) = target {
        if !target.insert_control(control) {
            if let Some(source) = &source {
                source.insert_control(control);
            }
            return false;
        }
    }
    control.update_stream(target);
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mixer::types::ControlFlags;

    fn control(name: &str) -> Arc<StreamControl> {
        StreamControl::builder(name, name)
            .flags(ControlFlags::VOLUME_READABLE)
            .build()
    }

    fn stream_with(names: &[&str]) -> Arc<Stream> {
        let stream = Stream::new("sink", "Sink", Direction::Output);
        for name in names {
            stream.insert_control(&control(name));
        }
        stream
    }

    #[test]
    fn default_control_falls_back_to_first() {
        let stream = stream_with(&["master", "pcm"]);

        assert_eq!(stream.default_control().unwrap().name(), "master");
    }

    #[test]
    fn duplicate_control_name_is_ignored() {
        let stream = stream_with(&["master"]);

        assert!(!stream.insert_control(&control("master")));
        assert_eq!(stream.controls().len(), 1);
    }

    #[test]
    fn removing_default_promotes_first_remaining() {
        let stream = stream_with(&["master", "pcm", "speaker"]);
        let speaker = stream.control("speaker").unwrap();
        stream.set_default_control(Some(&speaker));

        stream.remove_control("speaker");

        assert_eq!(stream.default_control().unwrap().name(), "master");
        assert!(stream.control("speaker").is_none());
        assert!(speaker.stream().is_none());
    }

    #[test]
    fn removing_last_control_leaves_no_default() {
        let stream = stream_with(&["master"]);
        let master = stream.control("master").unwrap();
        stream.set_default_control(Some(&master));

        stream.remove_control("master");

        assert!(stream.default_control().is_none());
    }

    #[test]
    fn removal_events_arrive_after_unlinking() {
        let stream = stream_with(&["master", "pcm"]);
        let mut events = stream.subscribe();

        stream.remove_control("master");

        assert_eq!(
            events.try_recv().unwrap(),
            StreamEvent::DefaultControlChanged(Some("pcm".to_owned()))
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StreamEvent::ControlRemoved("master".to_owned())
        );
    }

    #[test]
    fn foreign_default_control_is_refused() {
        let stream = stream_with(&["master"]);
        let stranger = control("other");

        assert!(!stream.set_default_control(Some(&stranger)));
        assert_eq!(stream.default_control().unwrap().name(), "master");
    }

    #[test]
    fn control_back_reference_clears_with_stream() {
        let stream = stream_with(&["master"]);
        let master = stream.control("master").unwrap();

        drop(stream);

        assert!(master.stream().is_none());
    }

    #[test]
    fn move_control_relinks_both_streams() {
        let source = stream_with(&["app"]);
        let target = Stream::new("headset", "Headset", Direction::Output);
        let app = source.control("app").unwrap();

        move_control(&app, Some(&target));

        assert!(source.control("app").is_none());
        assert!(target.control("app").is_some());
        assert!(Arc::ptr_eq(&app.stream().unwrap(), &target));
    }

    #[test]
    fn move_control_refuses_taken_name() {
        let source = stream_with(&["app"]);
        let target = stream_with(&["app"]);
        let app = source.control("app").unwrap();
        let resident = target.control("app").unwrap();

        assert!(!move_control(&app, Some(&target)));

        assert!(Arc::ptr_eq(&source.control("app").unwrap(), &app));
        assert!(Arc::ptr_eq(&app.stream().unwrap(), &source));
        assert!(Arc::ptr_eq(&target.control("app").unwrap(), &resident));
    }

    #[test]
    fn released_stream_forgets_its_device() {
        let device = Device::new("card0", "Card", None);
        let stream = Stream::new("out", "Out", Direction::Output);
        device.insert_stream(&stream);

        stream.release();

        assert!(stream.device().is_none());
    }
}
