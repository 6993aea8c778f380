use std::{
    fmt,
    sync::{Arc, RwLock},
};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{stream::Stream, switch::Switch};
use crate::common;

const EVENTS_BUFFER_SIZE: usize = 64;

/// Notifications emitted by a single device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A stream was added to the device
    StreamAdded(String),
    /// A stream was removed from the device
    StreamRemoved(String),
    /// A device switch was added
    SwitchAdded(String),
    /// A device switch was removed
    SwitchRemoved(String),
}

/// A hardware or software sound device
pub struct Device {
    name: String,
    label: String,
    icon: Option<String>,
    streams: RwLock<Vec<Arc<Stream>>>,
    switches: RwLock<Vec<Arc<Switch>>>,
    events: broadcast::Sender<DeviceEvent>,
}

impl Device {
    /// Create a device without streams or switches
    pub fn new(name: impl Into<String>, label: impl Into<String>, icon: Option<&str>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENTS_BUFFER_SIZE);
        Arc::new(Self {
            name: name.into(),
            label: label.into(),
            icon: icon.map(str::to_owned),
            streams: RwLock::new(Vec::new()),
            switches: RwLock::new(Vec::new()),
            events,
        })
    }

    /// Stable identifier, unique within the backend
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// XDG icon name
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Streams in backend order
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        common::read(&self.streams).clone()
    }

    /// Look up a stream by name
    pub fn stream(&self, name: &str) -> Option<Arc<Stream>> {
        common::read(&self.streams)
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Device switches in backend order
    pub fn switches(&self) -> Vec<Arc<Switch>> {
        common::read(&self.switches).clone()
    }

    /// Look up a device switch by name
    pub fn switch(&self, name: &str) -> Option<Arc<Switch>> {
        common::read(&self.switches)
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Subscribe to stream and switch membership changes
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    pub(crate) fn insert_stream(self: &Arc<Self>, stream: &Arc<Stream>) -> bool {
        {
            let mut streams = common::write(&self.streams);
            if streams.iter().any(|s| s.name() == stream.name()) {
                warn!(device = %self.name, stream = %stream.name(), "Duplicate stream ignored");
                return false;
            }
            streams.push(Arc::clone(stream));
        }
        stream.attach_to_device(self);

        debug!(device = %self.name, stream = %stream.name(), "Stream added to device");
        let _ = self
            .events
            .send(DeviceEvent::StreamAdded(stream.name().to_owned()));
        true
    }

    pub(crate) fn remove_stream(&self, name: &str) -> Option<Arc<Stream>> {
        let stream = {
            let mut streams = common::write(&self.streams);
            let position = streams.iter().position(|s| s.name() == name)?;
            streams.remove(position)
        };
        stream.release();

        let _ = self.events.send(DeviceEvent::StreamRemoved(name.to_owned()));
        Some(stream)
    }

    pub(crate) fn insert_switch(self: &Arc<Self>, switch: &Arc<Switch>) -> bool {
        {
            let mut switches = common::write(&self.switches);
            if switches.iter().any(|s| s.name() == switch.name()) {
                warn!(device = %self.name, switch = %switch.name(), "Duplicate switch ignored");
                return false;
            }
            switches.push(Arc::clone(switch));
        }
        switch.attach_to_device(self);

        let _ = self
            .events
            .send(DeviceEvent::SwitchAdded(switch.name().to_owned()));
        true
    }

    pub(crate) fn remove_switch(&self, name: &str) -> Option<Arc<Switch>> {
        let switch = {
            let mut switches = common::write(&self.switches);
            let position = switches.iter().position(|s| s.name() == name)?;
            switches.remove(position)
        };
        switch.release();

        let _ = self.events.send(DeviceEvent::SwitchRemoved(name.to_owned()));
        Some(switch)
    }

    /// Release every stream and switch when the device leaves the graph.
    ///
    /// The stream list itself is kept so the caller can announce each removal.
    pub(crate) fn release(&self) {
        for stream in common::read(&self.streams).iter() {
            stream.release();
        }
        for switch in std::mem::take(&mut *common::write(&self.switches)) {
            switch.release();
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("streams", &common::read(&self.streams).len())
            .field("switches", &common::read(&self.switches).len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mixer::{
        switch::SwitchOption,
        types::{DeviceSwitchRole, Direction},
    };

    #[test]
    fn stream_back_reference_clears_with_device() {
        let device = Device::new("card0", "Built-in Audio", Some("audio-card"));
        let stream = Stream::new("card0-out", "Speakers", Direction::Output);
        device.insert_stream(&stream);

        assert_eq!(stream.device().unwrap().name(), "card0");

        drop(device);
        assert!(stream.device().is_none());
    }

    #[test]
    fn removed_stream_is_no_longer_listed() {
        let device = Device::new("card0", "Built-in Audio", None);
        device.insert_stream(&Stream::new("out", "Out", Direction::Output));
        device.insert_stream(&Stream::new("in", "In", Direction::Input));
        let mut events = device.subscribe();

        let removed = device.remove_stream("out");

        assert!(removed.as_ref().unwrap().device().is_none());
        assert!(device.stream("out").is_none());
        assert_eq!(device.streams().len(), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            DeviceEvent::StreamRemoved("out".to_owned())
        );
    }

    #[test]
    fn released_device_detaches_its_streams() {
        let device = Device::new("card0", "Built-in Audio", None);
        let stream = Stream::new("out", "Out", Direction::Output);
        device.insert_stream(&stream);

        device.release();

        assert!(stream.device().is_none());
        assert_eq!(device.streams().len(), 1);
    }

    #[test]
    fn duplicate_switch_is_ignored() {
        let device = Device::new("card0", "Built-in Audio", None);
        let profile = || {
            Switch::for_device("profile", "Profile", DeviceSwitchRole::Profile)
                .option(SwitchOption::new("stereo", "Stereo"))
                .build()
        };

        assert!(device.insert_switch(&profile()));
        assert!(!device.insert_switch(&profile()));
        assert_eq!(device.switches().len(), 1);
        assert!(device.switch("profile").unwrap().device().is_some());
    }
}
