/// Switch option type
pub mod option;

use std::{
    fmt,
    sync::{Arc, RwLock, Weak},
};

use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

pub use option::SwitchOption;

use super::{
    device::Device,
    error::SwitchError,
    stream::Stream,
    types::{DeviceSwitchRole, StreamSwitchFlags, StreamSwitchRole},
};
use crate::common::{self, Property};

/// Hardware side of a switch, implemented by backends
pub trait SwitchDriver: Send + Sync {
    /// Make `option` the active option on the hardware.
    ///
    /// Returns `false` if the change was refused.
    fn set_active_option(&self, option: &SwitchOption) -> bool;

    /// Release backend resources when the switch leaves the graph.
    fn release(&self) {}
}

/// Scope and role of a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Switch owned by a device, e.g. a profile selector
    Device {
        /// Switch role
        role: DeviceSwitchRole,
    },
    /// Switch owned by a stream, e.g. a port selector
    Stream {
        /// Switch role
        role: StreamSwitchRole,
        /// Switch behaviour flags
        flags: StreamSwitchFlags,
    },
}

#[derive(Debug, Clone, Default)]
enum Owner {
    #[default]
    None,
    Device(Weak<Device>),
    Stream(Weak<Stream>),
}

/// A named discrete choice with one active option
pub struct Switch {
    name: String,
    label: String,
    kind: SwitchKind,
    options: Vec<Arc<SwitchOption>>,
    active: Property<Option<Arc<SwitchOption>>>,
    owner: RwLock<Owner>,
    driver: Option<Box<dyn SwitchDriver>>,
}

impl Switch {
    /// Start building a device-scoped switch
    pub fn for_device(
        name: impl Into<String>,
        label: impl Into<String>,
        role: DeviceSwitchRole,
    ) -> SwitchBuilder {
        SwitchBuilder::new(name.into(), label.into(), SwitchKind::Device { role })
    }

    /// Start building a stream-scoped switch
    pub fn for_stream(
        name: impl Into<String>,
        label: impl Into<String>,
        role: StreamSwitchRole,
    ) -> SwitchBuilder {
        SwitchBuilder::new(
            name.into(),
            label.into(),
            SwitchKind::Stream {
                role,
                flags: StreamSwitchFlags::empty(),
            },
        )
    }

    /// Start building a stream toggle with its "on" and "off" options
    pub fn toggle(
        name: impl Into<String>,
        label: impl Into<String>,
        role: StreamSwitchRole,
        on: SwitchOption,
        off: SwitchOption,
    ) -> SwitchBuilder {
        let kind = SwitchKind::Stream {
            role,
            flags: StreamSwitchFlags::TOGGLE,
        };
        SwitchBuilder::new(name.into(), label.into(), kind)
            .option(on)
            .option(off)
    }

    /// Identifier, unique within the owner
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Scope and role
    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    /// Whether this is an on/off toggle
    pub fn is_toggle(&self) -> bool {
        matches!(self.kind, SwitchKind::Stream { flags, .. } if flags.contains(StreamSwitchFlags::TOGGLE))
    }

    /// Whether the active option can be changed
    pub fn is_writable(&self) -> bool {
        self.driver.is_some()
    }

    /// All options in backend order
    pub fn options(&self) -> &[Arc<SwitchOption>] {
        &self.options
    }

    /// Look up an option by name
    pub fn option(&self, name: &str) -> Option<Arc<SwitchOption>> {
        self.options.iter().find(|o| o.name() == name).cloned()
    }

    /// Currently active option
    pub fn active_option(&self) -> Option<Arc<SwitchOption>> {
        self.active.get()
    }

    /// Follow the active option
    pub fn watch_active_option(&self) -> WatchStream<Option<Arc<SwitchOption>>> {
        self.active.watch()
    }

    /// Owning device, if the switch is device-scoped and the device is alive
    pub fn device(&self) -> Option<Arc<Device>> {
        match &*common::read(&self.owner) {
            Owner::Device(device) => device.upgrade(),
            _ => None,
        }
    }

    /// Owning stream, if the switch is stream-scoped and the stream is alive
    pub fn stream(&self) -> Option<Arc<Stream>> {
        match &*common::read(&self.owner) {
            Owner::Stream(stream) => stream.upgrade(),
            _ => None,
        }
    }

    /// Change the active option.
    ///
    /// The option must be one of this switch's own options. The active option
    /// only changes after the backend has applied it.
    ///
    /// # Errors
    /// Returns error if the option is foreign, the switch is read-only or the
    /// backend refuses the change.
    pub fn set_active_option(&self, option: &Arc<SwitchOption>) -> Result<(), SwitchError> {
        if !self.owns(option) {
            return Err(SwitchError::ForeignOption {
                switch: self.name.clone(),
                option: option.name().to_owned(),
            });
        }

        let Some(driver) = &self.driver else {
            return Err(SwitchError::ReadOnly(self.name.clone()));
        };

        if self
            .active
            .get()
            .is_some_and(|active| Arc::ptr_eq(&active, option))
        {
            return Ok(());
        }

        if !driver.set_active_option(option) {
            return Err(SwitchError::Rejected {
                switch: self.name.clone(),
                option: option.name().to_owned(),
            });
        }

        self.update_active_option(option);
        Ok(())
    }

    /// Change the active option, selected by name.
    ///
    /// # Errors
    /// Returns error if no such option exists or the change fails.
    pub fn set_active_option_by_name(&self, name: &str) -> Result<(), SwitchError> {
        let option = self.option(name).ok_or_else(|| SwitchError::UnknownOption {
            switch: self.name.clone(),
            option: name.to_owned(),
        })?;
        self.set_active_option(&option)
    }

    /// State of a toggle: `Some(true)` when the "on" option is active.
    ///
    /// `None` for switches that are not toggles or have no active option.
    pub fn toggle_state(&self) -> Option<bool> {
        if !self.is_toggle() {
            return None;
        }
        let active = self.active.get()?;
        Some(Arc::ptr_eq(&active, &self.options[0]))
    }

    /// Turn a toggle on or off.
    ///
    /// # Errors
    /// Returns error if the switch is not a toggle or the change fails.
    pub fn set_toggle_state(&self, state: bool) -> Result<(), SwitchError> {
        if !self.is_toggle() {
            return Err(SwitchError::NotToggle(self.name.clone()));
        }
        let option = if state {
            &self.options[0]
        } else {
            &self.options[1]
        };
        self.set_active_option(&Arc::clone(option))
    }

    /// Record an active option change reported by the backend.
    ///
    /// Returns `false` if the option is foreign or already active.
    pub(crate) fn update_active_option(&self, option: &Arc<SwitchOption>) -> bool {
        if !self.owns(option) {
            warn!(
                switch = %self.name,
                option = %option.name(),
                "Backend reported an option that does not belong to the switch"
            );
            return false;
        }

        let changed = self.active.set(Some(Arc::clone(option)));
        if changed {
            debug!(switch = %self.name, option = %option.name(), "Active option changed");
        }
        changed
    }

    pub(crate) fn attach_to_device(&self, device: &Arc<Device>) {
        *common::write(&self.owner) = Owner::Device(Arc::downgrade(device));
    }

    pub(crate) fn attach_to_stream(&self, stream: &Arc<Stream>) {
        *common::write(&self.owner) = Owner::Stream(Arc::downgrade(stream));
    }

    pub(crate) fn release(&self) {
        if let Some(driver) = &self.driver {
            driver.release();
        }
        *common::write(&self.owner) = Owner::None;
    }

    fn owns(&self, option: &Arc<SwitchOption>) -> bool {
        self.options.iter().any(|own| Arc::ptr_eq(own, option))
    }
}

impl fmt::Debug for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Switch")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("options", &self.options.len())
            .field("active", &self.active.get().map(|o| o.name().to_owned()))
            .finish()
    }
}

/// Builder for [`Switch`]
pub struct SwitchBuilder {
    name: String,
    label: String,
    kind: SwitchKind,
    options: Vec<SwitchOption>,
    active: Option<String>,
    driver: Option<Box<dyn SwitchDriver>>,
}

impl SwitchBuilder {
    fn new(name: String, label: String, kind: SwitchKind) -> Self {
        Self {
            name,
            label,
            kind,
            options: Vec::new(),
            active: None,
            driver: None,
        }
    }

    /// Append an option; options with a name already present are skipped
    pub fn option(mut self, option: SwitchOption) -> Self {
        if self.options.iter().any(|o| o.name() == option.name()) {
            warn!(switch = %self.name, option = %option.name(), "Duplicate switch option ignored");
        } else {
            self.options.push(option);
        }
        self
    }

    /// Name of the option that is initially active
    pub fn active(mut self, name: impl Into<String>) -> Self {
        self.active = Some(name.into());
        self
    }

    /// Make the switch writable through `driver`
    pub fn driver(mut self, driver: impl SwitchDriver + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Finish the switch
    pub fn build(self) -> Arc<Switch> {
        let options: Vec<Arc<SwitchOption>> = self.options.into_iter().map(Arc::new).collect();

        let active = self.active.and_then(|name| {
            let found = options.iter().find(|o| o.name() == name).cloned();
            if found.is_none() {
                warn!(switch = %self.name, option = %name, "Initial active option not found");
            }
            found
        });

        let mut kind = self.kind;
        if let SwitchKind::Stream { flags, .. } = &mut kind {
            if flags.contains(StreamSwitchFlags::TOGGLE) && options.len() != 2 {
                warn!(switch = %self.name, "Toggle needs exactly two options, treating as plain switch");
                flags.remove(StreamSwitchFlags::TOGGLE);
            }
        }

        Arc::new(Switch {
            name: self.name,
            label: self.label,
            kind,
            options,
            active: Property::new(active),
            owner: RwLock::new(Owner::None),
            driver: self.driver,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    struct Recorder {
        calls: Arc<AtomicUsize>,
        accept: Arc<AtomicBool>,
    }

    impl SwitchDriver for Recorder {
        fn set_active_option(&self, _option: &SwitchOption) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept.load(Ordering::SeqCst)
        }
    }

    fn port_switch(accept: bool) -> (Arc<Switch>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let switch = Switch::for_stream("port", "Port", StreamSwitchRole::Port)
            .option(SwitchOption::new("speaker", "Speaker"))
            .option(SwitchOption::new("headphones", "Headphones"))
            .active("speaker")
            .driver(Recorder {
                calls: Arc::clone(&calls),
                accept: Arc::new(AtomicBool::new(accept)),
            })
            .build();
        (switch, calls)
    }

    #[test]
    fn foreign_option_is_rejected_without_mutation() {
        let (switch, calls) = port_switch(true);
        let stranger = Arc::new(SwitchOption::new("headphones", "Headphones"));

        let result = switch.set_active_option(&stranger);

        assert!(matches!(result, Err(SwitchError::ForeignOption { .. })));
        assert_eq!(switch.active_option().unwrap().name(), "speaker");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn already_active_option_skips_backend() {
        let (switch, calls) = port_switch(true);
        let speaker = switch.option("speaker").unwrap();

        assert!(switch.set_active_option(&speaker).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejected_change_keeps_previous_option() {
        let (switch, calls) = port_switch(false);

        let result = switch.set_active_option_by_name("headphones");

        assert!(matches!(result, Err(SwitchError::Rejected { .. })));
        assert_eq!(switch.active_option().unwrap().name(), "speaker");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accepted_change_updates_active_option() {
        let (switch, _) = port_switch(true);

        switch.set_active_option_by_name("headphones").unwrap();

        assert_eq!(switch.active_option().unwrap().name(), "headphones");
    }

    #[test]
    fn switch_without_driver_is_read_only() {
        let switch = Switch::for_device("profile", "Profile", DeviceSwitchRole::Profile)
            .option(SwitchOption::new("stereo", "Stereo"))
            .option(SwitchOption::new("surround", "Surround"))
            .active("stereo")
            .build();

        let result = switch.set_active_option_by_name("surround");

        assert_eq!(result, Err(SwitchError::ReadOnly("profile".to_owned())));
    }

    #[test]
    fn toggle_maps_state_to_options() {
        let switch = Switch::toggle(
            "boost",
            "Boost",
            StreamSwitchRole::Boost,
            SwitchOption::new("on", "On"),
            SwitchOption::new("off", "Off"),
        )
        .active("off")
        .driver(Recorder {
            calls: Arc::new(AtomicUsize::new(0)),
            accept: Arc::new(AtomicBool::new(true)),
        })
        .build();

        assert_eq!(switch.toggle_state(), Some(false));
        switch.set_toggle_state(true).unwrap();
        assert_eq!(switch.toggle_state(), Some(true));
    }

    #[test]
    fn owner_reference_clears_when_device_is_dropped() {
        let (switch, _) = port_switch(true);
        let device = Device::new("card0", "Card", None);

        switch.attach_to_device(&device);
        assert!(switch.device().is_some());

        drop(device);
        assert!(switch.device().is_none());
    }
}
