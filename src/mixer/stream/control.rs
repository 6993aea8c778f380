use std::{
    fmt,
    sync::{Arc, RwLock, Weak},
};

use tokio::sync::broadcast;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use super::Stream;
use crate::{
    common::{self, Property},
    mixer::{
        app_info::AppInfo,
        error::ControlError,
        types::{ChannelPosition, ControlFlags, ControlRole, Direction, MediaRole},
        volume::{Volume, VolumeRange},
    },
};

const EVENTS_BUFFER_SIZE: usize = 64;

/// Hardware side of a stream control, implemented by backends
///
/// Each method is only called when the control advertises the matching
/// capability flag. Returning `false` leaves the control unchanged.
pub trait ControlDriver: Send + Sync {
    /// Apply a mute state
    fn set_mute(&self, _mute: bool) -> bool {
        false
    }

    /// Apply per-channel volume levels
    fn set_volume(&self, _volume: &Volume) -> bool {
        false
    }

    /// Current volume in decibels, for one channel or the whole control
    fn decibel(&self, _channel: Option<usize>) -> Option<f64> {
        None
    }

    /// Apply a decibel level; the resulting volume is reported back by the backend
    fn set_decibel(&self, _channel: Option<usize>, _decibel: f64) -> bool {
        false
    }

    /// Apply a left/right balance
    fn set_balance(&self, _balance: f32) -> bool {
        false
    }

    /// Apply a front/back fade
    fn set_fade(&self, _fade: f32) -> bool {
        false
    }

    /// Move the control to another stream
    fn set_stream(&self, _stream: Option<&Arc<Stream>>) -> bool {
        false
    }

    /// Whether peak monitoring is running
    fn monitor_enabled(&self) -> bool {
        false
    }

    /// Start or stop peak monitoring
    fn set_monitor_enabled(&self, _enabled: bool) -> bool {
        false
    }

    /// Release backend resources when the control leaves the graph
    fn release(&self) {}
}

struct ReadOnly;

impl ControlDriver for ReadOnly {}

/// Notifications emitted by a single control
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// The control was moved; carries the new stream name
    StreamChanged(Option<String>),
    /// Peak level sample from the monitor, 0.0 to 1.0
    MonitorValue(f64),
}

/// A volume/mute capable endpoint of a stream
///
/// Stored controls (flag [`ControlFlags::STORED`]) are owned by the backend
/// directly and carry a direction instead of a stream.
pub struct StreamControl {
    name: String,
    label: String,
    role: ControlRole,
    media_role: MediaRole,
    app_info: Option<AppInfo>,
    direction: Direction,
    channels: Vec<ChannelPosition>,
    range: VolumeRange,
    flags: Property<ControlFlags>,
    mute: Property<bool>,
    volume: Property<Volume>,
    balance: Property<f32>,
    fade: Property<f32>,
    stream: RwLock<Weak<Stream>>,
    driver: Box<dyn ControlDriver>,
    events: broadcast::Sender<ControlEvent>,
}

impl StreamControl {
    /// Start building a stream control
    pub fn builder(name: impl Into<String>, label: impl Into<String>) -> ControlBuilder {
        ControlBuilder::new(name.into(), label.into())
    }

    /// Start building a stored control for the given direction
    pub fn stored(
        name: impl Into<String>,
        label: impl Into<String>,
        direction: Direction,
    ) -> ControlBuilder {
        let mut builder = ControlBuilder::new(name.into(), label.into());
        builder.direction = direction;
        builder.flags |= ControlFlags::STORED;
        builder
    }

    /// Identifier, unique within the stream
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Capability flags
    pub fn flags(&self) -> ControlFlags {
        self.flags.get()
    }

    /// Follow capability changes
    pub fn watch_flags(&self) -> WatchStream<ControlFlags> {
        self.flags.watch()
    }

    /// What the control adjusts
    pub fn role(&self) -> ControlRole {
        self.role
    }

    /// Media role of the application behind the control
    pub fn media_role(&self) -> MediaRole {
        self.media_role
    }

    /// Application owning the control, for per-application controls
    pub fn app_info(&self) -> Option<&AppInfo> {
        self.app_info.as_ref()
    }

    /// Direction of a stored control; `Unknown` for stream controls
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the backend persists this control
    pub fn is_stored(&self) -> bool {
        self.flags().contains(ControlFlags::STORED)
    }

    /// Owning stream, if any and still alive
    pub fn stream(&self) -> Option<Arc<Stream>> {
        common::read(&self.stream).upgrade()
    }

    /// Subscribe to stream moves and monitor samples
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Number of volume channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Speaker position of a channel
    pub fn channel_position(&self, channel: usize) -> Option<ChannelPosition> {
        self.channels.get(channel).copied()
    }

    /// Whether any channel sits at `position`
    pub fn has_channel_position(&self, position: ChannelPosition) -> bool {
        self.channels.contains(&position)
    }

    /// Volume limits
    pub fn volume_range(&self) -> VolumeRange {
        self.range
    }

    /// Mute state; `false` when the mute state is not readable
    pub fn mute(&self) -> bool {
        self.flags().contains(ControlFlags::MUTE_READABLE) && self.mute.get()
    }

    /// Follow the mute state
    pub fn watch_mute(&self) -> WatchStream<bool> {
        self.mute.watch()
    }

    /// Change the mute state.
    ///
    /// # Errors
    /// Returns error if mute is not writable or the backend refuses.
    pub fn set_mute(&self, mute: bool) -> Result<(), ControlError> {
        self.require(ControlFlags::MUTE_WRITABLE, "mute")?;

        if self.mute.get() == mute {
            return Ok(());
        }
        if !self.driver.set_mute(mute) {
            return Err(self.rejected("mute"));
        }
        self.update_mute(mute);
        Ok(())
    }

    /// Loudest channel level; 0 when the volume is not readable
    pub fn volume(&self) -> u32 {
        if self.flags().contains(ControlFlags::VOLUME_READABLE) {
            self.volume.get().max()
        } else {
            0
        }
    }

    /// Level of one channel
    pub fn channel_volume(&self, channel: usize) -> Option<u32> {
        if self.flags().contains(ControlFlags::VOLUME_READABLE) {
            self.volume.get().channel(channel)
        } else {
            None
        }
    }

    /// Follow the per-channel volume
    pub fn watch_volume(&self) -> WatchStream<Volume> {
        self.volume.watch()
    }

    /// Set every channel to `level`.
    ///
    /// # Errors
    /// Returns error if volume is not writable, the level is outside the
    /// control's range or the backend refuses.
    pub fn set_volume(&self, level: u32) -> Result<(), ControlError> {
        self.require(ControlFlags::VOLUME_WRITABLE, "volume")?;
        self.check_level(level)?;

        self.apply_volume(Volume::uniform(self.channels.len(), level))
    }

    /// Set a single channel to `level`.
    ///
    /// # Errors
    /// Returns error if volume is not writable, the channel does not exist,
    /// the level is outside the range or the backend refuses.
    pub fn set_channel_volume(&self, channel: usize, level: u32) -> Result<(), ControlError> {
        self.require(ControlFlags::VOLUME_WRITABLE, "volume")?;
        self.check_level(level)?;

        let volume = self
            .volume
            .get()
            .with_channel(channel, level)
            .ok_or_else(|| ControlError::InvalidChannel {
                control: self.name.clone(),
                channel,
            })?;
        self.apply_volume(volume)
    }

    /// Volume in decibels, if the control supports it
    pub fn decibel(&self) -> Option<f64> {
        let flags = self.flags();
        if flags.contains(ControlFlags::HAS_DECIBEL | ControlFlags::VOLUME_READABLE) {
            self.driver.decibel(None)
        } else {
            None
        }
    }

    /// Volume of one channel in decibels
    pub fn channel_decibel(&self, channel: usize) -> Option<f64> {
        let flags = self.flags();
        if channel < self.channels.len()
            && flags.contains(ControlFlags::HAS_DECIBEL | ControlFlags::VOLUME_READABLE)
        {
            self.driver.decibel(Some(channel))
        } else {
            None
        }
    }

    /// Set the volume in decibels.
    ///
    /// # Errors
    /// Returns error if decibel volume is not writable or the backend refuses.
    pub fn set_decibel(&self, decibel: f64) -> Result<(), ControlError> {
        self.require(
            ControlFlags::HAS_DECIBEL | ControlFlags::VOLUME_WRITABLE,
            "decibel volume",
        )?;
        if !self.driver.set_decibel(None, decibel) {
            return Err(self.rejected("decibel volume"));
        }
        Ok(())
    }

    /// Set one channel's volume in decibels.
    ///
    /// # Errors
    /// Returns error if decibel volume is not writable, the channel does not
    /// exist or the backend refuses.
    pub fn set_channel_decibel(&self, channel: usize, decibel: f64) -> Result<(), ControlError> {
        self.require(
            ControlFlags::HAS_DECIBEL | ControlFlags::VOLUME_WRITABLE,
            "decibel volume",
        )?;
        if channel >= self.channels.len() {
            return Err(ControlError::InvalidChannel {
                control: self.name.clone(),
                channel,
            });
        }
        if !self.driver.set_decibel(Some(channel), decibel) {
            return Err(self.rejected("decibel volume"));
        }
        Ok(())
    }

    /// Left/right balance in [-1, 1]; 0 when balance is unsupported
    pub fn balance(&self) -> f32 {
        if self.flags().contains(ControlFlags::CAN_BALANCE) {
            self.balance.get()
        } else {
            0.0
        }
    }

    /// Follow the balance
    pub fn watch_balance(&self) -> WatchStream<f32> {
        self.balance.watch()
    }

    /// Change the balance.
    ///
    /// # Errors
    /// Returns error if the value is outside [-1, 1], balance is unsupported
    /// or the backend refuses.
    pub fn set_balance(&self, balance: f32) -> Result<(), ControlError> {
        check_unit_range(balance)?;
        self.require(ControlFlags::CAN_BALANCE, "balance")?;

        if self.balance.get() == balance {
            return Ok(());
        }
        if !self.driver.set_balance(balance) {
            return Err(self.rejected("balance"));
        }
        self.update_balance(balance);
        Ok(())
    }

    /// Front/back fade in [-1, 1]; 0 when fade is unsupported
    pub fn fade(&self) -> f32 {
        if self.flags().contains(ControlFlags::CAN_FADE) {
            self.fade.get()
        } else {
            0.0
        }
    }

    /// Follow the fade
    pub fn watch_fade(&self) -> WatchStream<f32> {
        self.fade.watch()
    }

    /// Change the fade.
    ///
    /// # Errors
    /// Returns error if the value is outside [-1, 1], fade is unsupported or
    /// the backend refuses.
    pub fn set_fade(&self, fade: f32) -> Result<(), ControlError> {
        check_unit_range(fade)?;
        self.require(ControlFlags::CAN_FADE, "fade")?;

        if self.fade.get() == fade {
            return Ok(());
        }
        if !self.driver.set_fade(fade) {
            return Err(self.rejected("fade"));
        }
        self.update_fade(fade);
        Ok(())
    }

    /// Whether peak monitoring is running
    pub fn monitor_enabled(&self) -> bool {
        self.flags().contains(ControlFlags::HAS_MONITOR) && self.driver.monitor_enabled()
    }

    /// Start or stop peak monitoring; samples arrive as [`ControlEvent::MonitorValue`].
    ///
    /// # Errors
    /// Returns error if monitoring is unsupported or the backend refuses.
    pub fn set_monitor_enabled(&self, enabled: bool) -> Result<(), ControlError> {
        self.require(ControlFlags::HAS_MONITOR, "monitoring")?;
        if !self.driver.set_monitor_enabled(enabled) {
            return Err(self.rejected("monitoring"));
        }
        Ok(())
    }

    /// Move the control to another stream, or detach it with `None`.
    ///
    /// # Errors
    /// Returns error if the control is not movable, the target already has a
    /// control of the same name or the backend refuses.
    pub fn set_stream(self: &Arc<Self>, stream: Option<&Arc<Stream>>) -> Result<(), ControlError> {
        self.require(ControlFlags::MOVABLE, "moving")?;

        let current = self.stream();
        let unchanged = match (&current, stream) {
            (Some(current), Some(target)) => Arc::ptr_eq(current, target),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        if let Some(target) = stream {
            if target.control(&self.name).is_some() {
                return Err(ControlError::NameTaken {
                    control: self.name.clone(),
                    stream: target.name().to_owned(),
                });
            }
        }

        if !self.driver.set_stream(stream) {
            return Err(self.rejected("moving"));
        }
        if !super::move_control(self, stream) {
            return Err(self.rejected("moving"));
        }
        Ok(())
    }

    pub(crate) fn update_mute(&self, mute: bool) -> bool {
        self.mute.set(mute)
    }

    pub(crate) fn update_volume(&self, volume: Volume) -> bool {
        self.volume.set(volume)
    }

    pub(crate) fn update_balance(&self, balance: f32) -> bool {
        self.balance.set(balance)
    }

    pub(crate) fn update_fade(&self, fade: f32) -> bool {
        self.fade.set(fade)
    }

    pub(crate) fn update_flags(&self, flags: ControlFlags) -> bool {
        self.flags.set(flags)
    }

    pub(crate) fn update_stream(&self, stream: Option<&Arc<Stream>>) {
        *common::write(&self.stream) = stream.map(Arc::downgrade).unwrap_or_default();

        let name = stream.map(|s| s.name().to_owned());
        debug!(control = %self.name, stream = ?name, "Control stream changed");
        let _ = self.events.send(ControlEvent::StreamChanged(name));
    }

    pub(crate) fn attach_to_stream(&self, stream: &Arc<Stream>) {
        *common::write(&self.stream) = Arc::downgrade(stream);
    }

    pub(crate) fn emit_monitor_value(&self, value: f64) {
        let _ = self.events.send(ControlEvent::MonitorValue(value));
    }

    pub(crate) fn release(&self) {
        self.driver.release();
        *common::write(&self.stream) = Weak::new();
    }

    fn apply_volume(&self, volume: Volume) -> Result<(), ControlError> {
        if self.volume.get() == volume {
            return Ok(());
        }
        if !self.driver.set_volume(&volume) {
            return Err(self.rejected("volume"));
        }
        self.update_volume(volume);
        Ok(())
    }

    fn check_level(&self, level: u32) -> Result<(), ControlError> {
        if self.range.contains(level) {
            Ok(())
        } else {
            Err(ControlError::OutOfRange {
                value: f64::from(level),
                min: f64::from(self.range.min),
                max: f64::from(self.range.max),
            })
        }
    }

    fn require(&self, flag: ControlFlags, operation: &'static str) -> Result<(), ControlError> {
        if self.flags().contains(flag) {
            Ok(())
        } else {
            Err(ControlError::Unsupported {
                control: self.name.clone(),
                operation,
            })
        }
    }

    fn rejected(&self, operation: &'static str) -> ControlError {
        ControlError::Rejected {
            control: self.name.clone(),
            operation,
        }
    }
}

fn check_unit_range(value: f32) -> Result<(), ControlError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ControlError::OutOfRange {
            value: f64::from(value),
            min: -1.0,
            max: 1.0,
        })
    }
}

impl fmt::Debug for StreamControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamControl")
            .field("name", &self.name)
            .field("flags", &self.flags.get())
            .field("mute", &self.mute.get())
            .field("volume", &self.volume.get())
            .field("balance", &self.balance.get())
            .field("fade", &self.fade.get())
            .finish()
    }
}

/// Builder for [`StreamControl`]
pub struct ControlBuilder {
    name: String,
    label: String,
    flags: ControlFlags,
    role: ControlRole,
    media_role: MediaRole,
    app_info: Option<AppInfo>,
    direction: Direction,
    channels: Vec<ChannelPosition>,
    range: VolumeRange,
    mute: bool,
    volume: Option<Volume>,
    balance: f32,
    fade: f32,
    driver: Option<Box<dyn ControlDriver>>,
}

impl ControlBuilder {
    fn new(name: String, label: String) -> Self {
        Self {
            name,
            label,
            flags: ControlFlags::empty(),
            role: ControlRole::Unknown,
            media_role: MediaRole::Unknown,
            app_info: None,
            direction: Direction::Unknown,
            channels: vec![ChannelPosition::Mono],
            range: VolumeRange::default(),
            mute: false,
            volume: None,
            balance: 0.0,
            fade: 0.0,
            driver: None,
        }
    }

    /// Capability flags; `STORED` is kept for stored controls
    pub fn flags(mut self, flags: ControlFlags) -> Self {
        self.flags = flags | (self.flags & ControlFlags::STORED);
        self
    }

    /// What the control adjusts
    pub fn role(mut self, role: ControlRole) -> Self {
        self.role = role;
        self
    }

    /// Media role of the owning application
    pub fn media_role(mut self, media_role: MediaRole) -> Self {
        self.media_role = media_role;
        self
    }

    /// Application owning the control
    pub fn app_info(mut self, app_info: AppInfo) -> Self {
        self.app_info = Some(app_info);
        self
    }

    /// Channel layout; defaults to a single mono channel
    pub fn channels(mut self, channels: Vec<ChannelPosition>) -> Self {
        self.channels = channels;
        self
    }

    /// Volume limits
    pub fn volume_range(mut self, range: VolumeRange) -> Self {
        self.range = range;
        self
    }

    /// Initial mute state
    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    /// Initial per-channel volume; defaults to the normal level on every channel
    pub fn volume(mut self, volume: Volume) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Initial balance, clamped to [-1, 1]
    pub fn balance(mut self, balance: f32) -> Self {
        self.balance = balance.clamp(-1.0, 1.0);
        self
    }

    /// Initial fade, clamped to [-1, 1]
    pub fn fade(mut self, fade: f32) -> Self {
        self.fade = fade.clamp(-1.0, 1.0);
        self
    }

    /// Backend implementation of the writable operations
    pub fn driver(mut self, driver: impl ControlDriver + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Finish the control
    pub fn build(self) -> Arc<StreamControl> {
        let volume = self
            .volume
            .unwrap_or_else(|| Volume::uniform(self.channels.len(), self.range.normal));
        let (events, _) = broadcast::channel(EVENTS_BUFFER_SIZE);

        Arc::new(StreamControl {
            name: self.name,
            label: self.label,
            role: self.role,
            media_role: self.media_role,
            app_info: self.app_info,
            direction: self.direction,
            channels: self.channels,
            range: self.range,
            flags: Property::new(self.flags),
            mute: Property::new(self.mute),
            volume: Property::new(volume),
            balance: Property::new(self.balance),
            fade: Property::new(self.fade),
            stream: RwLock::new(Weak::new()),
            driver: self.driver.unwrap_or_else(|| Box::new(ReadOnly)),
            events,
        })
    }
}
