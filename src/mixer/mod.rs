//! The mixer object graph and the context that manages backends.
//!
//! A [`Context`] selects a [`Backend`] from a [`BackendRegistry`], falls back
//! to lower priority backends when one fails, and exposes the backend's
//! [`Device`] → [`Stream`] → [`StreamControl`]/[`Switch`] graph once the
//! connection is ready.

/// Application identity
pub mod app_info;
/// Backend contract and shared graph
pub mod backend;
/// Backend selection and event forwarding
pub mod context;
/// Sound devices
pub mod device;
/// Error types of the mixer API
pub mod error;
/// Backend module descriptors and registry
pub mod module;
/// Streams and their controls
pub mod stream;
/// Discrete option switches
pub mod switch;
/// Shared enums and flag sets
pub mod types;
/// Channel volume levels
pub mod volume;

pub use app_info::AppInfo;
pub use backend::{Backend, BackendCore, BackendEvent, Notifier};
pub use context::{AttemptOutcome, ConnectionAttempt, Context, ContextEvent};
pub use device::{Device, DeviceEvent};
pub use error::{BackendError, ContextError, ControlError, SwitchError};
pub use module::{BackendInfo, BackendModule, BackendRegistry, Constructor};
pub use stream::{
    ControlBuilder, ControlDriver, ControlEvent, Stream, StreamControl, StreamEvent,
};
pub use switch::{Switch, SwitchBuilder, SwitchDriver, SwitchKind, SwitchOption};
pub use types::{
    BackendFlags, BackendType, ChannelPosition, ControlFlags, ControlRole, DeviceSwitchRole,
    Direction, MediaRole, State, StreamSwitchFlags, StreamSwitchRole,
};
pub use volume::{Volume, VolumeRange};
