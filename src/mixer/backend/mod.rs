/// Shared object graph embedded by every backend
pub mod core;
/// Backend to context notifications
pub mod events;

use std::sync::Arc;

pub use self::{
    core::BackendCore,
    events::{BackendEvent, Notifier},
};
use super::{
    app_info::AppInfo,
    device::Device,
    error::ContextError,
    stream::{Stream, StreamControl},
    types::{Direction, State},
};

/// Contract between the context and one concrete sound subsystem adapter
///
/// An adapter owns a [`BackendCore`] and keeps it in sync with the sound
/// subsystem. All graph reads are served from that core, so the default
/// methods give name lookups that always agree with the lists.
pub trait Backend: Send {
    /// Graph and connection state maintained by the adapter
    fn core(&self) -> &BackendCore;

    /// Start connecting.
    ///
    /// Returns `false` on immediate failure. On success the state must be
    /// `Connecting` or `Ready`.
    fn open(&mut self) -> bool;

    /// Release the connection
    fn close(&mut self) {}

    /// Application metadata to announce to the sound subsystem
    fn set_app_info(&mut self, _info: &AppInfo) {}

    /// Address of the sound server to connect to
    fn set_server_address(&mut self, _address: Option<&str>) {}

    /// Current connection state
    fn state(&self) -> State {
        self.core().state()
    }

    /// Devices in announcement order
    fn list_devices(&self) -> Vec<Arc<Device>> {
        self.core().devices()
    }

    /// Every stream, device-owned ones first
    fn list_streams(&self) -> Vec<Arc<Stream>> {
        self.core().streams()
    }

    /// Controls persisted by the backend
    fn list_stored_controls(&self) -> Vec<Arc<StreamControl>> {
        self.core().stored_controls()
    }

    /// Look up a device by name
    fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.list_devices().into_iter().find(|d| d.name() == name)
    }

    /// Look up a stream by name
    fn stream(&self, name: &str) -> Option<Arc<Stream>> {
        self.list_streams().into_iter().find(|s| s.name() == name)
    }

    /// Look up a stored control by name
    fn stored_control(&self, name: &str) -> Option<Arc<StreamControl>> {
        self.list_stored_controls()
            .into_iter()
            .find(|c| c.name() == name)
    }

    /// Current default input stream
    fn default_input_stream(&self) -> Option<Arc<Stream>> {
        self.core().default_input_stream()
    }

    /// Current default output stream
    fn default_output_stream(&self) -> Option<Arc<Stream>> {
        self.core().default_output_stream()
    }

    /// Make `stream` the default input on the sound subsystem.
    ///
    /// Only called for input streams of this backend that are not already
    /// the default. Returns `false` if the subsystem refused.
    fn apply_default_input_stream(&mut self, _stream: &Arc<Stream>) -> bool {
        false
    }

    /// Make `stream` the default output on the sound subsystem
    fn apply_default_output_stream(&mut self, _stream: &Arc<Stream>) -> bool {
        false
    }
}

/// Change a backend's default stream for `direction`.
///
/// The stream must belong to the backend and match the direction. The
/// recorded default only changes after the adapter accepted it.
pub(crate) fn set_default_stream(
    backend: &mut dyn Backend,
    stream: &Arc<Stream>,
    direction: Direction,
) -> Result<(), ContextError> {
    if stream.direction() != direction {
        return Err(ContextError::WrongDirection {
            stream: stream.name().to_owned(),
            expected: direction,
        });
    }

    let owned = backend
        .stream(stream.name())
        .is_some_and(|own| Arc::ptr_eq(&own, stream));
    if !owned {
        return Err(ContextError::UnknownStream(stream.name().to_owned()));
    }

    let current = match direction {
        Direction::Input => backend.default_input_stream(),
        _ => backend.default_output_stream(),
    };
    if current.is_some_and(|current| Arc::ptr_eq(&current, stream)) {
        return Ok(());
    }

    let applied = match direction {
        Direction::Input => backend.apply_default_input_stream(stream),
        _ => backend.apply_default_output_stream(stream),
    };
    if !applied {
        return Err(ContextError::Rejected("changing the default stream"));
    }

    let core = backend.core();
    match direction {
        Direction::Input => core.set_default_input_stream(Some(Arc::clone(stream))),
        _ => core.set_default_output_stream(Some(Arc::clone(stream))),
    };
    Ok(())
}
