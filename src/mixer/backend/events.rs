use tokio::sync::mpsc;
use tracing::trace;

/// Notifications a backend sends to the context that owns it
///
/// Entity notifications carry only a name; the receiver looks the entity up
/// through the backend so it always sees current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// The backend connection state changed; read it with `Backend::state`
    StateChanged,
    /// A device was added
    DeviceAdded(String),
    /// A device was removed
    DeviceRemoved(String),
    /// A stream was added
    StreamAdded(String),
    /// A stream was removed
    StreamRemoved(String),
    /// A stored control was added
    StoredControlAdded(String),
    /// A stored control was removed
    StoredControlRemoved(String),
    /// The default input stream changed
    DefaultInputStreamChanged,
    /// The default output stream changed
    DefaultOutputStreamChanged,
}

/// Sending half of a backend instance's notification channel
///
/// Each backend instance gets its own channel. Once the context drops the
/// receiving half, notifications are silently discarded.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<BackendEvent>,
}

impl Notifier {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<BackendEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A notifier nobody listens to, for backends used outside a context
    pub fn detached() -> Self {
        let (notifier, _) = Self::channel();
        notifier
    }

    /// Send a notification to the owning context
    pub fn notify(&self, event: BackendEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!(event = ?err.0, "Dropping notification of a detached backend");
        }
    }

    /// Whether the owning context stopped listening
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }
}
