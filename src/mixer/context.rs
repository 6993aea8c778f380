use std::{fmt, sync::Arc};

use tokio::sync::{
    broadcast,
    mpsc::{self, error::TryRecvError},
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, instrument, trace, warn};

use super::{
    app_info::AppInfo,
    backend::{self, Backend, BackendEvent, Notifier},
    device::Device,
    error::ContextError,
    module::{BackendInfo, BackendModule, BackendRegistry},
    stream::{Stream, StreamControl},
    types::{BackendFlags, BackendType, Direction, State},
};
use crate::{common::Property, config::Config};

const EVENTS_BUFFER_SIZE: usize = 256;

/// Notifications the context re-broadcasts to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    /// The context connection state changed
    StateChanged(State),
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
    /// The default input stream changed; carries the new stream name
    DefaultInputStreamChanged(Option<String>),
    /// The default output stream changed; carries the new stream name
    DefaultOutputStreamChanged(Option<String>),
}

/// How a backend candidate fared during the current open cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Opened and reported `Connecting` or `Ready`
    Connected(State),
    /// The module could not build a backend
    Unavailable(String),
    /// `open` reported immediate failure
    OpenFailed,
    /// `open` succeeded but left the backend in an unexpected state
    InvalidState(State),
    /// The backend failed after opening
    FailedAsync,
}

/// One entry of the connection debug record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// Module name
    pub backend: String,
    /// Sound subsystem of the module
    pub backend_type: BackendType,
    /// Result of the attempt
    pub outcome: AttemptOutcome,
}

struct ActiveBackend {
    index: usize,
    info: BackendInfo,
    backend: Box<dyn Backend>,
    notifications: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    chosen: bool,
    state_pending: bool,
}

/// Entry point for applications
///
/// A context picks a backend from the registry, keeps the connection state
/// and exposes the active backend's object graph once it is `Ready`.
/// Backend notifications are processed when the application drives the
/// context with [`Context::dispatch`] or [`Context::dispatch_pending`].
pub struct Context {
    registry: Arc<BackendRegistry>,
    backend_type: BackendType,
    app_info: AppInfo,
    server_address: Option<String>,
    state: Property<State>,
    active: Option<ActiveBackend>,
    events: broadcast::Sender<ContextEvent>,
    attempts: Vec<ConnectionAttempt>,
}

impl Context {
    /// Create an idle context that picks backends from `registry`
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        let (events, _) = broadcast::channel(EVENTS_BUFFER_SIZE);
        Self {
            registry,
            backend_type: BackendType::Unknown,
            app_info: AppInfo::default(),
            server_address: None,
            state: Property::new(State::Idle),
            active: None,
            events,
            attempts: Vec::new(),
        }
    }

    /// Current connection state
    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Follow the connection state
    pub fn watch_state(&self) -> WatchStream<State> {
        self.state.watch()
    }

    /// Subscribe to re-broadcast backend events
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Stream of re-broadcast backend events.
    ///
    /// Events missed by a slow consumer are skipped with a warning.
    pub fn events(&self) -> impl futures::Stream<Item = ContextEvent> + Send + use<> {
        let mut rx = self.events.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Context event consumer lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Every backend candidate tried since the last [`Context::open`]
    pub fn connection_attempts(&self) -> &[ConnectionAttempt] {
        &self.attempts
    }

    /// Backend type requested with [`Context::set_backend_type`]
    pub fn requested_backend_type(&self) -> BackendType {
        self.backend_type
    }

    /// Pin a backend type, or restore auto-detection with `Unknown`.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_backend_type(&mut self, backend_type: BackendType) -> Result<(), ContextError> {
        self.ensure_idle()?;

        if backend_type != BackendType::Unknown && self.registry.find(backend_type).is_none() {
            warn!(%backend_type, "No registered module implements the requested backend");
        }
        self.backend_type = backend_type;
        Ok(())
    }

    /// Sound server address passed to backends
    pub fn server_address(&self) -> Option<&str> {
        self.server_address.as_deref()
    }

    /// Set the sound server address; `None` uses the backend's default.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_server_address(&mut self, address: Option<&str>) -> Result<(), ContextError> {
        self.ensure_idle()?;
        self.server_address = address.map(str::to_owned);
        Ok(())
    }

    /// Application metadata passed to backends
    pub fn app_info(&self) -> &AppInfo {
        &self.app_info
    }

    /// Replace the application metadata.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_app_info(&mut self, app_info: AppInfo) -> Result<(), ContextError> {
        self.ensure_idle()?;
        self.app_info = app_info;
        Ok(())
    }

    /// Set the application name.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_app_name(&mut self, name: Option<&str>) -> Result<(), ContextError> {
        self.ensure_idle()?;
        self.app_info.name = name.map(str::to_owned);
        Ok(())
    }

    /// Set the application identifier, e.g. a reverse-DNS id.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_app_id(&mut self, id: Option<&str>) -> Result<(), ContextError> {
        self.ensure_idle()?;
        self.app_info.id = id.map(str::to_owned);
        Ok(())
    }

    /// Set the application version.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_app_version(&mut self, version: Option<&str>) -> Result<(), ContextError> {
        self.ensure_idle()?;
        self.app_info.version = version.map(str::to_owned);
        Ok(())
    }

    /// Set the application icon name.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn set_app_icon(&mut self, icon: Option<&str>) -> Result<(), ContextError> {
        self.ensure_idle()?;
        self.app_info.icon = icon.map(str::to_owned);
        Ok(())
    }

    /// Apply backend and application settings from a configuration file.
    ///
    /// # Errors
    /// Returns error while connecting or connected.
    pub fn configure(&mut self, config: &Config) -> Result<(), ContextError> {
        self.set_backend_type(config.backend.backend_type)?;
        self.set_server_address(config.backend.server_address.as_deref())?;
        self.set_app_info(config.app.clone())
    }

    /// Connect to a sound subsystem.
    ///
    /// With a pinned backend type only that backend is tried. Otherwise the
    /// registered backends are tried in priority order until one opens. The
    /// context may still be `Connecting` on return; keep dispatching until it
    /// settles.
    ///
    /// # Errors
    /// Returns error if the context is busy or no backend could be opened.
    #[instrument(skip(self), fields(backend_type = %self.backend_type))]
    pub fn open(&mut self) -> Result<(), ContextError> {
        let state = self.state.get();
        if matches!(state, State::Connecting | State::Ready) {
            return Err(ContextError::Busy(state));
        }
        self.attempts.clear();

        if self.is_pinned() {
            let Some(index) = self.registry.find(self.backend_type) else {
                warn!("Requested backend is not available");
                self.change_state(State::Failed);
                return Err(ContextError::BackendUnavailable(self.backend_type));
            };
            return self.try_candidates_from(index);
        }

        if self.registry.is_empty() {
            warn!("No backend modules registered");
            self.change_state(State::Failed);
            return Err(ContextError::NoBackendAvailable);
        }
        self.try_candidates_from(0)
    }

    /// Disconnect and return to `Idle`.
    ///
    /// Pending notifications of the closed backend are discarded, including
    /// ones it sends later.
    #[instrument(skip(self))]
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(backend = %active.info.name, "Closing backend");
            shutdown(active);
        }
        self.change_state(State::Idle);
    }

    /// Process every queued backend notification without waiting.
    ///
    /// Returns the number of notifications handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.try_next_notification() {
            self.handle_notification(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next backend notification and process it.
    ///
    /// Returns `false` if no backend is listening.
    pub async fn dispatch(&mut self) -> bool {
        if let Some(event) = self.take_pending_state() {
            self.handle_notification(event);
            return true;
        }

        let received = {
            let Some(rx) = self
                .active
                .as_mut()
                .and_then(|active| active.notifications.as_mut())
            else {
                return false;
            };
            rx.recv().await
        };

        match received {
            Some(event) => self.handle_notification(event),
            None => self.handle_lost_notifier(),
        }
        true
    }

    /// Dispatch notifications until the context leaves `Connecting`
    pub async fn wait_until_settled(&mut self) -> State {
        while self.state.get() == State::Connecting {
            if !self.dispatch().await {
                break;
            }
        }
        self.state.get()
    }

    /// Name of the backend in use, once it has been `Ready`
    pub fn backend_name(&self) -> Option<&str> {
        self.chosen().map(|active| active.info.name.as_str())
    }

    /// Type of the backend in use, `Unknown` before it has been `Ready`
    pub fn backend_type(&self) -> BackendType {
        self.chosen()
            .map_or(BackendType::Unknown, |active| active.info.backend_type)
    }

    /// Capabilities of the backend in use, empty before it has been `Ready`
    pub fn backend_flags(&self) -> BackendFlags {
        self.chosen()
            .map_or(BackendFlags::empty(), |active| active.info.flags)
    }

    /// Look up a device by name; `None` unless `Ready`
    pub fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.ready_backend()?.device(name)
    }

    /// Look up a stream by name; `None` unless `Ready`
    pub fn stream(&self, name: &str) -> Option<Arc<Stream>> {
        self.ready_backend()?.stream(name)
    }

    /// Look up a stored control by name; `None` unless `Ready`
    pub fn stored_control(&self, name: &str) -> Option<Arc<StreamControl>> {
        self.ready_backend()?.stored_control(name)
    }

    /// Devices in announcement order; empty unless `Ready`
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.ready_backend()
            .map(|backend| backend.list_devices())
            .unwrap_or_default()
    }

    /// All streams; empty unless `Ready`
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        self.ready_backend()
            .map(|backend| backend.list_streams())
            .unwrap_or_default()
    }

    /// Stored controls; empty unless `Ready`
    pub fn stored_controls(&self) -> Vec<Arc<StreamControl>> {
        self.ready_backend()
            .map(|backend| backend.list_stored_controls())
            .unwrap_or_default()
    }

    /// Default input stream; `None` unless `Ready`
    pub fn default_input_stream(&self) -> Option<Arc<Stream>> {
        self.ready_backend()?.default_input_stream()
    }

    /// Default output stream; `None` unless `Ready`
    pub fn default_output_stream(&self) -> Option<Arc<Stream>> {
        self.ready_backend()?.default_output_stream()
    }

    /// Make an input stream the default input.
    ///
    /// # Errors
    /// Returns error if the context is not `Ready`, the backend cannot change
    /// the default input, the stream is not a known input stream or the
    /// backend refuses.
    pub fn set_default_input_stream(&mut self, stream: &Arc<Stream>) -> Result<(), ContextError> {
        self.set_default_stream(
            stream,
            Direction::Input,
            BackendFlags::CAN_SET_DEFAULT_INPUT_STREAM,
        )
    }

    /// Make an output stream the default output.
    ///
    /// # Errors
    /// Returns error if the context is not `Ready`, the backend cannot change
    /// the default output, the stream is not a known output stream or the
    /// backend refuses.
    pub fn set_default_output_stream(&mut self, stream: &Arc<Stream>) -> Result<(), ContextError> {
        self.set_default_stream(
            stream,
            Direction::Output,
            BackendFlags::CAN_SET_DEFAULT_OUTPUT_STREAM,
        )
    }

    fn set_default_stream(
        &mut self,
        stream: &Arc<Stream>,
        direction: Direction,
        capability: BackendFlags,
    ) -> Result<(), ContextError> {
        let state = self.state.get();
        let Some(active) = self.active.as_mut().filter(|_| state == State::Ready) else {
            return Err(ContextError::NotReady(state));
        };
        if !active.info.flags.contains(capability) {
            return Err(ContextError::Unsupported("changing the default stream"));
        }
        backend::set_default_stream(active.backend.as_mut(), stream, direction)
    }

    /// Try candidates starting at `start` until one opens.
    ///
    /// A pinned backend type only ever tries the candidate at `start`.
    fn try_candidates_from(&mut self, start: usize) -> Result<(), ContextError> {
        let registry = Arc::clone(&self.registry);
        let pinned = self.is_pinned();

        for (index, module) in registry.modules().iter().enumerate().skip(start) {
            if self.try_candidate(index, module) {
                return Ok(());
            }
            if pinned {
                self.change_state(State::Failed);
                return Err(ContextError::BackendFailed(module.info().name.clone()));
            }
        }

        warn!("Every backend candidate failed");
        self.change_state(State::Failed);
        Err(ContextError::NoBackendAvailable)
    }

    fn try_candidate(&mut self, index: usize, module: &BackendModule) -> bool {
        let info = module.info();
        let (notifier, notifications) = Notifier::channel();

        let mut backend = match module.instantiate(notifier) {
            Ok(backend) => backend,
            Err(err) => {
                warn!(backend = %info.name, error = %err, "Backend unavailable");
                self.record(info, AttemptOutcome::Unavailable(err.to_string()));
                return false;
            }
        };

        backend.set_app_info(&self.app_info);
        backend.set_server_address(self.server_address.as_deref());

        self.change_state(State::Connecting);
        debug!(backend = %info.name, "Trying to open backend");

        if !backend.open() {
            debug!(backend = %info.name, "Backend failed to open");
            self.record(info, AttemptOutcome::OpenFailed);
            backend.close();
            return false;
        }

        let state = backend.state();
        if !matches!(state, State::Connecting | State::Ready) {
            warn!(backend = %info.name, %state, "Backend opened into an invalid state");
            self.record(info, AttemptOutcome::InvalidState(state));
            backend.close();
            return false;
        }

        self.record(info, AttemptOutcome::Connected(state));
        self.active = Some(ActiveBackend {
            index,
            info: info.clone(),
            backend,
            notifications: Some(notifications),
            chosen: false,
            state_pending: false,
        });
        self.change_state(state);
        true
    }

    fn change_state(&mut self, state: State) {
        if state == State::Ready {
            if let Some(active) = self.active.as_mut() {
                if !active.chosen {
                    attach(active);
                }
            }
        }

        if self.state.set(state) {
            debug!(%state, "Context state changed");
            let _ = self.events.send(ContextEvent::StateChanged(state));
        }
    }

    fn take_pending_state(&mut self) -> Option<BackendEvent> {
        let active = self.active.as_mut()?;
        std::mem::take(&mut active.state_pending).then_some(BackendEvent::StateChanged)
    }

    fn try_next_notification(&mut self) -> Option<BackendEvent> {
        if let Some(event) = self.take_pending_state() {
            return Some(event);
        }
        let rx = self.active.as_mut()?.notifications.as_mut()?;
        match rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.handle_lost_notifier();
                None
            }
        }
    }

    fn handle_notification(&mut self, event: BackendEvent) {
        let Some(chosen) = self.active.as_ref().map(|active| active.chosen) else {
            trace!(?event, "Notification without an active backend");
            return;
        };

        match event {
            BackendEvent::StateChanged => self.on_backend_state_changed(),
            event if chosen => self.forward(event),
            event => trace!(?event, "Backend not ready yet, notification ignored"),
        }
    }

    fn on_backend_state_changed(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let state = active.backend.state();
        debug!(backend = %active.info.name, %state, "Backend state changed");

        match state {
            State::Connecting | State::Ready => self.change_state(state),
            State::Failed => self.on_backend_failed(),
            _ => {}
        }
    }

    fn on_backend_failed(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        warn!(backend = %active.info.name, "Backend failed");
        self.record(&active.info, AttemptOutcome::FailedAsync);

        let next = active.index + 1;
        shutdown(active);

        if self.is_pinned() {
            self.change_state(State::Failed);
        } else if let Err(err) = self.try_candidates_from(next) {
            debug!(error = %err, "Fallback after backend failure did not succeed");
        }
    }

    fn handle_lost_notifier(&mut self) {
        if self.state.get() == State::Connecting {
            warn!("Backend dropped its notifier while connecting");
            self.on_backend_failed();
        } else if let Some(active) = self.active.as_mut() {
            active.notifications = None;
        }
    }

    fn forward(&self, event: BackendEvent) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let backend = active.backend.as_ref();
        if !agrees_with_lookup(backend, &event) {
            debug!(?event, "Dropping notification that no longer matches the graph");
            return;
        }

        let event = match event {
            BackendEvent::StateChanged => return,
            BackendEvent::DeviceAdded(name) => ContextEvent::DeviceAdded(name),
            BackendEvent::DeviceRemoved(name) => ContextEvent::DeviceRemoved(name),
            BackendEvent::StreamAdded(name) => ContextEvent::StreamAdded(name),
            BackendEvent::StreamRemoved(name) => ContextEvent::StreamRemoved(name),
            BackendEvent::StoredControlAdded(name) => ContextEvent::StoredControlAdded(name),
            BackendEvent::StoredControlRemoved(name) => ContextEvent::StoredControlRemoved(name),
            BackendEvent::DefaultInputStreamChanged => ContextEvent::DefaultInputStreamChanged(
                backend
                    .default_input_stream()
                    .map(|s| s.name().to_owned()),
            ),
            BackendEvent::DefaultOutputStreamChanged => ContextEvent::DefaultOutputStreamChanged(
                backend
                    .default_output_stream()
                    .map(|s| s.name().to_owned()),
            ),
        };
        let _ = self.events.send(event);
    }

    fn record(&mut self, info: &BackendInfo, outcome: AttemptOutcome) {
        self.attempts.push(ConnectionAttempt {
            backend: info.name.clone(),
            backend_type: info.backend_type,
            outcome,
        });
    }

    fn ready_backend(&self) -> Option<&dyn Backend> {
        if self.state.get() != State::Ready {
            return None;
        }
        self.active.as_ref().map(|active| active.backend.as_ref())
    }

    fn chosen(&self) -> Option<&ActiveBackend> {
        self.active.as_ref().filter(|active| active.chosen)
    }

    fn is_pinned(&self) -> bool {
        self.backend_type != BackendType::Unknown
    }

    fn ensure_idle(&self) -> Result<(), ContextError> {
        match self.state.get() {
            state @ (State::Connecting | State::Ready) => Err(ContextError::Busy(state)),
            _ => Ok(()),
        }
    }
}

/// Start forwarding notifications of a backend that reached `Ready`.
///
/// Graph notifications queued before this point are already part of the
/// snapshot the application reads once it observes `Ready`. A queued state
/// change is kept so the backend state is re-read on the next dispatch.
fn attach(active: &mut ActiveBackend) {
    if let Some(rx) = active.notifications.as_mut() {
        let mut stale = 0;
        while let Ok(event) = rx.try_recv() {
            if event == BackendEvent::StateChanged {
                active.state_pending = true;
            } else {
                stale += 1;
            }
        }
        trace!(backend = %active.info.name, stale, "Discarded notifications queued before ready");
    }
    active.chosen = true;
    info!(backend = %active.info.name, "Using backend");
}

fn shutdown(mut active: ActiveBackend) {
    drop(active.notifications.take());
    active.backend.close();
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            shutdown(active);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state.get())
            .field("backend_type", &self.backend_type)
            .field("backend", &self.active.as_ref().map(|a| &a.info.name))
            .field("attempts", &self.attempts.len())
            .finish_non_exhaustive()
    }
}

/// Whether an entity notification still describes the backend's graph.
///
/// An addition whose entity is already gone, or a removal whose entity is
/// back, was overtaken by a later change that has its own notification.
fn agrees_with_lookup(backend: &dyn Backend, event: &BackendEvent) -> bool {
    match event {
        BackendEvent::DeviceAdded(name) => backend.device(name).is_some(),
        BackendEvent::DeviceRemoved(name) => backend.device(name).is_none(),
        BackendEvent::StreamAdded(name) => backend.stream(name).is_some(),
        BackendEvent::StreamRemoved(name) => backend.stream(name).is_none(),
        BackendEvent::StoredControlAdded(name) => backend.stored_control(name).is_some(),
        BackendEvent::StoredControlRemoved(name) => backend.stored_control(name).is_none(),
        BackendEvent::StateChanged
        | BackendEvent::DefaultInputStreamChanged
        | BackendEvent::DefaultOutputStreamChanged => true,
    }
}
