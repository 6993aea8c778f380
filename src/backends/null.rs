use tracing::debug;

use crate::mixer::{
    Backend, BackendCore, BackendFlags, BackendInfo, BackendModule, BackendType, Notifier, State,
};

/// Name the Null backend registers under
pub const NAME: &str = "Null";

/// Lowest priority, so every real backend is tried first
pub const PRIORITY: i32 = 0;

/// A backend that connects instantly and never exposes anything
///
/// Keeps applications working on systems without a usable sound subsystem.
pub struct NullBackend {
    core: BackendCore,
}

impl NullBackend {
    /// Create an idle Null backend
    pub fn new(notifier: Notifier) -> Self {
        Self {
            core: BackendCore::new(notifier),
        }
    }
}

impl Backend for NullBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn open(&mut self) -> bool {
        debug!("Opening null backend");
        self.core.set_state(State::Ready);
        true
    }

    fn close(&mut self) {
        self.core.set_state(State::Idle);
    }
}

/// Module descriptor of the Null backend
pub fn module() -> BackendModule {
    let info = BackendInfo {
        name: NAME.to_owned(),
        priority: PRIORITY,
        flags: BackendFlags::empty(),
        backend_type: BackendType::Null,
    };
    BackendModule::new(info, |notifier| {
        Ok(Box::new(NullBackend::new(notifier)) as Box<dyn Backend>)
    })
}
