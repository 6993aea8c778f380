use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use super::{
    backend::{Backend, Notifier},
    error::BackendError,
    types::{BackendFlags, BackendType},
};

/// Builds a backend instance wired to the given notifier
pub type Constructor =
    Arc<dyn Fn(Notifier) -> Result<Box<dyn Backend>, BackendError> + Send + Sync>;

/// Static metadata of a backend module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    /// Human readable backend name
    pub name: String,
    /// Higher priorities are tried first
    pub priority: i32,
    /// Capabilities of backends built by this module
    pub flags: BackendFlags,
    /// Sound subsystem implemented
    pub backend_type: BackendType,
}

/// A backend descriptor together with its constructor
#[derive(Clone)]
pub struct BackendModule {
    info: BackendInfo,
    constructor: Constructor,
}

impl BackendModule {
    /// Describe a backend module
    pub fn new<F>(info: BackendInfo, constructor: F) -> Self
    where
        F: Fn(Notifier) -> Result<Box<dyn Backend>, BackendError> + Send + Sync + 'static,
    {
        Self {
            info,
            constructor: Arc::new(constructor),
        }
    }

    /// Static metadata
    pub fn info(&self) -> &BackendInfo {
        &self.info
    }

    pub(crate) fn instantiate(&self, notifier: Notifier) -> Result<Box<dyn Backend>, BackendError> {
        (self.constructor)(notifier)
    }
}

impl fmt::Debug for BackendModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendModule")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Priority ordered set of available backend modules
///
/// Constructed once by the application and shared with every context.
/// Modules are kept sorted by descending priority; modules of equal priority
/// stay in registration order.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    modules: Vec<BackendModule>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the backends built into this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for module in crate::backends::builtin() {
            registry.register(module);
        }
        registry
    }

    /// Add a module at its priority position.
    ///
    /// Returns `false` if a module with the same name is already registered.
    pub fn register(&mut self, module: BackendModule) -> bool {
        if self.modules.iter().any(|m| m.info.name == module.info.name) {
            warn!(backend = %module.info.name, "Backend module already registered");
            return false;
        }

        let position = self
            .modules
            .iter()
            .position(|m| m.info.priority < module.info.priority)
            .unwrap_or(self.modules.len());

        debug!(
            backend = %module.info.name,
            priority = module.info.priority,
            position,
            "Registered backend module"
        );
        self.modules.insert(position, module);
        true
    }

    /// Index of the first module implementing `backend_type`
    pub fn find(&self, backend_type: BackendType) -> Option<usize> {
        self.modules
            .iter()
            .position(|m| m.info.backend_type == backend_type)
    }

    /// Module at `index` in priority order
    pub fn get(&self, index: usize) -> Option<&BackendModule> {
        self.modules.get(index)
    }

    /// All modules in priority order
    pub fn modules(&self) -> &[BackendModule] {
        &self.modules
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is registered
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mixer::backend::BackendCore;

    struct Inert(BackendCore);

    impl Backend for Inert {
        fn core(&self) -> &BackendCore {
            &self.0
        }

        fn open(&mut self) -> bool {
            false
        }
    }

    fn module(name: &str, priority: i32, backend_type: BackendType) -> BackendModule {
        let info = BackendInfo {
            name: name.to_owned(),
            priority,
            flags: BackendFlags::empty(),
            backend_type,
        };
        BackendModule::new(info, |notifier| {
            Ok(Box::new(Inert(BackendCore::new(notifier))) as Box<dyn Backend>)
        })
    }

    fn order(registry: &BackendRegistry) -> Vec<&str> {
        registry
            .modules()
            .iter()
            .map(|m| m.info().name.as_str())
            .collect()
    }

    #[test]
    fn modules_sorted_by_descending_priority_with_stable_ties() {
        let mut registry = BackendRegistry::new();
        registry.register(module("oss", 10, BackendType::Oss));
        registry.register(module("pulse", 100, BackendType::PulseAudio));
        registry.register(module("alsa", 10, BackendType::Alsa));
        registry.register(module("null", 0, BackendType::Null));

        assert_eq!(order(&registry), vec!["pulse", "oss", "alsa", "null"]);
        assert_eq!(registry.find(BackendType::Alsa), Some(2));
        assert_eq!(registry.find(BackendType::Unknown), None);
    }

    #[test]
    fn duplicate_module_name_is_refused() {
        let mut registry = BackendRegistry::new();

        assert!(registry.register(module("alsa", 10, BackendType::Alsa)));
        assert!(!registry.register(module("alsa", 50, BackendType::Alsa)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn builtin_registry_contains_null_backend() {
        let registry = BackendRegistry::with_builtin();

        assert!(registry.find(BackendType::Null).is_some());
    }
}
