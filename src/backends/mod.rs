//! Backend adapters built into the crate

/// Fallback backend without any devices
pub mod null;

use crate::mixer::BackendModule;

/// Modules registered by [`crate::mixer::BackendRegistry::with_builtin`]
pub fn builtin() -> Vec<BackendModule> {
    vec![null::module()]
}
