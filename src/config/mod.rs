//! Configuration schema for mixlayer.
//!
//! Selects the backend, the sound server and the identity the application
//! announces to it. Every field has a default, so an empty or missing file
//! yields a working auto-detecting setup.

mod backend;
mod general;
mod loading;
mod paths;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

pub use backend::BackendConfig;
pub use general::{GeneralConfig, LogLevel};
pub use paths::ConfigPaths;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mixer::AppInfo;

/// Main configuration structure for mixlayer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend selection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Identity announced to the sound subsystem.
    #[serde(default)]
    pub app: AppInfo,
}
