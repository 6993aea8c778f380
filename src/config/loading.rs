use std::{fs, path::Path};

use tracing::debug;

use super::{Config, ConfigPaths};
use crate::{MixerError, Result};

impl Config {
    /// Load a configuration file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML or holds
    /// invalid values.
    pub fn load(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| MixerError::io(e, path))?;
        Self::parse(&content, Some(path))
    }

    /// Load the main configuration file, or defaults if it does not exist.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined or the
    /// existing file fails to load.
    pub fn load_or_default() -> Result<Config> {
        let path = ConfigPaths::main_config()?;
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        Self::load(&path)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or holds invalid values.
    pub fn parse(content: &str, path: Option<&Path>) -> Result<Config> {
        let config: Config =
            toml::from_str(content).map_err(|e| MixerError::toml_parse(e, path))?;
        config.validate()?;
        Ok(config)
    }

    /// JSON schema of the configuration file, pretty printed.
    ///
    /// # Errors
    /// Returns error if the schema cannot be serialized.
    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(Config);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    fn validate(&self) -> Result<()> {
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());

        if blank(&self.backend.server_address) {
            return Err(MixerError::InvalidConfigField {
                field: "server_address".to_string(),
                component: "backend".to_string(),
                reason: "address must not be empty".to_string(),
            });
        }

        for (field, value) in [
            ("name", &self.app.name),
            ("id", &self.app.id),
            ("version", &self.app.version),
            ("icon", &self.app.icon),
        ] {
            if blank(value) {
                return Err(MixerError::InvalidConfigField {
                    field: field.to_string(),
                    component: "app".to_string(),
                    reason: "value must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
