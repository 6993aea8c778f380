use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::mixer::ContextError;

/// Error types for the mixlayer crate outside the mixer API itself.
///
/// Covers configuration loading and the monitor tool; mixer operations
/// report their own error enums, which convert into this one.
#[derive(Error, Debug)]
pub enum MixerError {
    /// Configuration field missing or invalid
    #[error("invalid config field '{field}' in {component}: {reason}")]
    InvalidConfigField {
        /// The field that is invalid
        field: String,
        /// Component containing the field
        component: String,
        /// Reason why the field is invalid
        reason: String,
    },

    /// I/O operation error
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// Standard I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParseError {
        /// Location of TOML being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// JSON schema serialization error
    #[error("failed to serialize schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// Mixer context error
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// A specialized `Result` type for mixlayer operations.
pub type Result<T> = std::result::Result<T, MixerError>;

impl MixerError {
    /// Creates a TOML parsing error with optional file path context.
    pub fn toml_parse(error: impl std::fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => {
                let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                clean_path.to_string_lossy().to_string()
            }
            None => "string".to_string(),
        };

        MixerError::TomlParseError {
            location,
            details: error.to_string(),
        }
    }

    /// Creates an I/O error with file path context.
    pub fn io(error: impl std::fmt::Display, path: &Path) -> Self {
        MixerError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }
}
