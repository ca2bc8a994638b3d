//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting was present but could not be used.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Environment variable or file key.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// The configuration file exists but is not valid TOML for this crate.
    #[error("Failed to parse config file {}: {reason}", path.display())]
    ParseFile {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),
}
