//! # Configuration Errors
//!
//! [`ConfigError`] covers reading, parsing and validating manager
//! configuration and topology files.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format for '{path}'")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to deserialize from {format}: {message}")]
    Deserialize { format: String, message: String },

    #[error("Failed to serialize to {format}: {message}")]
    Serialize { format: String, message: String },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
}
