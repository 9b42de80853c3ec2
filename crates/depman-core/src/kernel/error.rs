//! # Depman Core Errors
//!
//! Defines the crate-wide [`Error`] type.
//!
//! Every subsystem owns a typed error enum ([`RegistryError`],
//! [`ComponentError`], [`ConfigError`]); this module folds them into one
//! `Error` with `#[from]` conversions so that `?` works across subsystem
//! boundaries, and adds the manager-level lifecycle failures.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::component::error::ComponentError;
use crate::config::error::ConfigError;
use crate::registry::error::RegistryError;

/// Crate-wide error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// Typed service registry error
    #[error("Service registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Typed component error (validation, lookup, worker failures)
    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    /// Typed configuration / topology error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurring during a specific manager lifecycle phase.
    #[error("Manager lifecycle error during {phase}: {message}")]
    ManagerLifecycle {
        phase: ManagerPhase,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase of the dependency manager's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ManagerPhase {
    #[error("Add")]
    Add,
    #[error("Remove")]
    Remove,
    #[error("Settle")]
    Settle,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Helper for manager lifecycle failures
    pub fn lifecycle(phase: ManagerPhase, message: impl Into<String>) -> Self {
        Error::ManagerLifecycle {
            phase,
            message: message.into(),
        }
    }
}
