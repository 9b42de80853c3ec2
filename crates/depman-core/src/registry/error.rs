//! # Service Registry Errors
//!
//! [`RegistryError`] covers the failures a [`ServiceRegistry`](super::ServiceRegistry)
//! implementation reports back to the runtime: an unavailable registry,
//! unknown service handles and poisoned internal locks.
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Service registry is unavailable")]
    Unavailable,

    #[error("Service not found: {handle}")]
    ServiceNotFound { handle: String },

    #[error("Attempted to operate on a poisoned service registry lock: {component}")]
    Poisoned { component: String },
}

/// Shorthand for registry results
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
