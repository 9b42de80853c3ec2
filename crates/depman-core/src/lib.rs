//! # depman-core
//!
//! A component-dependency runtime. Components declare required and optional
//! dependencies on services published in a [`ServiceRegistry`]; the
//! [`DependencyManager`] tracks those services as they come and go, drives
//! each component through its lifecycle and propagates service properties
//! from bound dependencies into the properties the component itself is
//! published under.
pub mod component;
pub mod config;
pub mod dependency;
pub mod kernel;
pub mod manager;
pub mod propagation;
pub mod registry;

// Re-export key public types for the binary and for hosting code
pub use component::{Component, ComponentHandle, ComponentId, ComponentState};
pub use dependency::Dependency;
pub use kernel::error::{Error, Result};
pub use manager::DependencyManager;
pub use propagation::PropertyPropagator;
pub use registry::{
    InMemoryServiceRegistry, Properties, PropertyValue, ServiceEvent, ServiceHandle,
    ServiceReference, ServiceRegistry,
};

#[cfg(test)]
mod tests;
