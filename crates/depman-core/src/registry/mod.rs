//! # Service Registry
//!
//! The registry is the one shared, mutable resource of the runtime: it stores
//! published `(service type, instance, properties)` tuples and tells
//! subscribers when they are added, removed or modified.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`properties`]**: [`Properties`], the ordered key → [`PropertyValue`] map.
//! - **[`service`]**: handles, reference snapshots and [`ServiceEvent`]s.
//! - **[`filter`]**: [`ServiceFilter`] predicates over properties.
//! - **[`memory`]**: [`InMemoryServiceRegistry`], the in-process implementation.
//! - **[`error`]**: [`RegistryError`](error::RegistryError).
//!
//! The [`DependencyManager`](crate::manager::DependencyManager) only talks to
//! the [`ServiceRegistry`] trait object it is constructed with, so any other
//! implementation can be injected.
pub mod error;
pub mod filter;
pub mod memory;
pub mod properties;
pub mod service;

use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::component::ComponentId;
pub use error::{RegistryError, RegistryResult};
pub use filter::ServiceFilter;
pub use memory::InMemoryServiceRegistry;
pub use properties::{Properties, PropertyValue};
pub use service::{
    ServiceEvent, ServiceEventKind, ServiceHandle, ServiceId, ServiceObject, ServiceReference,
};

/// Capability interface the runtime consumes.
///
/// All methods are synchronous and must not block on I/O: they are called
/// from component callbacks and worker threads. Implementations must be
/// thread-safe and must deliver the events of one service type to all of its
/// subscribers in the same order.
pub trait ServiceRegistry: Send + Sync + Debug {
    /// Publish a service and notify matching subscribers with `Added`
    fn publish(
        &self,
        service_type: &str,
        instance: ServiceObject,
        properties: Properties,
        owner: Option<ComponentId>,
    ) -> RegistryResult<ServiceHandle>;

    /// Withdraw a service and notify matching subscribers with `Removed`
    fn unpublish(&self, handle: &ServiceHandle) -> RegistryResult<()>;

    /// Replace the properties of a published service
    fn update_properties(&self, handle: &ServiceHandle, properties: Properties)
        -> RegistryResult<()>;

    /// All services currently published under `service_type`, oldest first
    fn find(&self, service_type: &str) -> RegistryResult<Vec<ServiceReference>>;

    /// Subscribe to changes of `service_type`.
    ///
    /// The subscription first yields an `Added` event for every matching
    /// service already published, then live events.
    fn subscribe(
        &self,
        service_type: &str,
        filter: Option<ServiceFilter>,
    ) -> RegistryResult<Subscription>;
}

/// Shared registry handle injected into the manager
pub type SharedServiceRegistry = Arc<dyn ServiceRegistry>;

/// Identifier of a registry subscription
pub type SubscriptionId = u64;

/// Receiving end of a registry subscription.
///
/// The stream ends (`recv` returns `None`) when the registry shuts down.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    service_type: String,
    receiver: mpsc::UnboundedReceiver<ServiceEvent>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        service_type: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<ServiceEvent>,
    ) -> Self {
        Self {
            id,
            service_type: service_type.into(),
            receiver,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<ServiceEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ServiceEvent> {
        self.receiver.try_recv().ok()
    }
}
