use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::component::ComponentId;
use crate::registry::properties::{Properties, PropertyValue};

/// Numeric identity of a published service, unique per registry
pub type ServiceId = u64;

/// A published service instance, shared between provider and consumers
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// Opaque identity of one published service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    id: ServiceId,
    service_type: Arc<str>,
}

impl ServiceHandle {
    /// Create a handle; registry implementations hand these out on publish
    pub fn new(id: ServiceId, service_type: &str) -> Self {
        Self {
            id,
            service_type: Arc::from(service_type),
        }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }
}

impl fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service_type, self.id)
    }
}

/// Snapshot of a published service as seen by consumers.
///
/// Carries the properties that were current when the snapshot was taken;
/// a later property update arrives as a new reference in a `Modified` event.
#[derive(Clone)]
pub struct ServiceReference {
    handle: ServiceHandle,
    properties: Properties,
    instance: ServiceObject,
    owner: Option<ComponentId>,
}

impl ServiceReference {
    pub fn new(
        handle: ServiceHandle,
        properties: Properties,
        instance: ServiceObject,
        owner: Option<ComponentId>,
    ) -> Self {
        Self {
            handle,
            properties,
            instance,
            owner,
        }
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }

    pub fn id(&self) -> ServiceId {
        self.handle.id
    }

    pub fn service_type(&self) -> &str {
        self.handle.service_type()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn instance(&self) -> &ServiceObject {
        &self.instance
    }

    /// Component that published this service, `None` for external services
    pub fn owner(&self) -> Option<ComponentId> {
        self.owner
    }

    /// Borrow the service instance as its concrete type
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    /// Same service with a new property snapshot
    pub fn with_properties(&self, properties: Properties) -> Self {
        Self {
            handle: self.handle.clone(),
            properties,
            instance: Arc::clone(&self.instance),
            owner: self.owner,
        }
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("handle", &self.handle)
            .field("properties", &self.properties)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Kind of change reported by a registry subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    /// Service published (or started matching the subscription filter)
    Added,
    /// Service unpublished (or stopped matching the subscription filter)
    Removed,
    /// Properties of a matching service changed
    Modified,
}

impl fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEventKind::Added => write!(f, "added"),
            ServiceEventKind::Removed => write!(f, "removed"),
            ServiceEventKind::Modified => write!(f, "modified"),
        }
    }
}

/// A registry change delivered to subscribers
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub reference: ServiceReference,
}

impl ServiceEvent {
    pub fn added(reference: ServiceReference) -> Self {
        Self { kind: ServiceEventKind::Added, reference }
    }

    pub fn removed(reference: ServiceReference) -> Self {
        Self { kind: ServiceEventKind::Removed, reference }
    }

    pub fn modified(reference: ServiceReference) -> Self {
        Self { kind: ServiceEventKind::Modified, reference }
    }
}
