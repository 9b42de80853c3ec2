//! Callback slots a hosted component registers instead of named methods.
//!
//! Every slot is optional. The typed constructors downcast the component
//! instance (and the bound service instance) to the concrete types the host
//! closure expects, so hosted code never touches `dyn Any` itself.
use std::any::{Any, type_name};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use crate::registry::{Properties, ServiceReference};

/// The component implementation object, shared with the registry once published
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Error returned by a component callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for CallbackError {
    fn from(msg: &str) -> Self {
        CallbackError::new(msg)
    }
}

impl From<String> for CallbackError {
    fn from(msg: String) -> Self {
        CallbackError::new(msg)
    }
}

/// Result type of every callback slot
pub type CallbackResult<T = ()> = std::result::Result<T, CallbackError>;

/// `start` / `stop`
pub type LifecycleFn = Arc<dyn Fn(&Instance) -> CallbackResult + Send + Sync>;
/// `bind(service)`, `unbind(service)`, `changed(service)`
pub type ServiceFn = Arc<dyn Fn(&Instance, &ServiceReference) -> CallbackResult + Send + Sync>;
/// `bind(properties, service)`
pub type BindWithPropertiesFn =
    Arc<dyn Fn(&Instance, &Properties, &ServiceReference) -> CallbackResult + Send + Sync>;
/// `get_service_properties(reference)`
pub type PropagateFn =
    Arc<dyn Fn(&Instance, &ServiceReference) -> CallbackResult<Properties> + Send + Sync>;

/// Bind slot; the variant records whether a properties parameter was declared
#[derive(Clone)]
pub enum BindSlot {
    Service(ServiceFn),
    WithProperties(BindWithPropertiesFn),
}

impl BindSlot {
    pub(crate) fn invoke(&self, instance: &Instance, reference: &ServiceReference) -> CallbackResult {
        match self {
            BindSlot::Service(f) => f(instance, reference),
            BindSlot::WithProperties(f) => f(instance, reference.properties(), reference),
        }
    }
}

pub(crate) fn downcast_instance<T: Any>(instance: &Instance) -> CallbackResult<&T> {
    instance
        .downcast_ref::<T>()
        .ok_or_else(|| CallbackError::new(format!("component instance is not a {}", type_name::<T>())))
}

pub(crate) fn downcast_service<S: Any>(reference: &ServiceReference) -> CallbackResult<&S> {
    reference.downcast::<S>().ok_or_else(|| {
        CallbackError::new(format!(
            "service {} is not a {}",
            reference.handle(),
            type_name::<S>()
        ))
    })
}

pub(crate) fn lifecycle_slot<T, F>(f: F) -> LifecycleFn
where
    T: Any + Send + Sync,
    F: Fn(&T) -> CallbackResult + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| -> CallbackResult {
        f(downcast_instance::<T>(instance)?)
    })
}

pub(crate) fn service_slot<T, S, F>(f: F) -> ServiceFn
where
    T: Any + Send + Sync,
    S: Any + Send + Sync,
    F: Fn(&T, &S) -> CallbackResult + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance, reference: &ServiceReference| -> CallbackResult {
        f(downcast_instance::<T>(instance)?, downcast_service::<S>(reference)?)
    })
}

pub(crate) fn bind_with_properties_slot<T, S, F>(f: F) -> BindWithPropertiesFn
where
    T: Any + Send + Sync,
    S: Any + Send + Sync,
    F: Fn(&T, &Properties, &S) -> CallbackResult + Send + Sync + 'static,
{
    Arc::new(
        move |instance: &Instance, properties: &Properties, reference: &ServiceReference| -> CallbackResult {
            f(
                downcast_instance::<T>(instance)?,
                properties,
                downcast_service::<S>(reference)?,
            )
        },
    )
}

pub(crate) fn propagate_slot<T, F>(f: F) -> PropagateFn
where
    T: Any + Send + Sync,
    F: Fn(&T, &ServiceReference) -> CallbackResult<Properties> + Send + Sync + 'static,
{
    Arc::new(
        move |instance: &Instance, reference: &ServiceReference| -> CallbackResult<Properties> {
            f(downcast_instance::<T>(instance)?, reference)
        },
    )
}

/// Run a callback, turning a panic into a [`CallbackError`]
pub(crate) fn guarded<R>(call: impl FnOnce() -> CallbackResult<R>) -> CallbackResult<R> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(CallbackError::new(format!("callback panicked: {}", message)))
        }
    }
}
