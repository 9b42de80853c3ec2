//! # Service Dependencies
//!
//! A [`Dependency`] declares one service a component needs: the service type,
//! an optional [`ServiceFilter`], whether it is required, which callback slots
//! to invoke and whether the bound service's properties are propagated into
//! the component's own registration.
use std::any::Any;
use std::fmt;

use crate::component::callbacks::{
    self, BindSlot, CallbackResult, PropagateFn, ServiceFn,
};
use crate::registry::{Properties, ServiceFilter, ServiceReference};

/// How a dependency contributes to its component's published properties
#[derive(Clone, Default)]
pub enum Propagate {
    /// Contributes nothing
    #[default]
    None,
    /// Copies the bound service's registered properties
    Raw,
    /// Asks the component implementation for the properties to contribute
    Callback(PropagateFn),
}

impl Propagate {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Propagate::None)
    }
}

impl fmt::Debug for Propagate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Propagate::None => write!(f, "None"),
            Propagate::Raw => write!(f, "Raw"),
            Propagate::Callback(_) => write!(f, "Callback"),
        }
    }
}

/// Declarative description of one service a component needs
#[derive(Clone, Default)]
pub struct Dependency {
    service_type: Option<String>,
    filter: Option<ServiceFilter>,
    required: bool,
    bind: Option<BindSlot>,
    unbind: Option<ServiceFn>,
    change: Option<ServiceFn>,
    propagate: Propagate,
}

impl Dependency {
    /// Create an empty, optional dependency; set the service with [`Dependency::set_service`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a required dependency on `service_type`
    pub fn required(service_type: &str) -> Self {
        Self::new().set_service(service_type).set_required(true)
    }

    /// Create an optional dependency on `service_type`
    pub fn optional(service_type: &str) -> Self {
        Self::new().set_service(service_type).set_required(false)
    }

    pub fn set_service(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn set_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn set_filter(mut self, filter: ServiceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// `bind(service)` slot
    pub fn set_bind<T, S, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        S: Any + Send + Sync,
        F: Fn(&T, &S) -> CallbackResult + Send + Sync + 'static,
    {
        self.bind = Some(BindSlot::Service(callbacks::service_slot(f)));
        self
    }

    /// `bind(properties, service)` slot; receives the bound service's properties
    pub fn set_bind_with_properties<T, S, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        S: Any + Send + Sync,
        F: Fn(&T, &Properties, &S) -> CallbackResult + Send + Sync + 'static,
    {
        self.bind = Some(BindSlot::WithProperties(callbacks::bind_with_properties_slot(f)));
        self
    }

    /// `unbind(service)` slot
    pub fn set_unbind<T, S, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        S: Any + Send + Sync,
        F: Fn(&T, &S) -> CallbackResult + Send + Sync + 'static,
    {
        self.unbind = Some(callbacks::service_slot(f));
        self
    }

    /// `changed(service)` slot, invoked when the bound service's properties change
    pub fn set_change<T, S, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        S: Any + Send + Sync,
        F: Fn(&T, &S) -> CallbackResult + Send + Sync + 'static,
    {
        self.change = Some(callbacks::service_slot(f));
        self
    }

    /// Propagate the bound service's own properties (`true`) or nothing (`false`)
    pub fn set_propagate(mut self, propagate: bool) -> Self {
        self.propagate = if propagate { Propagate::Raw } else { Propagate::None };
        self
    }

    /// Propagate whatever the component returns for the bound service reference
    pub fn set_propagate_callback<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &ServiceReference) -> CallbackResult<Properties> + Send + Sync + 'static,
    {
        self.propagate = Propagate::Callback(callbacks::propagate_slot(f));
        self
    }

    pub fn service_type(&self) -> Option<&str> {
        self.service_type.as_deref()
    }

    pub fn filter(&self) -> Option<&ServiceFilter> {
        self.filter.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn propagate(&self) -> &Propagate {
        &self.propagate
    }

    pub fn propagates(&self) -> bool {
        self.propagate.is_enabled()
    }

    pub(crate) fn bind_slot(&self) -> Option<&BindSlot> {
        self.bind.as_ref()
    }

    pub(crate) fn unbind_slot(&self) -> Option<&ServiceFn> {
        self.unbind.as_ref()
    }

    pub(crate) fn change_slot(&self) -> Option<&ServiceFn> {
        self.change.as_ref()
    }

    /// Check whether `reference` satisfies this dependency (type and filter)
    pub fn matches(&self, reference: &ServiceReference) -> bool {
        let type_matches = self
            .service_type
            .as_deref()
            .is_some_and(|t| t == reference.service_type());
        type_matches
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(reference.properties()))
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("service_type", &self.service_type)
            .field("filter", &self.filter)
            .field("required", &self.required)
            .field("bind", &self.bind.is_some())
            .field("unbind", &self.unbind.is_some())
            .field("change", &self.change.is_some())
            .field("propagate", &self.propagate)
            .finish()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirement_type = if self.required { "Requires" } else { "Optional" };
        let service_type = self.service_type.as_deref().unwrap_or("<unset>");
        match &self.filter {
            Some(filter) => write!(f, "{} service: {} (filter: {})", requirement_type, service_type, filter),
            None => write!(f, "{} service: {}", requirement_type, service_type),
        }
    }
}
