use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::component::callbacks::{self, CallbackResult, Instance, LifecycleFn};
use crate::component::error::ComponentError;
use crate::dependency::Dependency;
use crate::kernel::constants;
use crate::registry::Properties;

/// How the component instance is obtained (internal)
pub(crate) enum Implementation {
    /// Already constructed by the host
    Instance(Instance),
    /// Constructed by the worker when the component is added
    Factory(Box<dyn FnOnce() -> Instance + Send>),
}

impl Implementation {
    pub(crate) fn instantiate(self) -> Instance {
        match self {
            Implementation::Instance(instance) => instance,
            Implementation::Factory(factory) => factory(),
        }
    }
}

/// The service a component publishes once it is active
#[derive(Debug, Clone)]
pub struct ProvidedInterface {
    pub service_type: String,
    pub properties: Properties,
}

/// An unstarted component definition.
///
/// Built with the `set_*` / `add` chain and handed to
/// [`DependencyManager::add`](crate::manager::DependencyManager::add), which
/// takes ownership of it.
pub struct Component {
    pub(crate) name: String,
    pub(crate) implementation: Option<Implementation>,
    pub(crate) interface: Option<ProvidedInterface>,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) start: Option<LifecycleFn>,
    pub(crate) stop: Option<LifecycleFn>,
}

impl Component {
    /// Create a component with no implementation and no dependencies
    pub fn new() -> Self {
        Self {
            name: constants::DEFAULT_COMPONENT_NAME.to_string(),
            implementation: None,
            interface: None,
            dependencies: Vec::new(),
            start: None,
            stop: None,
        }
    }

    /// Name used in logs and failure reports
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use an already constructed instance
    pub fn set_implementation<T: Any + Send + Sync>(self, instance: T) -> Self {
        self.set_shared_implementation(Arc::new(instance))
    }

    /// Use an instance the host keeps a handle to
    pub fn set_shared_implementation<T: Any + Send + Sync>(mut self, instance: Arc<T>) -> Self {
        let instance: Instance = instance;
        self.implementation = Some(Implementation::Instance(instance));
        self
    }

    /// Construct the instance lazily, once, when the component is added
    pub fn set_factory<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T + Send + 'static,
    {
        self.implementation = Some(Implementation::Factory(Box::new(move || {
            let instance: Instance = Arc::new(factory());
            instance
        })));
        self
    }

    /// Publish the instance under `service_type` with static `properties` while active
    pub fn set_interface(mut self, service_type: impl Into<String>, properties: Properties) -> Self {
        self.interface = Some(ProvidedInterface {
            service_type: service_type.into(),
            properties,
        });
        self
    }

    /// Declare a dependency; declaration order is preserved
    pub fn add(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// `start()` slot, invoked when the last required dependency is bound
    pub fn on_start<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> CallbackResult + Send + Sync + 'static,
    {
        self.start = Some(callbacks::lifecycle_slot(f));
        self
    }

    /// `stop()` slot, invoked when the component leaves the active state
    pub fn on_stop<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> CallbackResult + Send + Sync + 'static,
    {
        self.stop = Some(callbacks::lifecycle_slot(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn interface(&self) -> Option<&ProvidedInterface> {
        self.interface.as_ref()
    }

    /// Distinct dependency service types, in declaration order
    pub(crate) fn service_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for dependency in &self.dependencies {
            if let Some(service_type) = dependency.service_type() {
                if !types.iter().any(|t| t == service_type) {
                    types.push(service_type.to_string());
                }
            }
        }
        types
    }

    /// Check the definition before the manager takes it over
    pub(crate) fn validate(&self) -> Result<(), ComponentError> {
        if self.implementation.is_none() {
            return Err(ComponentError::MissingImplementation {
                component: self.name.clone(),
            });
        }
        for (index, dependency) in self.dependencies.iter().enumerate() {
            match dependency.service_type() {
                None => {
                    return Err(ComponentError::InvalidDependency {
                        component: self.name.clone(),
                        index,
                        reason: "no service type set".to_string(),
                    });
                }
                Some(t) if t.trim().is_empty() => {
                    return Err(ComponentError::InvalidDependency {
                        component: self.name.clone(),
                        index,
                        reason: "service type is empty".to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl Default for Component {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("interface", &self.interface)
            .field("dependencies", &self.dependencies)
            .field("has_implementation", &self.implementation.is_some())
            .finish_non_exhaustive()
    }
}
