//! Declarative topologies: plain services plus components with their
//! dependencies, installed into a running manager.
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::ComponentHandle;
use crate::config::{ConfigError, ManagerConfig};
use crate::kernel::error::Result;
use crate::manager::DependencyManager;
use crate::registry::{Properties, ServiceFilter, ServiceHandle};

fn default_required() -> bool {
    true
}

/// One dependency of a declared component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub service: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub propagate: bool,
    /// Properties the bound service must carry with equal values
    #[serde(default)]
    pub filter: Properties,
}

/// A component declared in a topology file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSpec {
    pub name: String,
    /// Service type published while the component is active
    pub provides: Option<String>,
    /// Static properties of the provided service
    pub properties: Properties,
    pub dependencies: Vec<DependencySpec>,
}

/// A plain service published straight into the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub service: String,
    pub properties: Properties,
}

/// Contents of a topology file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub manager: ManagerConfig,
    pub components: Vec<ComponentSpec>,
    pub services: Vec<ServiceSpec>,
}

/// Implementation object behind every declared component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredComponent {
    pub name: String,
}

/// Service object behind every declared plain service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredService {
    pub service_type: String,
}

/// What [`TopologyConfig::install`] put into the manager and registry
#[derive(Debug, Clone, Default)]
pub struct InstalledTopology {
    pub components: Vec<ComponentHandle>,
    pub services: Vec<ServiceHandle>,
}

impl TopologyConfig {
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let topology: TopologyConfig = crate::config::load(path)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Reject unnamed or duplicate components and empty service types
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for component in &self.components {
            if component.name.trim().is_empty() {
                return Err(ConfigError::InvalidTopology(
                    "component without a name".to_string(),
                ));
            }
            if !names.insert(component.name.as_str()) {
                return Err(ConfigError::InvalidTopology(format!(
                    "component '{}' declared twice",
                    component.name
                )));
            }
            if component.provides.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(ConfigError::InvalidTopology(format!(
                    "component '{}' provides an empty service type",
                    component.name
                )));
            }
            for dependency in &component.dependencies {
                if dependency.service.trim().is_empty() {
                    return Err(ConfigError::InvalidTopology(format!(
                        "component '{}' has a dependency without a service type",
                        component.name
                    )));
                }
            }
        }
        for service in &self.services {
            if service.service.trim().is_empty() {
                return Err(ConfigError::InvalidTopology(
                    "service without a service type".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Add every declared component to `manager`, then publish the plain services
    pub async fn install(&self, manager: &DependencyManager) -> Result<InstalledTopology> {
        self.validate()?;
        let mut installed = InstalledTopology::default();

        for spec in &self.components {
            let mut component = manager
                .create_component()
                .set_name(spec.name.clone())
                .set_implementation(DeclaredComponent {
                    name: spec.name.clone(),
                });
            if let Some(provides) = &spec.provides {
                component = component.set_interface(provides.clone(), spec.properties.clone());
            }
            for dependency in &spec.dependencies {
                let mut declared = manager
                    .create_service_dependency()
                    .set_service(dependency.service.clone())
                    .set_required(dependency.required)
                    .set_propagate(dependency.propagate);
                if !dependency.filter.is_empty() {
                    declared = declared.set_filter(ServiceFilter::all_of(dependency.filter.clone()));
                }
                component = component.add(declared);
            }
            installed.components.push(manager.add(component).await?);
        }

        for spec in &self.services {
            let instance = Arc::new(DeclaredService {
                service_type: spec.service.clone(),
            });
            let handle = manager
                .registry()
                .publish(&spec.service, instance, spec.properties.clone(), None)?;
            installed.services.push(handle);
        }

        log::info!(
            "Installed topology: {} components, {} services",
            installed.components.len(),
            installed.services.len()
        );
        Ok(installed)
    }
}
