//! # Component Errors
//!
//! [`ComponentError`] covers invalid component definitions handed to
//! [`DependencyManager::add`](crate::manager::DependencyManager::add) and
//! lookups of components that are not (or no longer) managed.
use thiserror::Error;

use crate::component::ComponentId;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Component '{component}' has no implementation")]
    MissingImplementation { component: String },

    #[error("Dependency #{index} of component '{component}' is invalid: {reason}")]
    InvalidDependency {
        component: String,
        index: usize,
        reason: String,
    },

    #[error("Component not found: {id}")]
    NotFound { id: ComponentId },

    #[error("Worker of component '{component}' is no longer running")]
    WorkerGone { component: String },

    #[error("Dependency manager '{manager}' has been shut down")]
    ManagerShutDown { manager: String },
}
