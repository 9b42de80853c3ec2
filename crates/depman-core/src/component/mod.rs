//! # Components
//!
//! A [`Component`] is a definition: an implementation (instance or factory),
//! an optional provided interface with static properties, an ordered list of
//! [`Dependency`](crate::dependency::Dependency) declarations and optional
//! `start`/`stop` slots.
//!
//! Once added to a [`DependencyManager`](crate::manager::DependencyManager),
//! each component is driven by its own worker thread. The owner observes it
//! through a [`ComponentHandle`].
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **`definition`**: the [`Component`] builder.
//! - **`callbacks`**: typed callback slots and [`CallbackError`].
//! - **`state`**: [`ComponentId`], [`ComponentState`] and failure records.
//! - **`handle`**: [`ComponentHandle`], the owner-side view.
//! - **`worker`**: the per-component state machine (internal).
pub mod callbacks;
pub mod definition;
pub mod error;
pub mod handle;
pub mod state;
pub(crate) mod worker;

pub use callbacks::{CallbackError, CallbackResult, Instance};
pub use definition::{Component, ProvidedInterface};
pub use error::ComponentError;
pub use handle::ComponentHandle;
pub use state::{ComponentFailure, ComponentId, ComponentState, FailurePhase};
