//! # Depman Core Kernel
//!
//! Crate-wide plumbing shared by every subsystem:
//!
//! - **Lifecycle**: the [`KernelComponent`](component::KernelComponent) trait
//!   implemented by long-lived runtime pieces such as the
//!   [`DependencyManager`](crate::manager::DependencyManager).
//! - **Core Constants**: defaults used by configuration and logging, in the
//!   `constants` submodule.
//! - **Error Handling**: the aggregated [`Error`](error::Error) type and the
//!   `Result` alias in the `error` submodule.
pub mod component;
pub mod constants;
pub mod error;

pub use component::KernelComponent;
pub use error::{Error, Result};
