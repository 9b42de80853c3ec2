/// Application name
pub const APP_NAME: &str = "depman";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name given to a manager when the configuration does not provide one
pub const DEFAULT_MANAGER_NAME: &str = "dependency-manager";

/// Name given to a component that was never named explicitly
pub const DEFAULT_COMPONENT_NAME: &str = "component";

/// Upper bound of drain rounds performed by `DependencyManager::settle`
pub const DEFAULT_SETTLE_ROUNDS: usize = 64;
