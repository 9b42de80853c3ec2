//! # Configuration
//!
//! Manager settings and declarative topology files.
//!
//! Files are JSON, YAML (`yaml-config` feature) or TOML (`toml-config`
//! feature); the format is picked from the file extension.
pub mod error;
pub mod topology;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kernel::constants;
pub use error::ConfigError;
pub use topology::{
    ComponentSpec, DeclaredComponent, DeclaredService, DependencySpec, InstalledTopology,
    ServiceSpec, TopologyConfig,
};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    fn label(&self) -> String {
        self.extension().to_uppercase()
    }
}

/// Deserialize `data` in the given format
pub fn parse<T: DeserializeOwned>(data: &str, format: ConfigFormat) -> Result<T, ConfigError> {
    let deserialize_error = |message: String| ConfigError::Deserialize {
        format: format.label(),
        message,
    };
    match format {
        ConfigFormat::Json => serde_json::from_str(data).map_err(|e| deserialize_error(e.to_string())),
        #[cfg(feature = "yaml-config")]
        ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| deserialize_error(e.to_string())),
        #[cfg(feature = "toml-config")]
        ConfigFormat::Toml => toml::from_str(data).map_err(|e| deserialize_error(e.to_string())),
    }
}

/// Serialize `value` in the given format
pub fn render<T: Serialize>(value: &T, format: ConfigFormat) -> Result<String, ConfigError> {
    let serialize_error = |message: String| ConfigError::Serialize {
        format: format.label(),
        message,
    };
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|e| serialize_error(e.to_string()))
        }
        #[cfg(feature = "yaml-config")]
        ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| serialize_error(e.to_string())),
        #[cfg(feature = "toml-config")]
        ConfigFormat::Toml => {
            toml::to_string_pretty(value).map_err(|e| serialize_error(e.to_string()))
        }
    }
}

/// Read and deserialize a file, picking the format from its extension
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Loading {} configuration from {}", format.label(), path.display());
    parse(&data, format)
}

/// Settings of one [`DependencyManager`](crate::manager::DependencyManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name used in log lines
    pub name: String,
    /// Upper bound of drain rounds in `settle()`
    pub settle_rounds: usize,
    /// Keep callback failures for later inspection
    pub record_failures: bool,
}

impl ManagerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load(path)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: constants::DEFAULT_MANAGER_NAME.to_string(),
            settle_rounds: constants::DEFAULT_SETTLE_ROUNDS,
            record_failures: true,
        }
    }
}
