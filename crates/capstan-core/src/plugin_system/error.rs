//! # Capstan Core Plugin System Errors
//!
//! [`PluginSystemError`] covers the structural failures of plugin
//! administration: discovery, manifest parsing, lookup, validation,
//! capability loading and persistence. These bubble to the administrative
//! caller. Dispatch-time conditions (`PermissionDenied`, `CapabilityNotFound`)
//! are also named here so they can be reported uniformly, but the registry
//! folds them into a [`DispatchResult`](crate::plugin_system::DispatchResult)
//! instead of returning them.
use std::path::PathBuf;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    /// One plugin directory could not be turned into a manifest.
    #[error("Discovery failed for plugin '{plugin}' at '{}': {message}", path.display())]
    Discovery {
        plugin: String,
        path: PathBuf,
        message: String,
    },

    #[error("Plugin manifest error for '{}': {message}", path.display())]
    ManifestError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin not found: '{0}'")]
    NotFound(String),

    /// The plugin exists but cannot be operated on in its current state.
    #[error("Plugin '{plugin}' failed validation: {message}")]
    Validation {
        plugin: String,
        message: String,
    },

    #[error("Failed to load capabilities of plugin '{plugin}'{}: {message}", capability.as_ref().map(|c| format!(" (capability '{}')", c)).unwrap_or_default())]
    CapabilityLoad {
        plugin: String,
        capability: Option<String>,
        message: String,
    },

    #[error("Failed to persist enabled plugins while {operation} '{plugin}'")]
    Persistence {
        plugin: String,
        operation: String,
    },

    #[error("Permission denied for capability '{capability}'")]
    PermissionDenied {
        capability: String,
    },

    #[error("Capability not found: '{0}'")]
    CapabilityNotFound(String),

    #[error("Version error: {0}")]
    Version(#[from] VersionError),
}

impl PluginSystemError {
    /// Builds a `CapabilityLoad` error scoped to one capability
    pub fn capability_load(plugin: &str, capability: &str, message: impl Into<String>) -> Self {
        PluginSystemError::CapabilityLoad {
            plugin: plugin.to_string(),
            capability: Some(capability.to_string()),
            message: message.into(),
        }
    }
}

/// Shorthand for results of plugin administration
pub type PluginResult<T> = std::result::Result<T, PluginSystemError>;
