//! # Capstan Core
//!
//! Extension lifecycle management for long-lived host processes. Plugins are
//! discovered from a plugin root, enabled or disabled by an operator, and the
//! capabilities ("tools") of enabled plugins are served through a
//! permission-aware [`CapabilityRegistry`].
pub mod kernel;
pub mod plugin_system;
pub mod storage;

// Re-export key public types/traits for easier use by the binary and plugins
pub use kernel::Application;
pub use kernel::error::{Error, Result};
pub use plugin_system::{
    Capability, CapabilityCatalog, CapabilityDescriptor, CapabilityError, CapabilityRegistry,
    DispatchResult, Identity, Outcome, PluginManager, PluginManifest, PluginState,
};
pub use storage::{ConfigStore, StorageProvider};
