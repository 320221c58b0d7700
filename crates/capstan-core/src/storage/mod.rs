//! # Capstan Core Storage
//!
//! File access ([`StorageProvider`], [`LocalStorageProvider`]), configuration
//! formats and files ([`ConfigManager`]), the generic durable key/value
//! dependency ([`ConfigStore`]) and the enabled-plugin set kept on top of it
//! ([`EnabledPluginStore`]).
pub mod provider;
pub mod local;
pub mod config;
pub mod persistence;
pub mod error;

/// Re-export key types
pub use provider::StorageProvider;
pub use local::LocalStorageProvider;
pub use config::{ConfigData, ConfigFormat, ConfigManager, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use persistence::EnabledPluginStore;
pub use error::StorageSystemError;
