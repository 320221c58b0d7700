use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::StorageProvider;

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

    /// Determine format from file extension. `None` for unknown or
    /// feature-disabled formats.
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

    /// Parse `data` in this format into any deserializable type
    pub fn parse<T: for<'de> Deserialize<'de>>(&self, data: &str) -> Result<T> {
        let parsed = match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| deserialize_error("json", e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| deserialize_error("yaml", e))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| deserialize_error("toml", e))?,
        };
        Ok(parsed)
    }

    /// Render any serializable value in this format
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        let rendered = match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value).map_err(|e| serialize_error("json", e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| serialize_error("yaml", e))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| serialize_error("toml", e))?,
        };
        Ok(rendered)
    }
}

fn deserialize_error<E: std::error::Error + Send + Sync + 'static>(format: &str, e: E) -> StorageSystemError {
    StorageSystemError::DeserializationError {
        format: format.to_string(),
        source: Box::new(e),
    }
}

fn serialize_error<E: std::error::Error + Send + Sync + 'static>(format: &str, e: E) -> StorageSystemError {
    StorageSystemError::SerializationError {
        format: format.to_string(),
        source: Box::new(e),
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    /// Raw configuration values
    #[serde(flatten)]
    values: BTreeMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a configuration value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// The stored value as-is, without conversion
    pub fn get_raw(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Get a configuration value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| serialize_error("json", e))?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Remove a configuration value
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get all keys
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Merge with another config, overriding existing values
    pub fn merge(&mut self, other: &ConfigData) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        format.render(self)
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        format.parse(data)
    }
}

/// Configuration manager that handles loading, saving, and caching named
/// config files under one directory.
#[derive(Debug)]
pub struct ConfigManager {
    /// Storage provider for reading/writing configs
    provider: Arc<dyn StorageProvider>,
    /// Directory holding the config files
    config_dir: PathBuf,
    /// Default format for names without an extension
    default_format: ConfigFormat,
    /// In-memory cache of loaded configurations
    cache: Mutex<HashMap<String, ConfigData>>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new(provider: Arc<dyn StorageProvider>, config_dir: PathBuf, default_format: ConfigFormat) -> Self {
        Self {
            provider,
            config_dir,
            default_format,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the default format
    pub fn default_format(&self) -> ConfigFormat {
        self.default_format
    }

    /// Resolve the complete path for a configuration file
    pub fn resolve_config_path(&self, name: &str) -> PathBuf {
        let file_name = if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.default_format.extension())
        };
        self.config_dir.join(file_name)
    }

    /// Load configuration from disk. A missing file yields an empty config.
    pub fn load_config(&self, name: &str) -> Result<ConfigData> {
        if let Some(config) = self.cache.lock().get(name) {
            return Ok(config.clone());
        }

        let path = self.resolve_config_path(name);
        if !self.provider.exists(&path) {
            return Ok(ConfigData::new());
        }

        let format = ConfigFormat::from_path(&path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = self.provider.read_to_string(&path)?;
        let config = ConfigData::deserialize(&content, format)?;

        self.cache.lock().insert(name.to_string(), config.clone());
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save_config(&self, name: &str, config: &ConfigData) -> Result<()> {
        let path = self.resolve_config_path(name);

        if let Some(parent) = path.parent() {
            self.provider.create_dir_all(parent)?;
        }

        let format = ConfigFormat::from_path(&path).unwrap_or(self.default_format);
        let content = config.serialize(format)?;
        self.provider.write_string(&path, &content)?;

        self.cache.lock().insert(name.to_string(), config.clone());
        Ok(())
    }

    /// Invalidate the cache for a specific configuration
    pub fn invalidate_cache(&self, name: &str) {
        self.cache.lock().remove(name);
    }

    /// Clear the entire configuration cache
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

/// Generic durable key/value configuration.
///
/// The backing store (file, database row, remote KV) is opaque to callers.
pub trait ConfigStore: Send + Sync + Debug {
    /// Read the value stored under `key`, `None` if absent
    fn get_value(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`. An `Err` means the value may not be on disk.
    fn set_value(&self, key: &str, value: &str) -> Result<()>;
}

/// [`ConfigStore`] backed by a single named config file.
#[derive(Debug)]
pub struct FileConfigStore {
    manager: ConfigManager,
    name: String,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(manager: ConfigManager, name: impl Into<String>) -> Self {
        Self {
            manager,
            name: name.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> PathBuf {
        self.manager.resolve_config_path(&self.name)
    }
}

impl ConfigStore for FileConfigStore {
    /// Reads always go to disk. Non-string values come back as their JSON
    /// text so callers can parse or reject them.
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.manager.invalidate_cache(&self.name);
        let config = self.manager.load_config(&self.name)?;
        Ok(config.get_raw(key).map(|value| match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }))
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        // Start from disk so keys written by another process survive
        self.manager.invalidate_cache(&self.name);
        let mut config = self.manager.load_config(&self.name)?;
        config.set(key, value)?;
        if let Err(e) = self.manager.save_config(&self.name, &config) {
            // The cache may now disagree with disk; force a re-read next time
            self.manager.invalidate_cache(&self.name);
            return Err(e);
        }
        Ok(())
    }
}

/// In-process [`ConfigStore`]; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
