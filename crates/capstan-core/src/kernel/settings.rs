use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::{ConfigData, ConfigFormat, StorageProvider, StorageSystemError};

/// Host settings: where plugins live and where durable state goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Root scanned for plugin directories
    pub plugins_dir: PathBuf,
    /// Directory holding the durable state config
    pub state_dir: PathBuf,
    /// File name of the durable state config; its extension picks the format
    pub state_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from(constants::DEFAULT_PLUGINS_DIR),
            state_dir: PathBuf::from(constants::DEFAULT_STATE_DIR),
            state_file: constants::DEFAULT_STATE_FILE.to_string(),
        }
    }
}

impl Settings {
    /// Build settings from loaded config data, defaulting any missing key
    pub fn from_config(config: &ConfigData) -> Self {
        let defaults = Self::default();
        Self {
            plugins_dir: config.get_or("plugins_dir", defaults.plugins_dir),
            state_dir: config.get_or("state_dir", defaults.state_dir),
            state_file: config.get_or("state_file", defaults.state_file),
        }
    }

    /// Read a settings file in any supported config format
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        if !provider.is_file(path) {
            return Err(StorageSystemError::FileNotFound(path.to_path_buf()).into());
        }
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = provider.read_to_string(path)?;
        let config = ConfigData::deserialize(&content, format)?;
        Ok(Self::from_config(&config))
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        if provider.exists(path) {
            Self::load(provider, path)
        } else {
            Ok(Self::default())
        }
    }

    /// Full path of the durable state config
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(&self.state_file)
    }
}
