//! Durable record of which plugins the operator wants enabled.
//!
//! Neither operation here ever returns an error: reads degrade to the empty
//! set and writes report `false`, each with a log line. Callers decide what a
//! failed write means for them.
use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::kernel::constants::ENABLED_PLUGINS_KEY;
use crate::storage::config::ConfigStore;

/// Get/set of the persisted enabled-plugin set over a [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct EnabledPluginStore {
    store: Arc<dyn ConfigStore>,
    key: String,
}

impl EnabledPluginStore {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self::with_key(store, ENABLED_PLUGINS_KEY)
    }

    pub fn with_key(store: Arc<dyn ConfigStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    /// Read the durable set. Any read or parse failure yields the empty set.
    pub fn get_enabled(&self) -> BTreeSet<String> {
        let raw = match self.store.get_value(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted enabled-plugin set under '{}'", self.key);
                return BTreeSet::new();
            }
            Err(e) => {
                error!("Failed to read enabled plugins from config: {}", e);
                return BTreeSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                warn!("Ignoring malformed enabled-plugin set under '{}': {}", self.key, e);
                BTreeSet::new()
            }
        }
    }

    /// Write the durable set. `false` means the on-disk state is not
    /// guaranteed to have changed.
    pub fn set_enabled(&self, enabled: &BTreeSet<String>) -> bool {
        let names: Vec<&String> = enabled.iter().collect();
        let raw = match serde_json::to_string(&names) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to encode enabled plugin set: {}", e);
                return false;
            }
        };

        match self.store.set_value(&self.key, &raw) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist enabled plugins {:?}: {}", names, e);
                false
            }
        }
    }
}
