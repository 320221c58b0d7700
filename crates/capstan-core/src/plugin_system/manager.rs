use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Debug};
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;

use crate::plugin_system::discovery::PluginDiscovery;
use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::loader::CapabilityLoader;
use crate::plugin_system::manifest::{PluginManifest, PluginState};
use crate::plugin_system::traits::{Capability, CapabilityDescriptor};
use crate::storage::EnabledPluginStore;

/// A capability in the index, together with the plugin that provides it
#[derive(Clone)]
pub struct RegisteredCapability {
    name: String,
    plugin: String,
    capability: Arc<dyn Capability>,
}

impl RegisteredCapability {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning plugin
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }

    pub fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::from_capability(self.capability.as_ref(), &self.plugin)
    }
}

impl Debug for RegisteredCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCapability")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .finish()
    }
}

/// Outcome of a [`PluginManager::refresh`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Number of manifests discovered, healthy or not
    pub discovered: usize,
    /// Plugins enabled by replaying the persisted set
    pub enabled: Vec<String>,
    /// Plugins left in `Error`
    pub errored: Vec<String>,
    /// Persisted names with no discovered plugin
    pub missing: Vec<String>,
}

#[derive(Default)]
struct ManagerState {
    plugins: BTreeMap<String, PluginManifest>,
    capabilities: HashMap<String, RegisteredCapability>,
    /// Capability names each enabled plugin added, removed again on disable
    owned: HashMap<String, Vec<String>>,
    enabled: BTreeSet<String>,
}

impl ManagerState {
    /// Capability name -> owning plugin, as the loader wants it
    fn claimed(&self) -> HashMap<String, String> {
        self.capabilities
            .iter()
            .map(|(name, entry)| (name.clone(), entry.plugin.clone()))
            .collect()
    }

    /// Merge `capabilities` into the index under `plugin` and mark it enabled.
    /// Returns the names actually added.
    fn activate(&mut self, plugin: &str, capabilities: Vec<Arc<dyn Capability>>) -> Vec<String> {
        let mut added = Vec::with_capacity(capabilities.len());
        for capability in capabilities {
            let name = capability.name().to_string();
            if let Some(existing) = self.capabilities.get(&name) {
                // Only reachable if the index changed while the loader ran
                warn!(
                    "Rejecting capability '{}' from plugin '{}': name already registered by plugin '{}'",
                    name, plugin, existing.plugin
                );
                continue;
            }
            self.capabilities.insert(
                name.clone(),
                RegisteredCapability {
                    name: name.clone(),
                    plugin: plugin.to_string(),
                    capability,
                },
            );
            added.push(name);
        }
        self.owned.insert(plugin.to_string(), added.clone());
        self.enabled.insert(plugin.to_string());
        added
    }

    /// Remove everything `plugin` added and drop it from the enabled set.
    fn deactivate(&mut self, plugin: &str) -> Vec<String> {
        let removed = self.owned.remove(plugin).unwrap_or_default();
        for name in &removed {
            self.capabilities.remove(name);
        }
        self.enabled.remove(plugin);
        removed
    }

    fn set_state(&mut self, plugin: &str, state: PluginState) {
        if let Some(manifest) = self.plugins.get_mut(plugin) {
            manifest.state = state;
            if state != PluginState::Error {
                manifest.error_message = None;
            }
        }
    }

    fn mark_error(&mut self, plugin: &str, message: String) {
        if let Some(manifest) = self.plugins.get_mut(plugin) {
            manifest.mark_error(message);
        }
    }
}

/// Orchestrates discovery, persistence and capability loading, and owns the
/// plugin state machine and the capability index.
///
/// Every operation runs under one reentrant lock. Mutations (`enable`,
/// `disable`, `refresh`) hold it for their whole duration, including
/// capability loading. Queries hold it just long enough to copy state out.
pub struct PluginManager {
    discovery: PluginDiscovery,
    loader: CapabilityLoader,
    persistence: EnabledPluginStore,
    state: ReentrantMutex<RefCell<ManagerState>>,
}

impl PluginManager {
    /// Create a manager with an empty index. Call [`refresh`](Self::refresh)
    /// to populate it.
    pub fn new(discovery: PluginDiscovery, loader: CapabilityLoader, persistence: EnabledPluginStore) -> Self {
        Self {
            discovery,
            loader,
            persistence,
            state: ReentrantMutex::new(RefCell::new(ManagerState::default())),
        }
    }

    fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<ManagerState>> {
        self.state.lock()
    }

    /// Rediscover plugins, reload the persisted enabled set and rebuild the
    /// capability index from scratch by replaying `enable` for every
    /// persisted, healthy plugin. Never writes the persisted set.
    ///
    /// The replay runs in name order, so a capability name two plugins both
    /// provide goes to the one that sorts first.
    pub fn refresh(&self) -> RefreshReport {
        let guard = self.lock();

        let manifests = self.discovery.discover();
        let persisted = self.persistence.get_enabled();

        let mut report = RefreshReport {
            discovered: manifests.len(),
            ..RefreshReport::default()
        };

        {
            let mut state = guard.borrow_mut();
            *state = ManagerState::default();
            for manifest in manifests {
                state.plugins.insert(manifest.name.clone(), manifest);
            }
        }

        for name in &persisted {
            let manifest = guard.borrow().plugins.get(name).cloned();
            let Some(manifest) = manifest else {
                warn!("Persisted plugin '{}' was not discovered; leaving it disabled", name);
                report.missing.push(name.clone());
                continue;
            };
            if manifest.is_error() {
                warn!(
                    "Persisted plugin '{}' is in error and stays disabled: {}",
                    name,
                    manifest.error_message.as_deref().unwrap_or("unknown error")
                );
                continue;
            }

            let claimed = guard.borrow().claimed();
            match self.loader.load(&manifest, &claimed) {
                Ok(capabilities) => {
                    let mut state = guard.borrow_mut();
                    state.activate(name, capabilities);
                    state.set_state(name, PluginState::Enabled);
                    report.enabled.push(name.clone());
                }
                Err(e) => {
                    warn!("Plugin '{}' failed to load during refresh: {}", name, e);
                    guard.borrow_mut().mark_error(name, e.to_string());
                }
            }
        }

        report.errored = guard
            .borrow()
            .plugins
            .values()
            .filter(|m| m.is_error())
            .map(|m| m.name.clone())
            .collect();

        info!(
            "Refresh complete: {} discovered, {} enabled, {} in error",
            report.discovered,
            report.enabled.len(),
            report.errored.len()
        );
        report
    }

    /// Enable a plugin: load its capabilities, merge them into the index and
    /// persist the new enabled set, all or nothing.
    pub fn enable(&self, name: &str) -> PluginResult<()> {
        let guard = self.lock();

        let manifest = {
            let state = guard.borrow();
            let manifest = state
                .plugins
                .get(name)
                .ok_or_else(|| PluginSystemError::NotFound(name.to_string()))?;
            if manifest.is_error() {
                return Err(PluginSystemError::Validation {
                    plugin: name.to_string(),
                    message: format!(
                        "plugin is in error state ({}); refresh after fixing it",
                        manifest.error_message.as_deref().unwrap_or("unknown error")
                    ),
                });
            }
            if manifest.is_enabled() {
                debug!("Plugin '{}' is already enabled", name);
                return Ok(());
            }
            manifest.clone()
        };

        let claimed = guard.borrow().claimed();
        let capabilities = match self.loader.load(&manifest, &claimed) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                error!("Failed to enable plugin '{}': {}", name, e);
                guard.borrow_mut().mark_error(name, e.to_string());
                return Err(e);
            }
        };

        let (added, enabled) = {
            let mut state = guard.borrow_mut();
            let added = state.activate(name, capabilities);
            (added, state.enabled.clone())
        };

        if !self.persistence.set_enabled(&enabled) {
            warn!(
                "Rolling back enable of plugin '{}': removing {} capabilities",
                name,
                added.len()
            );
            guard.borrow_mut().deactivate(name);
            return Err(PluginSystemError::Persistence {
                plugin: name.to_string(),
                operation: "enabling".to_string(),
            });
        }

        guard.borrow_mut().set_state(name, PluginState::Enabled);
        info!("Enabled plugin '{}' with capabilities {:?}", name, added);
        Ok(())
    }

    /// Disable a plugin, removing exactly the capabilities it added. Anything
    /// not currently enabled, unknown names included, is a no-op. A
    /// persistence failure is logged but the plugin stays disabled.
    pub fn disable(&self, name: &str) -> PluginResult<()> {
        let guard = self.lock();

        if !guard.borrow().plugins.get(name).is_some_and(PluginManifest::is_enabled) {
            debug!("Plugin '{}' is not enabled, nothing to disable", name);
            return Ok(());
        }

        let (removed, enabled) = {
            let mut state = guard.borrow_mut();
            let removed = state.deactivate(name);
            (removed, state.enabled.clone())
        };

        if !self.persistence.set_enabled(&enabled) {
            error!(
                "Plugin '{}' disabled in memory, but the enabled set could not be persisted",
                name
            );
        }

        guard.borrow_mut().set_state(name, PluginState::Disabled);
        info!("Disabled plugin '{}', removed capabilities {:?}", name, removed);
        Ok(())
    }

    /// Snapshot of the capability index
    pub fn get_capabilities(&self) -> BTreeMap<String, RegisteredCapability> {
        let guard = self.lock();
        let state = guard.borrow();
        state
            .capabilities
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    /// Snapshot of all known manifests, ordered by name
    pub fn get_manifests(&self) -> Vec<PluginManifest> {
        let guard = self.lock();
        let state = guard.borrow();
        state.plugins.values().cloned().collect()
    }

    pub fn get_manifest(&self, name: &str) -> Option<PluginManifest> {
        let guard = self.lock();
        let state = guard.borrow();
        state.plugins.get(name).cloned()
    }

    /// Look up one capability for dispatch
    pub fn get_capability(&self, name: &str) -> Option<RegisteredCapability> {
        let guard = self.lock();
        let state = guard.borrow();
        state.capabilities.get(name).cloned()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        let guard = self.lock();
        let state = guard.borrow();
        state.enabled.contains(name)
    }

    /// The in-memory enabled set
    pub fn enabled_plugins(&self) -> BTreeSet<String> {
        let guard = self.lock();
        let state = guard.borrow();
        state.enabled.clone()
    }

    /// Capability names `name` currently contributes, sorted
    pub fn plugin_capabilities(&self, name: &str) -> Vec<String> {
        let guard = self.lock();
        let state = guard.borrow();
        let mut names = state.owned.get(name).cloned().unwrap_or_default();
        names.sort();
        names
    }
}

impl Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("discovery", &self.discovery)
            .finish_non_exhaustive()
    }
}
