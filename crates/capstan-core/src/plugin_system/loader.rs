use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::traits::{catch_capability_panic, Capability};

/// Builds one capability instance. Errors are hard resolution failures.
pub type CapabilityFactory = Arc<dyn Fn() -> Result<Arc<dyn Capability>, String> + Send + Sync>;

/// Why a capability implementation could not be produced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("No implementation registered for capability '{capability}' of plugin '{plugin}'")]
    Unknown { plugin: String, capability: String },
    #[error("Failed to instantiate capability '{capability}' of plugin '{plugin}': {message}")]
    Instantiation {
        plugin: String,
        capability: String,
        message: String,
    },
}

/// The single seam through which capability implementations are found.
pub trait CapabilityResolver: Send + Sync {
    fn resolve(&self, plugin: &str, capability: &str) -> Result<Arc<dyn Capability>, ResolveError>;
}

/// Compile-time factory table keyed by `(plugin, capability)`.
///
/// Plugin crates add their factories at bootstrap; nothing is looked up by
/// reflection at runtime.
#[derive(Clone, Default)]
pub struct CapabilityCatalog {
    factories: HashMap<(String, String), CapabilityFactory>,
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `capability` as provided by `plugin`.
    /// A later registration for the same pair replaces the earlier one.
    pub fn register<F>(&mut self, plugin: &str, capability: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Capability>, String> + Send + Sync + 'static,
    {
        self.factories
            .insert((plugin.to_string(), capability.to_string()), Arc::new(factory));
        self
    }

    /// Register an already-built, shared instance under its own name
    pub fn register_instance(&mut self, plugin: &str, capability: Arc<dyn Capability>) -> &mut Self {
        let name = capability.name().to_string();
        self.register(plugin, &name, move || Ok(capability.clone()))
    }

    pub fn contains(&self, plugin: &str, capability: &str) -> bool {
        self.factories
            .contains_key(&(plugin.to_string(), capability.to_string()))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl CapabilityResolver for CapabilityCatalog {
    fn resolve(&self, plugin: &str, capability: &str) -> Result<Arc<dyn Capability>, ResolveError> {
        let factory = self
            .factories
            .get(&(plugin.to_string(), capability.to_string()))
            .ok_or_else(|| ResolveError::Unknown {
                plugin: plugin.to_string(),
                capability: capability.to_string(),
            })?;

        let instantiation = |message: String| ResolveError::Instantiation {
            plugin: plugin.to_string(),
            capability: capability.to_string(),
            message,
        };

        match catch_capability_panic(|| (**factory)()) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(message)) => Err(instantiation(message)),
            Err(panic) => Err(instantiation(format!("factory panicked: {}", panic))),
        }
    }
}

impl fmt::Debug for CapabilityCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .factories
            .keys()
            .map(|(plugin, capability)| format!("{}/{}", plugin, capability))
            .collect();
        keys.sort();
        f.debug_struct("CapabilityCatalog").field("factories", &keys).finish()
    }
}

/// Turns a manifest's declared capability names into live capabilities.
///
/// Failure is graded. A resolution or conformance failure aborts the whole
/// load. A failed dependency precondition, or a name another plugin already
/// owns, only drops that one capability with a warning. Panics in capability
/// code are caught and graded the same way: a panicking conformance check
/// aborts, a panicking dependency check skips.
#[derive(Clone)]
pub struct CapabilityLoader {
    resolver: Arc<dyn CapabilityResolver>,
}

impl CapabilityLoader {
    pub fn new(resolver: Arc<dyn CapabilityResolver>) -> Self {
        Self { resolver }
    }

    /// Load the capabilities of `manifest`. `claimed` maps every capability
    /// name currently in the registry to its owning plugin.
    pub fn load(
        &self,
        manifest: &PluginManifest,
        claimed: &HashMap<String, String>,
    ) -> Result<Vec<Arc<dyn Capability>>, PluginSystemError> {
        let plugin = manifest.name.as_str();
        let mut loaded: Vec<Arc<dyn Capability>> = Vec::new();

        for declared in &manifest.declared_capabilities {
            let capability = self
                .resolver
                .resolve(plugin, declared)
                .map_err(|e| PluginSystemError::capability_load(plugin, declared, e.to_string()))?;

            catch_capability_panic(|| Self::check_conformance(plugin, declared, capability.as_ref()))
                .map_err(|panic| {
                    PluginSystemError::capability_load(plugin, declared, format!("conformance check panicked: {}", panic))
                })??;

            if let Some(owner) = claimed.get(declared) {
                warn!(
                    "Rejecting capability '{}' from plugin '{}': name already registered by plugin '{}'",
                    declared, plugin, owner
                );
                continue;
            }

            match catch_capability_panic(|| capability.check_dependencies()) {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => {
                    warn!(
                        "Skipping capability '{}' of plugin '{}': dependency check failed: {}",
                        declared, plugin, reason
                    );
                    continue;
                }
                Err(panic) => {
                    error!(
                        "Skipping capability '{}' of plugin '{}': dependency check panicked: {}",
                        declared, plugin, panic
                    );
                    continue;
                }
            }

            debug!("Loaded capability '{}' for plugin '{}'", declared, plugin);
            loaded.push(capability);
        }

        info!(
            "Plugin '{}': loaded {}/{} declared capabilities",
            plugin,
            loaded.len(),
            manifest.declared_capabilities.len()
        );
        Ok(loaded)
    }

    /// Reject implementations that do not honour the capability contract
    fn check_conformance(plugin: &str, declared: &str, capability: &dyn Capability) -> Result<(), PluginSystemError> {
        let name = capability.name();
        if name.trim().is_empty() {
            return Err(PluginSystemError::capability_load(plugin, declared, "implementation reports an empty name"));
        }
        if name != declared {
            return Err(PluginSystemError::capability_load(
                plugin,
                declared,
                format!("implementation reports name '{}'", name),
            ));
        }
        if !capability.input_schema().is_object() {
            return Err(PluginSystemError::capability_load(
                plugin,
                declared,
                "input schema is not a JSON object",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for CapabilityLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityLoader").finish_non_exhaustive()
    }
}
