//! Fixtures shared by the plugin system tests.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use crate::kernel::error::{Error, Result};
use crate::plugin_system::{
    Capability, CapabilityCatalog, CapabilityError, CapabilityLoader, Identity, PluginDiscovery, PluginManager,
};
use crate::storage::{ConfigStore, EnabledPluginStore, LocalStorageProvider, MemoryConfigStore, StorageProvider};

/// How a mock capability answers permission checks
#[derive(Debug, Clone)]
pub enum Permission {
    Open,
    Role(String),
    Deny,
    Error,
    Panic,
}

/// What a mock capability does when executed
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return `{"capability": name, "args": args}`
    Echo,
    Fail(CapabilityError),
    Panic,
    /// Signal `started`, then wait (bounded) for a message on `release`
    Gate {
        started: Sender<()>,
        release: Arc<Mutex<Receiver<()>>>,
    },
}

#[derive(Debug, Clone)]
pub struct MockCapability {
    pub name: String,
    pub reported_name: Option<String>,
    pub schema: Value,
    pub permission: Permission,
    pub dependency_error: Option<String>,
    pub dependency_panics: bool,
    /// While set, `input_schema` panics
    pub schema_panics: Arc<AtomicBool>,
    pub behavior: Behavior,
}

impl MockCapability {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reported_name: None,
            schema: json!({ "type": "object", "properties": {} }),
            permission: Permission::Open,
            dependency_error: None,
            dependency_panics: false,
            schema_panics: Arc::new(AtomicBool::new(false)),
            behavior: Behavior::Echo,
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_dependency_error(mut self, reason: &str) -> Self {
        self.dependency_error = Some(reason.to_string());
        self
    }

    pub fn with_dependency_panic(mut self) -> Self {
        self.dependency_panics = true;
        self
    }

    /// Tie `input_schema` panics to `switch`
    pub fn with_schema_panic(mut self, switch: Arc<AtomicBool>) -> Self {
        self.schema_panics = switch;
        self
    }

    /// Report a different name than the one it is registered under
    pub fn reporting_name(mut self, name: &str) -> Self {
        self.reported_name = Some(name.to_string());
        self
    }

    pub fn shared(self) -> Arc<dyn Capability> {
        Arc::new(self)
    }
}

impl Capability for MockCapability {
    fn name(&self) -> &str {
        self.reported_name.as_deref().unwrap_or(&self.name)
    }

    fn description(&self) -> &str {
        "mock capability"
    }

    fn input_schema(&self) -> Value {
        if self.schema_panics.load(Ordering::SeqCst) {
            panic!("schema exploded");
        }
        self.schema.clone()
    }

    fn requires_permission(&self) -> bool {
        !matches!(self.permission, Permission::Open)
    }

    fn check_permission(&self, identity: &Identity) -> std::result::Result<bool, CapabilityError> {
        match &self.permission {
            Permission::Open => Ok(true),
            Permission::Role(role) => Ok(identity.has_role(role)),
            Permission::Deny => Ok(false),
            Permission::Error => Err(CapabilityError::Execution("permission backend down".to_string())),
            Permission::Panic => panic!("permission check exploded"),
        }
    }

    fn check_dependencies(&self) -> std::result::Result<(), String> {
        if self.dependency_panics {
            panic!("dependency check exploded");
        }
        match &self.dependency_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn execute(&self, args: Value) -> std::result::Result<Value, CapabilityError> {
        match &self.behavior {
            Behavior::Echo => Ok(json!({ "capability": self.name, "args": args })),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Panic => panic!("capability exploded"),
            Behavior::Gate { started, release } => {
                started.send(()).ok();
                let released = release.lock().unwrap().recv_timeout(Duration::from_secs(10)).is_ok();
                Ok(json!({ "capability": self.name, "released": released }))
            }
        }
    }
}

/// [`ConfigStore`] whose writes can be made to fail on demand
#[derive(Debug, Default)]
pub struct FlakyConfigStore {
    inner: MemoryConfigStore,
    fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ConfigStore for FlakyConfigStore {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_value(key)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::from("simulated write failure"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_value(key, value)
    }
}

/// Provider that resolves paths as given, for use with absolute temp paths
pub fn provider() -> Arc<dyn StorageProvider> {
    Arc::new(LocalStorageProvider::new(PathBuf::new()))
}

/// Create `root/dir/manifest.json` for a plugin declaring `capabilities`
pub fn write_plugin(root: &Path, dir: &str, name: &str, capabilities: &[&str]) -> PathBuf {
    let manifest = json!({
        "name": name,
        "version": "1.0.0",
        "description": format!("{} test plugin", name),
        "capabilities": capabilities,
    });
    write_manifest(root, dir, "manifest.json", &manifest.to_string())
}

/// Create `root/dir/file_name` with raw contents
pub fn write_manifest(root: &Path, dir: &str, file_name: &str, contents: &str) -> PathBuf {
    let plugin_dir = root.join(dir);
    std::fs::create_dir_all(&plugin_dir).expect("create plugin dir");
    std::fs::write(plugin_dir.join(file_name), contents).expect("write manifest");
    plugin_dir
}

/// Catalog with echo capabilities for every `(plugin, capability)` pair
pub fn catalog_of(entries: &[(&str, &[&str])]) -> CapabilityCatalog {
    let mut catalog = CapabilityCatalog::new();
    for (plugin, capabilities) in entries {
        for capability in *capabilities {
            catalog.register_instance(plugin, MockCapability::new(capability).shared());
        }
    }
    catalog
}

/// Manager over a plugin root, a config store and a catalog. Not refreshed yet.
pub fn manager(root: &Path, store: Arc<dyn ConfigStore>, catalog: CapabilityCatalog) -> Arc<PluginManager> {
    let discovery = PluginDiscovery::new(provider(), root.to_path_buf());
    let loader = CapabilityLoader::new(Arc::new(catalog));
    Arc::new(PluginManager::new(discovery, loader, EnabledPluginStore::new(store)))
}

/// Sorted capability names in the manager's index
pub fn capability_names(manager: &PluginManager) -> Vec<String> {
    manager.get_capabilities().into_keys().collect()
}
