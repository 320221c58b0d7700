use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::kernel::error::{Error, Result};
use crate::kernel::settings::Settings;
use crate::plugin_system::{
    CapabilityCatalog, CapabilityLoader, CapabilityRegistry, CapabilityResolver, PluginDiscovery,
    PluginManager, RefreshReport,
};
use crate::storage::{
    ConfigFormat, ConfigManager, ConfigStore, EnabledPluginStore, FileConfigStore, LocalStorageProvider,
    StorageProvider,
};

/// Composition root. Wires storage, persistence, discovery, loading, the
/// manager and the registry together explicitly; nothing here is global.
pub struct Application {
    settings: Settings,
    manager: Arc<PluginManager>,
    registry: CapabilityRegistry,
    startup_report: RefreshReport,
}

impl Application {
    /// Build the application on the local filesystem and run the initial
    /// refresh. `catalog` holds every capability factory linked into the host.
    pub fn new(settings: Settings, catalog: CapabilityCatalog) -> Result<Self> {
        let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(PathBuf::new()));

        let format = ConfigFormat::from_path(Path::new(&settings.state_file)).ok_or_else(|| {
            Error::Settings(format!(
                "State file '{}' has no supported config extension",
                settings.state_file
            ))
        })?;
        let config_manager = ConfigManager::new(provider.clone(), settings.state_dir.clone(), format);
        let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(config_manager, settings.state_file.clone()));

        Ok(Self::with_components(settings, provider, store, Arc::new(catalog)))
    }

    /// Build the application from explicit collaborators and run the initial refresh
    pub fn with_components(
        settings: Settings,
        provider: Arc<dyn StorageProvider>,
        store: Arc<dyn ConfigStore>,
        resolver: Arc<dyn CapabilityResolver>,
    ) -> Self {
        let discovery = PluginDiscovery::new(provider, settings.plugins_dir.clone());
        let loader = CapabilityLoader::new(resolver);
        let persistence = EnabledPluginStore::new(store);

        let manager = Arc::new(PluginManager::new(discovery, loader, persistence));
        let startup_report = manager.refresh();
        let registry = CapabilityRegistry::new(manager.clone());

        info!(
            "Application ready: plugins from {}, state in {}",
            settings.plugins_dir.display(),
            settings.state_path().display()
        );

        Self {
            settings,
            manager,
            registry,
            startup_report,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn plugin_manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// What the initial refresh found
    pub fn startup_report(&self) -> &RefreshReport {
        &self.startup_report
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
