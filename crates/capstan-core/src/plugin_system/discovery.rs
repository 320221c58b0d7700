use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::kernel::constants::MANIFEST_FILE_NAMES;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::PluginManifest;
use crate::storage::{ConfigFormat, StorageProvider};

/// Scans a plugin root and turns every plugin directory into a manifest.
///
/// Each immediate subdirectory holding a `manifest.{json,toml,yaml,yml}` is
/// one plugin. A manifest that cannot be read or parsed yields a manifest in
/// state `Error`; it never stops the scan. Such a manifest keeps the `name` the
/// file declares when that much parses, otherwise it is named after its
/// directory. Discovery is read-only.
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    provider: Arc<dyn StorageProvider>,
    root: PathBuf,
}

impl PluginDiscovery {
    pub fn new(provider: Arc<dyn StorageProvider>, root: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the plugin root. Results are ordered by directory name; when two
    /// directories claim the same plugin name, the first one wins.
    pub fn discover(&self) -> Vec<PluginManifest> {
        if !self.provider.is_dir(&self.root) {
            warn!("Plugin root {} does not exist or is not a directory", self.root.display());
            return Vec::new();
        }

        let entries = match self.provider.read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read plugin root {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut manifests = Vec::new();
        let mut seen = HashSet::new();

        for entry in entries {
            if !self.provider.is_dir(&entry) {
                continue;
            }
            let Some(manifest) = self.discover_one(&entry) else {
                continue;
            };

            if !seen.insert(manifest.name.clone()) {
                warn!(
                    "Skipping plugin directory {}: plugin name '{}' is already taken",
                    entry.display(),
                    manifest.name
                );
                continue;
            }
            manifests.push(manifest);
        }

        info!(
            "Discovered {} plugin(s) under {} ({} in error)",
            manifests.len(),
            self.root.display(),
            manifests.iter().filter(|m| m.is_error()).count()
        );
        manifests
    }

    /// Resolve one plugin directory. `None` when it holds no manifest file.
    fn discover_one(&self, dir: &Path) -> Option<PluginManifest> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let Some((manifest_path, format)) = self.find_manifest_file(dir) else {
            debug!("No manifest in {}, not a plugin", dir.display());
            return None;
        };

        let content = match self.provider.read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(e) => return Some(Self::errored(&dir_name, dir, manifest_path, e.to_string())),
        };

        match PluginManifest::parse(&content, format, &manifest_path) {
            Ok(manifest) => {
                debug!("Discovered plugin '{}' v{} in {}", manifest.name, manifest.version, dir.display());
                Some(manifest)
            }
            Err(e) => {
                let name = PluginManifest::declared_name(&content, format).unwrap_or(dir_name);
                Some(Self::errored(&name, dir, manifest_path, e.to_string()))
            }
        }
    }

    fn errored(name: &str, dir: &Path, manifest_path: PathBuf, message: String) -> PluginManifest {
        let err = PluginSystemError::Discovery {
            plugin: name.to_string(),
            path: manifest_path,
            message,
        };
        warn!("{}", err);
        PluginManifest::errored(name, Some(dir.to_path_buf()), err.to_string())
    }

    fn find_manifest_file(&self, dir: &Path) -> Option<(PathBuf, ConfigFormat)> {
        MANIFEST_FILE_NAMES.iter().find_map(|file_name| {
            let path = dir.join(file_name);
            // Formats compiled out are skipped as if the file were absent
            let format = ConfigFormat::from_path(&path)?;
            self.provider.is_file(&path).then_some((path, format))
        })
    }
}
