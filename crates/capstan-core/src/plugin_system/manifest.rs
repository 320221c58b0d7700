use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::version::{parse_version, VersionRange};
use crate::storage::ConfigFormat;

/// Lifecycle state of a discovered plugin.
///
/// `Discovered -> Enabled -> Disabled`, with any state moving to `Error` when
/// loading fails. Only a `refresh()` that rediscovers the plugin healthy takes
/// it out of `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Discovered,
    Enabled,
    Disabled,
    Error,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PluginState::Discovered => "discovered",
            PluginState::Enabled => "enabled",
            PluginState::Disabled => "disabled",
            PluginState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Discovered metadata record describing a plugin, before and after load attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginManifest {
    /// Unique plugin name; the key everywhere else
    pub name: String,

    /// Human-readable name
    pub display_name: String,

    /// Plugin description
    pub description: String,

    /// Plugin version (semver)
    pub version: String,

    /// Names of the capabilities this plugin exposes
    pub declared_capabilities: BTreeSet<String>,

    /// Current lifecycle state
    pub state: PluginState,

    /// Why the plugin is in `Error`, if it is
    pub error_message: Option<String>,

    /// Plugin author (optional)
    pub author: Option<String>,

    /// Host API constraint, e.g. "^0.1" (optional)
    pub api_version: Option<String>,

    /// Tags for categorization
    pub tags: Vec<String>,

    /// Directory the manifest was discovered in
    #[serde(skip)]
    pub plugin_dir: Option<PathBuf>,
}

impl PluginManifest {
    /// Create a new, healthy plugin manifest in state `Discovered`
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: String::new(),
            version: version.to_string(),
            declared_capabilities: BTreeSet::new(),
            state: PluginState::Discovered,
            error_message: None,
            author: None,
            api_version: None,
            tags: Vec::new(),
            plugin_dir: None,
        }
    }

    /// Placeholder manifest for a plugin whose manifest could not be loaded
    pub fn errored(name: &str, plugin_dir: Option<PathBuf>, message: impl Into<String>) -> Self {
        let mut manifest = Self::new(name, "0.0.0");
        manifest.plugin_dir = plugin_dir;
        manifest.mark_error(message);
        manifest
    }

    /// Capability names in declaration order (sorted)
    pub fn get_capability_names(&self) -> Vec<String> {
        self.declared_capabilities.iter().cloned().collect()
    }

    pub fn is_error(&self) -> bool {
        self.state == PluginState::Error
    }

    pub fn is_enabled(&self) -> bool {
        self.state == PluginState::Enabled
    }

    /// Move to `Error`, recording why
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.state = PluginState::Error;
        self.error_message = Some(message.into());
    }

    /// Parse a manifest file's contents. `path` is only used for error context
    /// and to remember the plugin directory.
    pub fn parse(content: &str, format: ConfigFormat, path: &Path) -> Result<Self, PluginSystemError> {
        let raw: RawPluginManifest = format.parse(content).map_err(|e| PluginSystemError::ManifestError {
            path: path.to_path_buf(),
            message: format!("Failed to parse {} manifest", format.extension()),
            source: Some(Box::new(e)),
        })?;
        raw.into_manifest(path)
    }

    /// The `name` a manifest file declares, even when the rest of it is
    /// invalid. `None` when the content does not parse that far.
    pub fn declared_name(content: &str, format: ConfigFormat) -> Option<String> {
        #[derive(Deserialize)]
        struct NameOnly {
            name: String,
        }

        let raw: NameOnly = format.parse(content).ok()?;
        let name = raw.name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

// --- Intermediate struct for deserialization ---

#[derive(Deserialize, Debug)]
struct RawPluginManifest {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    version: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl RawPluginManifest {
    fn into_manifest(self, path: &Path) -> Result<PluginManifest, PluginSystemError> {
        let manifest_error = |message: String| PluginSystemError::ManifestError {
            path: path.to_path_buf(),
            message,
            source: None,
        };

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(manifest_error("Manifest 'name' must not be empty".to_string()));
        }

        parse_version(&self.version)
            .map_err(|e| manifest_error(format!("Invalid 'version' for plugin '{}': {}", name, e)))?;

        if let Some(constraint) = &self.api_version {
            let range = VersionRange::from_constraint(constraint)
                .map_err(|e| manifest_error(format!("Invalid 'api_version' for plugin '{}': {}", name, e)))?;
            let host = parse_version(constants::API_VERSION)?;
            if !range.includes(&host) {
                return Err(manifest_error(format!(
                    "Plugin '{}' requires API version '{}', host provides '{}'",
                    name, constraint, constants::API_VERSION
                )));
            }
        }

        let mut declared_capabilities = BTreeSet::new();
        for capability in self.capabilities {
            let capability = capability.trim().to_string();
            if capability.is_empty() {
                return Err(manifest_error(format!("Plugin '{}' declares an empty capability name", name)));
            }
            declared_capabilities.insert(capability);
        }

        Ok(PluginManifest {
            display_name: self.display_name.unwrap_or_else(|| name.clone()),
            name,
            description: self.description,
            version: self.version,
            declared_capabilities,
            state: PluginState::Discovered,
            error_message: None,
            author: self.author,
            api_version: self.api_version,
            tags: self.tags,
            plugin_dir: path.parent().map(Path::to_path_buf),
        })
    }
}

/// Builder for creating a plugin manifest
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            manifest: PluginManifest::new(name, version),
        }
    }

    /// Set the human-readable name
    pub fn display_name(mut self, display_name: &str) -> Self {
        self.manifest.display_name = display_name.to_string();
        self
    }

    /// Set the plugin description
    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = description.to_string();
        self
    }

    /// Set the plugin author
    pub fn author(mut self, author: &str) -> Self {
        self.manifest.author = Some(author.to_string());
        self
    }

    /// Declare a capability
    pub fn capability(mut self, name: &str) -> Self {
        self.manifest.declared_capabilities.insert(name.to_string());
        self
    }

    /// Declare several capabilities
    pub fn capabilities(mut self, names: &[&str]) -> Self {
        for name in names {
            self.manifest.declared_capabilities.insert(name.to_string());
        }
        self
    }

    /// Add a tag to the plugin
    pub fn tag(mut self, tag: &str) -> Self {
        self.manifest.tags.push(tag.to_string());
        self
    }

    /// Build the manifest
    pub fn build(self) -> PluginManifest {
        self.manifest
    }
}
