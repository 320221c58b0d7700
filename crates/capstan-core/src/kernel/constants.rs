/// Application name
pub const APP_NAME: &str = "capstan";

/// Current plugin API version. Manifests may constrain against it.
pub const API_VERSION: &str = "0.1.0";

/// Default settings file name, looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "capstan.toml";

/// Default plugins directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default directory for durable state
pub const DEFAULT_STATE_DIR: &str = ".capstan";

/// Default name of the durable state config (extension picks the format)
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// Manifest file names looked for in every plugin directory, in order
pub const MANIFEST_FILE_NAMES: &[&str] = &["manifest.json", "manifest.toml", "manifest.yaml", "manifest.yml"];

/// Config key holding the persisted enabled-plugin set
pub const ENABLED_PLUGINS_KEY: &str = "plugins.enabled";
