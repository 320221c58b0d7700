use std::path::Path;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::{ManifestBuilder, PluginManifest, PluginState};
use crate::storage::ConfigFormat;

fn manifest_path() -> &'static Path {
    Path::new("/plugins/docs/manifest.json")
}

#[test]
fn test_parse_json_manifest() {
    let content = r#"{
        "name": "docs",
        "display_name": "Documentation",
        "description": "Serves docs",
        "version": "1.4.0",
        "capabilities": ["doc_list", "doc_get"],
        "author": "Capstan Developers",
        "tags": ["docs"]
    }"#;
    let manifest = PluginManifest::parse(content, ConfigFormat::Json, manifest_path()).expect("parse manifest");

    assert_eq!(manifest.name, "docs");
    assert_eq!(manifest.display_name, "Documentation");
    assert_eq!(manifest.version, "1.4.0");
    assert_eq!(manifest.state, PluginState::Discovered);
    assert_eq!(manifest.get_capability_names(), vec!["doc_get", "doc_list"]);
    assert_eq!(manifest.author.as_deref(), Some("Capstan Developers"));
    assert_eq!(manifest.tags, vec!["docs"]);
    assert_eq!(manifest.plugin_dir.as_deref(), Some(Path::new("/plugins/docs")));
    assert!(manifest.error_message.is_none());
}

#[cfg(feature = "toml-config")]
#[test]
fn test_parse_toml_manifest_defaults_display_name() {
    let content = r#"
name = "analytics"
version = "0.3.1"
capabilities = ["run_query"]
"#;
    let manifest = PluginManifest::parse(content, ConfigFormat::Toml, Path::new("analytics/manifest.toml"))
        .expect("parse manifest");
    assert_eq!(manifest.display_name, "analytics");
    assert!(manifest.declared_capabilities.contains("run_query"));
    assert!(manifest.description.is_empty());
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_parse_yaml_manifest() {
    let content = "name: search\nversion: 2.0.0\ncapabilities:\n  - search\n";
    let manifest = PluginManifest::parse(content, ConfigFormat::Yaml, Path::new("search/manifest.yaml"))
        .expect("parse manifest");
    assert_eq!(manifest.name, "search");
    assert_eq!(manifest.version, "2.0.0");
}

#[test]
fn test_parse_rejects_malformed_content() {
    let err = PluginManifest::parse("{ not json", ConfigFormat::Json, manifest_path()).unwrap_err();
    match err {
        PluginSystemError::ManifestError { source, .. } => assert!(source.is_some()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_parse_rejects_missing_version() {
    let err = PluginManifest::parse(r#"{"name": "docs"}"#, ConfigFormat::Json, manifest_path()).unwrap_err();
    assert!(matches!(err, PluginSystemError::ManifestError { .. }));
}

#[test]
fn test_parse_rejects_empty_name() {
    let err = PluginManifest::parse(r#"{"name": "  ", "version": "1.0.0"}"#, ConfigFormat::Json, manifest_path())
        .unwrap_err();
    assert!(err.to_string().contains("'name' must not be empty"));
}

#[test]
fn test_parse_rejects_invalid_semver() {
    let err = PluginManifest::parse(r#"{"name": "docs", "version": "one"}"#, ConfigFormat::Json, manifest_path())
        .unwrap_err();
    assert!(err.to_string().contains("Invalid 'version'"));
}

#[test]
fn test_parse_rejects_empty_capability_name() {
    let content = r#"{"name": "docs", "version": "1.0.0", "capabilities": ["doc_get", ""]}"#;
    let err = PluginManifest::parse(content, ConfigFormat::Json, manifest_path()).unwrap_err();
    assert!(err.to_string().contains("empty capability name"));
}

#[test]
fn test_parse_checks_api_version() {
    let compatible = r#"{"name": "docs", "version": "1.0.0", "api_version": "^0.1"}"#;
    let manifest = PluginManifest::parse(compatible, ConfigFormat::Json, manifest_path()).expect("compatible");
    assert_eq!(manifest.api_version.as_deref(), Some("^0.1"));

    let incompatible = r#"{"name": "docs", "version": "1.0.0", "api_version": ">=2.0"}"#;
    let err = PluginManifest::parse(incompatible, ConfigFormat::Json, manifest_path()).unwrap_err();
    assert!(err.to_string().contains("requires API version"));

    let garbage = r#"{"name": "docs", "version": "1.0.0", "api_version": "whenever"}"#;
    let err = PluginManifest::parse(garbage, ConfigFormat::Json, manifest_path()).unwrap_err();
    assert!(err.to_string().contains("Invalid 'api_version'"));
}

#[test]
fn test_errored_manifest() {
    let manifest = PluginManifest::errored("broken", None, "bad manifest");
    assert!(manifest.is_error());
    assert!(!manifest.is_enabled());
    assert_eq!(manifest.error_message.as_deref(), Some("bad manifest"));
}

#[test]
fn test_manifest_builder() {
    let manifest = ManifestBuilder::new("docs", "1.0.0")
        .display_name("Docs")
        .description("Documentation")
        .author("someone")
        .capabilities(&["doc_list", "doc_get"])
        .capability("doc_get")
        .tag("docs")
        .build();

    assert_eq!(manifest.display_name, "Docs");
    assert_eq!(manifest.description, "Documentation");
    assert_eq!(manifest.author.as_deref(), Some("someone"));
    assert_eq!(manifest.declared_capabilities.len(), 2);
    assert_eq!(manifest.tags, vec!["docs"]);
    assert_eq!(manifest.state, PluginState::Discovered);
}

#[test]
fn test_state_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&PluginState::Enabled).unwrap(), "\"enabled\"");
    assert_eq!(PluginState::Error.to_string(), "error");
}
