//! Built-in help documents served as the `doc_get` and `doc_list` capabilities.
use std::sync::Arc;

use capstan_core::plugin_system::CapabilityCatalog;
use capstan_core::{Capability, CapabilityError};
use log::debug;
use serde::Serialize;
use serde_json::{json, Value};

/// Name this plugin's manifest declares
pub const PLUGIN_NAME: &str = "core-docs";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Document {
    pub id: &'static str,
    pub title: &'static str,
    pub body: &'static str,
}

const DOCUMENTS: &[Document] = &[
    Document {
        id: "plugins/enable",
        title: "Enabling plugins",
        body: "Run `capstan plugin enable <name>`. The plugin's capabilities become available \
               immediately and the choice is remembered across restarts.",
    },
    Document {
        id: "plugins/disable",
        title: "Disabling plugins",
        body: "Run `capstan plugin disable <name>`. Only the capabilities that plugin added are removed.",
    },
    Document {
        id: "plugins/manifest",
        title: "Plugin manifests",
        body: "Each plugin directory holds a manifest.json, manifest.toml or manifest.yaml naming the \
               plugin, its semver version and the capabilities it exposes.",
    },
    Document {
        id: "tools/call",
        title: "Calling tools",
        body: "Run `capstan call <tool> --args '<json>'`. The result reports an outcome and either a \
               payload or an error.",
    },
];

fn find(id: &str) -> Option<&'static Document> {
    DOCUMENTS.iter().find(|doc| doc.id == id)
}

/// Fetch one document by id
#[derive(Debug, Default)]
pub struct DocGet;

impl Capability for DocGet {
    fn name(&self) -> &str {
        "doc_get"
    }

    fn description(&self) -> &str {
        "Fetch a help document by id"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Document id, e.g. plugins/enable" }
            },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    fn execute(&self, args: Value) -> Result<Value, CapabilityError> {
        let id = args
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::InvalidArguments("'id' must be a string".to_string()))?;
        debug!("doc_get '{}'", id);
        let doc = find(id).ok_or_else(|| CapabilityError::InvalidArguments(format!("No document with id '{}'", id)))?;
        serde_json::to_value(doc).map_err(|e| CapabilityError::Execution(e.to_string()))
    }
}

/// List document ids and titles, optionally under a prefix
#[derive(Debug, Default)]
pub struct DocList;

impl Capability for DocList {
    fn name(&self) -> &str {
        "doc_list"
    }

    fn description(&self) -> &str {
        "List available help documents"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prefix": { "type": "string", "description": "Only ids starting with this" }
            },
            "additionalProperties": false
        })
    }

    fn execute(&self, args: Value) -> Result<Value, CapabilityError> {
        let prefix = args.get("prefix").and_then(Value::as_str).unwrap_or("");
        let listed: Vec<Value> = DOCUMENTS
            .iter()
            .filter(|doc| doc.id.starts_with(prefix))
            .map(|doc| json!({ "id": doc.id, "title": doc.title }))
            .collect();
        Ok(Value::Array(listed))
    }
}

/// Add this plugin's capability factories to the host catalog
pub fn register(catalog: &mut CapabilityCatalog) {
    catalog
        .register(PLUGIN_NAME, "doc_get", || Ok(Arc::new(DocGet) as Arc<dyn Capability>))
        .register(PLUGIN_NAME, "doc_list", || Ok(Arc::new(DocList) as Arc<dyn Capability>));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_get_returns_document() {
        let doc = DocGet.execute(json!({ "id": "tools/call" })).unwrap();
        assert_eq!(doc["title"], "Calling tools");
    }

    #[test]
    fn doc_get_unknown_id_is_invalid_arguments() {
        let err = DocGet.execute(json!({ "id": "nope" })).unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArguments(_)));
    }

    #[test]
    fn doc_list_filters_by_prefix() {
        let all = DocList.execute(json!({})).unwrap();
        assert_eq!(all.as_array().unwrap().len(), DOCUMENTS.len());

        let plugins = DocList.execute(json!({ "prefix": "plugins/" })).unwrap();
        assert_eq!(plugins.as_array().unwrap().len(), 3);
    }

    #[test]
    fn register_adds_both_capabilities() {
        let mut catalog = CapabilityCatalog::new();
        register(&mut catalog);
        assert!(catalog.contains(PLUGIN_NAME, "doc_get"));
        assert!(catalog.contains(PLUGIN_NAME, "doc_list"));
        assert_eq!(catalog.len(), 2);
    }
}
