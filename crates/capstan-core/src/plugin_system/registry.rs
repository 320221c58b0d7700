use std::sync::Arc;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manager::{PluginManager, RegisteredCapability};
use crate::plugin_system::traits::{catch_capability_panic, CapabilityDescriptor, CapabilityError, Identity};

/// Coarse result category of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    PermissionDenied,
    NotFound,
    ValidationError,
    InternalError,
}

/// Structured result of [`CapabilityRegistry::dispatch`]. Exactly one of
/// `payload` (on success) and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn success(payload: Value) -> Self {
        Self {
            outcome: Outcome::Success,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(outcome: Outcome, error: impl Into<String>) -> Self {
        Self {
            outcome,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Read and dispatch façade over the manager's capability index.
///
/// Every capability is filtered through its own permission check per
/// identity. Dispatch never returns an error or unwinds: failures come back
/// as a [`DispatchResult`], details go to the log.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    manager: Arc<PluginManager>,
}

impl CapabilityRegistry {
    pub fn new(manager: Arc<PluginManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Descriptors of every capability `identity` may use, ordered by name
    pub fn get_available(&self, identity: &Identity) -> Vec<CapabilityDescriptor> {
        self.manager
            .get_capabilities()
            .into_values()
            .filter(|entry| is_permitted(entry, identity))
            .filter_map(|entry| describe(&entry))
            .collect()
    }

    /// Descriptor of one capability, if it exists and `identity` may use it
    pub fn get_descriptor(&self, name: &str, identity: &Identity) -> Option<CapabilityDescriptor> {
        self.manager
            .get_capability(name)
            .filter(|entry| is_permitted(entry, identity))
            .and_then(|entry| describe(&entry))
    }

    /// Check permission, validate `args` against the input schema, then run
    /// the capability. The manager lock is only held for the lookup.
    pub fn dispatch(&self, name: &str, args: Value, identity: &Identity) -> DispatchResult {
        let Some(entry) = self.manager.get_capability(name) else {
            debug!("Dispatch of unknown capability '{}' by {}", name, identity);
            return DispatchResult::failure(
                Outcome::NotFound,
                PluginSystemError::CapabilityNotFound(name.to_string()).to_string(),
            );
        };

        if !is_permitted(&entry, identity) {
            warn!("Denied capability '{}' to {}", name, identity);
            return DispatchResult::failure(
                Outcome::PermissionDenied,
                PluginSystemError::PermissionDenied {
                    capability: name.to_string(),
                }
                .to_string(),
            );
        }

        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let capability = entry.capability().clone();
        debug!("Dispatching capability '{}' (plugin '{}') for {}", name, entry.plugin(), identity);
        let outcome = catch_capability_panic(|| {
            validate_arguments(&capability.input_schema(), &args).map_err(CapabilityError::InvalidArguments)?;
            capability.execute(args)
        });

        match outcome {
            Ok(Ok(payload)) => DispatchResult::success(payload),
            Ok(Err(CapabilityError::InvalidArguments(message))) => {
                DispatchResult::failure(Outcome::ValidationError, message)
            }
            Ok(Err(CapabilityError::PermissionDenied(message))) => {
                warn!("Capability '{}' refused {}: {}", name, identity, message);
                DispatchResult::failure(Outcome::PermissionDenied, message)
            }
            Ok(Err(CapabilityError::Execution(message))) => {
                error!("Capability '{}' failed: {}", name, message);
                DispatchResult::failure(Outcome::InternalError, message)
            }
            Err(panic) => {
                error!("Capability '{}' panicked: {}", name, panic);
                DispatchResult::failure(
                    Outcome::InternalError,
                    format!("Capability '{}' encountered an internal error", name),
                )
            }
        }
    }
}

/// Permission check that fails closed: an error or a panic in the check denies.
fn is_permitted(entry: &RegisteredCapability, identity: &Identity) -> bool {
    let capability = entry.capability();
    let checked = catch_capability_panic(|| {
        if capability.requires_permission() {
            capability.check_permission(identity)
        } else {
            Ok(true)
        }
    });
    match checked {
        Ok(Ok(allowed)) => allowed,
        Ok(Err(e)) => {
            warn!(
                "Permission check for '{}' failed for {}, denying: {}",
                entry.name(),
                identity,
                e
            );
            false
        }
        Err(panic) => {
            error!("Permission check for '{}' panicked, denying: {}", entry.name(), panic);
            false
        }
    }
}

/// A capability whose metadata panics is left out of listings
fn describe(entry: &RegisteredCapability) -> Option<CapabilityDescriptor> {
    catch_capability_panic(|| entry.descriptor())
        .map_err(|panic| error!("Describing capability '{}' panicked, hiding it: {}", entry.name(), panic))
        .ok()
}

/// Shallow check of `args` against a JSON Schema object: top-level type,
/// `required` keys, primitive `type` of declared `properties`, and
/// `additionalProperties: false`.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let expects_object = schema.get("type").and_then(Value::as_str).is_none_or(|t| t == "object");
    if !expects_object {
        return Ok(());
    }
    let Some(provided) = args.as_object() else {
        return Err("Arguments must be a JSON object".to_string());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !provided.contains_key(key) {
                return Err(format!("Missing required argument '{}'", key));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    for (key, value) in provided {
        match properties.and_then(|p| p.get(key)) {
            Some(property) => {
                if let Some(expected) = property.get("type").and_then(Value::as_str) {
                    if !matches_type(expected, value) {
                        return Err(format!("Argument '{}' must be of type '{}'", key, expected));
                    }
                }
            }
            None => {
                if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                    return Err(format!("Unexpected argument '{}'", key));
                }
            }
        }
    }
    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keywords are not enforced
        _ => true,
    }
}
