use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who is asking. Capabilities decide per identity whether to serve it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier (user id, service account, ...)
    pub subject: String,
    /// Roles granted to the subject
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            roles: BTreeSet::new(),
        }
    }

    /// An identity with no subject and no roles
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.insert(role.to_string());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("<anonymous>")
        } else {
            f.write_str(&self.subject)
        }
    }
}

/// Error type returned by capability code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The arguments do not fit what the capability accepts
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    /// The capability refused the caller at execution time
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Anything else that went wrong while running
    #[error("Execution failed: {0}")]
    Execution(String),
}

/// A named, schema-described, permission-checked unit of invocable functionality.
///
/// Implementations must be cheap to share: the registry hands out `Arc`s and
/// calls [`execute`](Capability::execute) without holding any manager lock.
pub trait Capability: Send + Sync {
    /// Globally unique capability name
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON Schema of the arguments object. Must be a JSON object.
    fn input_schema(&self) -> Value;

    /// Whether [`check_permission`](Capability::check_permission) gates access
    fn requires_permission(&self) -> bool {
        false
    }

    /// Decide whether `identity` may see and call this capability. Only
    /// consulted when `requires_permission()` is true. The default denies.
    fn check_permission(&self, _identity: &Identity) -> Result<bool, CapabilityError> {
        Ok(false)
    }

    /// Precondition for loading, e.g. an optional external tool being present.
    /// An `Err` skips this capability with a warning instead of failing the plugin.
    fn check_dependencies(&self) -> Result<(), String> {
        Ok(())
    }

    /// Run the capability
    fn execute(&self, args: Value) -> Result<Value, CapabilityError>;
}

/// Serializable description of a capability, as served to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub requires_permission: bool,
    /// Plugin that provides this capability
    pub plugin: String,
}

impl CapabilityDescriptor {
    pub fn from_capability(capability: &dyn Capability, plugin: &str) -> Self {
        Self {
            name: capability.name().to_string(),
            description: capability.description().to_string(),
            input_schema: capability.input_schema(),
            requires_permission: capability.requires_permission(),
            plugin: plugin.to_string(),
        }
    }
}

/// Run capability code, catching a panic. `Err` carries the panic message.
pub(crate) fn catch_capability_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
