//! Aggregate queries over caller-supplied numbers, exposed as `run_query`.
use std::sync::Arc;

use capstan_core::plugin_system::CapabilityCatalog;
use capstan_core::{Capability, CapabilityError, Identity};
use log::debug;
use serde_json::{json, Value};

pub const PLUGIN_NAME: &str = "analytics";

/// Roles allowed to see and call `run_query`
pub const ALLOWED_ROLES: &[&str] = &["analyst", "admin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "count" => Some(Aggregate::Count),
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            _ => None,
        }
    }

    /// `None` when the aggregate is undefined for an empty input
    fn apply(self, values: &[f64]) -> Option<f64> {
        match self {
            Aggregate::Count => Some(values.len() as f64),
            Aggregate::Sum => Some(values.iter().sum()),
            Aggregate::Avg if values.is_empty() => None,
            Aggregate::Avg => Some(values.iter().sum::<f64>() / values.len() as f64),
            Aggregate::Min => values.iter().copied().reduce(f64::min),
            Aggregate::Max => values.iter().copied().reduce(f64::max),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunQuery;

impl Capability for RunQuery {
    fn name(&self) -> &str {
        "run_query"
    }

    fn description(&self) -> &str {
        "Compute count, sum, avg, min or max over a list of numbers"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "op": { "type": "string", "enum": ["count", "sum", "avg", "min", "max"] },
                "values": { "type": "array", "items": { "type": "number" } }
            },
            "required": ["op", "values"],
            "additionalProperties": false
        })
    }

    fn requires_permission(&self) -> bool {
        true
    }

    fn check_permission(&self, identity: &Identity) -> Result<bool, CapabilityError> {
        Ok(ALLOWED_ROLES.iter().any(|role| identity.has_role(role)))
    }

    fn execute(&self, args: Value) -> Result<Value, CapabilityError> {
        let op = args.get("op").and_then(Value::as_str).unwrap_or_default();
        let aggregate = Aggregate::parse(op)
            .ok_or_else(|| CapabilityError::InvalidArguments(format!("Unknown aggregate '{}'", op)))?;

        let raw = args
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| CapabilityError::InvalidArguments("'values' must be an array".to_string()))?;
        let values = raw
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| CapabilityError::InvalidArguments(format!("Not a number: {}", v)))
            })
            .collect::<Result<Vec<f64>, _>>()?;

        debug!("run_query {} over {} values", op, values.len());
        Ok(json!({ "op": op, "result": aggregate.apply(&values) }))
    }
}

/// Add this plugin's capability factories to the host catalog
pub fn register(catalog: &mut CapabilityCatalog) {
    catalog.register(PLUGIN_NAME, "run_query", || Ok(Arc::new(RunQuery) as Arc<dyn Capability>));
}
