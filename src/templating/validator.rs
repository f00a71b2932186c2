//! Parameter validation against an inferred schema.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One problem found in a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// JSON pointer to the offending value; empty for the parameter object itself
    pub path: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Compiled validator for one template's parameter schema.
///
/// Besides validating, it normalizes input the way rendering expects: a scalar
/// given for an array parameter is wrapped in a one-element array, and missing
/// parameters can be filled from schema defaults.
pub struct ParamValidator {
    validator: jsonschema::Validator,
    array_properties: Vec<String>,
    defaults: Vec<(String, Value)>,
}

impl fmt::Debug for ParamValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamValidator")
            .field("array_properties", &self.array_properties)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl ParamValidator {
    /// Compile a validator for an object schema with `properties`.
    ///
    /// # Errors
    ///
    /// Fails if `schema` is not a valid JSON Schema.
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| anyhow::anyhow!("Invalid parameter schema: {e}"))?;

        let mut array_properties = Vec::new();
        let mut defaults = Vec::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, fragment) in properties {
                if fragment.get("type").and_then(Value::as_str) == Some("array") {
                    array_properties.push(name.clone());
                }
                if let Some(default) = fragment.get("default") {
                    defaults.push((name.clone(), default.clone()));
                }
            }
        }

        Ok(Self {
            validator,
            array_properties,
            defaults,
        })
    }

    /// Wrap scalar values given for array properties in one-element arrays.
    pub fn coerce(&self, input: &mut Map<String, Value>) {
        for name in &self.array_properties {
            if let Some(value) = input.get_mut(name) {
                if !value.is_array() && !value.is_null() {
                    *value = Value::Array(vec![value.take()]);
                }
            }
        }
    }

    /// Insert schema defaults for properties the input does not carry.
    pub fn fill_defaults(&self, input: &mut Map<String, Value>) {
        for (name, default) in &self.defaults {
            if !input.contains_key(name) {
                input.insert(name.clone(), default.clone());
            }
        }
    }

    /// Coerce and then fill defaults, returning a new map.
    pub fn prepare(&self, input: &Map<String, Value>) -> Map<String, Value> {
        let mut prepared = input.clone();
        self.coerce(&mut prepared);
        self.fill_defaults(&mut prepared);
        prepared
    }

    /// Validate `input`, returning `None` when it is acceptable.
    ///
    /// Input is coerced first, but defaults are not filled, so every missing
    /// required parameter is reported.
    pub fn validate(&self, input: &Value) -> Option<Vec<ValidationIssue>> {
        let Some(object) = input.as_object() else {
            return Some(vec![ValidationIssue {
                path: String::new(),
                message: format!("parameters must be a JSON object, got {}", type_name(input)),
            }]);
        };

        let mut coerced = object.clone();
        self.coerce(&mut coerced);
        let coerced = Value::Object(coerced);

        let issues: Vec<ValidationIssue> = self
            .validator
            .iter_errors(&coerced)
            .map(|e| ValidationIssue {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if issues.is_empty() { None } else { Some(issues) }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
