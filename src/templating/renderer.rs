//! Rendering compiled templates into declarations.
//!
//! [`Engine::render`] runs these steps and returns nothing unless all succeed:
//!
//! 1. **Prepare** the input: coerce array parameters and fill schema defaults.
//!    Values the caller supplied are never replaced.
//! 2. **View**: the prepared input plus a generated `uuid` when the caller gave none.
//! 3. **Substitute** every placeholder with its view value, formatted by the
//!    parameter's [`Interpolation`](super::placeholder::Interpolation).
//! 4. **Parse** the text as JSON; anything else is
//!    [`DeclkitError::MalformedOutput`].
//! 5. **Unwrap** a top-level `declaration` member if there is one.
//! 6. **Stitch** every unit (`"class": "Application"`) inside every grouping
//!    (`"class": "Tenant"`) by attaching the `constants` metadata block. When the
//!    caller gave an `application_name`, one unit per grouping moves to that key
//!    first: the unit keyed by the view's `app_name`, or the grouping's only unit.
//!    Sibling units keep their keys.
//!
//! # Metadata block
//!
//! ```json
//! "app1": {
//!   "class": "Application",
//!   "constants": {
//!     "class": "Constants",
//!     "template": "examples/simple_http",
//!     "view": { "tenant_name": "t1", "application_name": "app1", "uuid": "...", ... }
//!   }
//! }
//! ```

use anyhow::Result;
use serde_json::{Map, Value};

use super::compiler::{Engine, Segment};
use super::validator::ValidationIssue;
use crate::constants::{
    APP_NAME_PARAM, APPLICATION_NAME_PARAM, CONSTANTS_CLASS, CONSTANTS_KEY, GROUPING_CLASS, TENANT_NAME_PARAM,
    UNIT_CLASS, UUID_PARAM,
};
use crate::core::DeclkitError;

const DECLARATION_KEY: &str = "declaration";

impl Engine {
    /// Check `input` against the parameter schema.
    ///
    /// Returns `None` when valid, otherwise every problem found. Missing
    /// parameters are reported even when the schema has a default for them.
    pub fn validate(&self, input: &Value) -> Option<Vec<ValidationIssue>> {
        self.validator.validate(input)
    }

    /// Render a declaration from `input`.
    ///
    /// # Errors
    ///
    /// - [`DeclkitError::MissingParameter`] when a placeholder has no value
    /// - [`DeclkitError::MalformedOutput`] when the substituted text is not JSON
    /// - [`DeclkitError::RenameConflict`] when `application_name` names an existing unit
    pub fn render(&self, input: &Value) -> Result<Value> {
        let view = self.view(input)?;
        let text = self.substitute(&view)?;

        let parsed: Value = serde_json::from_str(&text).map_err(|e| DeclkitError::MalformedOutput {
            template: self.name.clone(),
            reason: e.to_string(),
            view: Value::Object(view.clone()).to_string(),
            text: text.clone(),
        })?;

        let mut body = unwrap_declaration(parsed);
        self.stitch(&mut body, &view)?;

        tracing::debug!(target: "template", "rendered '{}'", self.name);
        Ok(body)
    }

    /// The merged view placeholders are substituted from.
    fn view(&self, input: &Value) -> Result<Map<String, Value>> {
        let empty = Map::new();
        let input = match input {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(DeclkitError::Other {
                    message: format!(
                        "Parameters for template '{}' must be a JSON object, got: {other}",
                        self.name
                    ),
                }
                .into());
            }
        };

        let mut view = self.validator.prepare(input);
        if !view.get(UUID_PARAM).is_some_and(|v| !v.is_null()) {
            view.insert(UUID_PARAM.to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        Ok(view)
    }

    fn substitute(&self, view: &Map<String, Value>) -> Result<String> {
        let mut text = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Slot(index) => {
                    let parameter = &self.parameters[*index];
                    let Some(value) = view.get(&parameter.name) else {
                        return Err(DeclkitError::MissingParameter {
                            template: self.name.clone(),
                            parameter: parameter.name.clone(),
                        }
                        .into());
                    };
                    text.push_str(&parameter.interpolation.format(value));
                }
            }
        }
        Ok(text)
    }

    fn stitch(&self, body: &mut Value, view: &Map<String, Value>) -> Result<()> {
        let Value::Object(root) = body else {
            return Ok(());
        };
        let rename_to = view.get(APPLICATION_NAME_PARAM).and_then(Value::as_str);
        let template_key = view.get(APP_NAME_PARAM).and_then(Value::as_str);

        for (grouping_key, grouping) in root.iter_mut() {
            if !has_class(grouping, GROUPING_CLASS) {
                continue;
            }
            let Value::Object(grouping) = grouping else {
                continue;
            };

            let unit_keys: Vec<String> = grouping
                .iter()
                .filter(|(_, node)| has_class(node, UNIT_CLASS))
                .map(|(key, _)| key.clone())
                .collect();

            let renamed = match template_key {
                Some(key) if unit_keys.iter().any(|k| k == key) => Some(key.to_string()),
                _ if unit_keys.len() == 1 => unit_keys.first().cloned(),
                _ => None,
            };

            for unit_key in unit_keys {
                let final_key = match rename_to {
                    Some(to) if to != unit_key && renamed.as_deref() == Some(unit_key.as_str()) => {
                        rename_member(grouping, grouping_key, &unit_key, to)?;
                        tracing::debug!(target: "template", "renamed unit '{}' to '{}'", unit_key, to);
                        to.to_string()
                    }
                    _ => unit_key,
                };

                if let Some(Value::Object(unit)) = grouping.get_mut(&final_key) {
                    self.attach_constants(unit, view, grouping_key, &final_key);
                }
            }
        }
        Ok(())
    }

    fn attach_constants(
        &self,
        unit: &mut Map<String, Value>,
        view: &Map<String, Value>,
        grouping_key: &str,
        unit_key: &str,
    ) {
        let mut recorded = view.clone();
        recorded.insert(TENANT_NAME_PARAM.to_string(), Value::String(grouping_key.to_string()));
        recorded.insert(APPLICATION_NAME_PARAM.to_string(), Value::String(unit_key.to_string()));

        let constants = unit
            .entry(CONSTANTS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !constants.is_object() {
            *constants = Value::Object(Map::new());
        }
        if let Value::Object(constants) = constants {
            constants.insert("class".to_string(), Value::String(CONSTANTS_CLASS.to_string()));
            constants.insert("template".to_string(), Value::String(self.name.clone()));
            constants.insert("view".to_string(), Value::Object(recorded));
        }
    }
}

fn has_class(node: &Value, class: &str) -> bool {
    node.get("class").and_then(Value::as_str) == Some(class)
}

fn unwrap_declaration(parsed: Value) -> Value {
    match parsed {
        Value::Object(mut root) if root.get(DECLARATION_KEY).is_some_and(Value::is_object) => {
            root.remove(DECLARATION_KEY).unwrap_or(Value::Object(Map::new()))
        }
        other => other,
    }
}

/// Move member `from` of `grouping` to key `to`, keeping its position.
fn rename_member(grouping: &mut Map<String, Value>, grouping_key: &str, from: &str, to: &str) -> Result<()> {
    if grouping.contains_key(to) {
        return Err(DeclkitError::RenameConflict {
            grouping: grouping_key.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
        .into());
    }

    let members = std::mem::take(grouping);
    for (key, value) in members {
        let key = if key == from { to.to_string() } else { key };
        grouping.insert(key, value);
    }
    Ok(())
}
