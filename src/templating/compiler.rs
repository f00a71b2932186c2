//! Template compiler.
//!
//! [`compile`] turns template text into an immutable [`Engine`]: the text is split
//! into literal and placeholder segments, every placeholder is resolved to a
//! [`ParameterDescriptor`], and a JSON Schema for the parameters is inferred.
//!
//! # Parameter resolution
//!
//! A parameter may appear many times. The first occurrence registers it and fixes
//! its position in the schema. A later occurrence with type information
//! (`{{name:type}}`, `{{name:set:fragment}}`) replaces the description; a later
//! bare `{{name}}` never does.
//!
//! # Defaults
//!
//! Each schema property gets a `default`, taken from the first of:
//!
//! 1. the placeholder's explicit default (`{{port:integer:8080}}`)
//! 2. the domain default for well-known names (`tenant_name`, `virtual_port`, ...)
//!    when it fits the property type
//! 3. the referenced schema fragment's own `default`
//! 4. a synthetic default for the type (`""`, `0`, `false`, `[]`, `{}`)

use anyhow::Result;
use serde_json::{Map, Value, json};

use super::placeholder::{self, Interpolation, ParameterType, Placeholder, PrimitiveType, Token};
use super::set::SchemaSet;
use super::validator::ParamValidator;
use crate::constants::RESERVED_PARAMS;
use crate::core::DeclkitError;

/// Example value for parameter names the declaration templates commonly use.
fn domain_default(name: &str) -> Option<Value> {
    match name {
        "tenant_name" => Some(json!("t1")),
        "app_name" => Some(json!("app1")),
        "virtual_address" => Some(json!("10.0.0.1")),
        "virtual_port" => Some(json!(443)),
        "pool_members" => Some(json!([])),
        _ => None,
    }
}

/// Input widget hint for user interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiWidget {
    /// Multi-line text input
    Textarea,
    /// Choice among enumerated values
    Select,
}

impl UiWidget {
    /// Widget name as used by form renderers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Textarea => "textarea",
            Self::Select => "select",
        }
    }
}

/// Everything known about one template parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// The winning placeholder token text
    pub token: String,
    /// Declared type
    pub kind: ParameterType,
    /// Schema fragment for this parameter, `default` included
    pub schema: Value,
    /// Default value
    pub default: Option<Value>,
    /// Whether input must supply the parameter
    pub required: bool,
    /// Reserved parameters are filled by the renderer and absent from the schema
    pub reserved: bool,
    /// Widget hint
    pub widget: Option<UiWidget>,
    /// How values are written into the template text
    pub interpolation: Interpolation,
}

/// A piece of pre-split template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// Value of the parameter at this index
    Slot(usize),
}

/// A compiled template: parameters, inferred schema and validator.
///
/// Engines are immutable. Providers share them as `Arc<Engine>`.
#[derive(Debug)]
pub struct Engine {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) description: String,
    pub(crate) segments: Vec<Segment>,
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) schema: Value,
    pub(crate) validator: ParamValidator,
}

impl Engine {
    /// Template name, usually `set/template`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Title shown for the template; the template name.
    pub fn title(&self) -> &str {
        &self.name
    }

    /// Text of the first comment, or empty.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Template text as compiled.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All parameters in discovery order, reserved ones included.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Parameter name to winning placeholder token, in discovery order.
    pub fn parameter_table(&self) -> Vec<(&str, &str)> {
        self.parameters.iter().map(|p| (p.name.as_str(), p.token.as_str())).collect()
    }

    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The inferred parameter schema.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Names of required parameters.
    pub fn required(&self) -> Vec<&str> {
        self.parameters.iter().filter(|p| p.required).map(|p| p.name.as_str()).collect()
    }
}

/// Compile template `text` named `name`, resolving schema references in `schemas`.
///
/// # Errors
///
/// - [`DeclkitError::InvalidPlaceholder`] for a token outside the grammar
/// - [`DeclkitError::SchemaNotFound`] for a reference `schemas` lacks
pub fn compile(name: &str, text: &str, schemas: &SchemaSet) -> Result<Engine> {
    let spans = placeholder::scan(name, text)?;

    let mut description: Option<String> = None;
    let mut winners: Vec<Placeholder> = Vec::new();
    let mut segments = Vec::new();
    let mut cursor = 0;

    for span in spans {
        if span.start > cursor {
            segments.push(Segment::Literal(text[cursor..span.start].to_string()));
        }
        cursor = span.end;

        match span.token {
            Token::Comment(comment) => {
                if description.is_none() {
                    description = Some(comment);
                }
            }
            Token::Placeholder(found) => {
                let index = match winners.iter().position(|p| p.name == found.name) {
                    Some(index) => {
                        if found.is_typed() {
                            winners[index] = found;
                        }
                        index
                    }
                    None => {
                        winners.push(found);
                        winners.len() - 1
                    }
                };
                segments.push(Segment::Slot(index));
            }
        }
    }
    if cursor < text.len() {
        segments.push(Segment::Literal(text[cursor..].to_string()));
    }

    let parameters = winners
        .iter()
        .map(|p| describe(name, p, schemas))
        .collect::<Result<Vec<_>>>()?;

    let description = description.unwrap_or_default();
    let schema = build_schema(name, &description, &parameters);
    let validator = ParamValidator::new(&schema)?;

    tracing::debug!(
        target: "template",
        "compiled '{}': {} parameter(s), {} segment(s)",
        name,
        parameters.len(),
        segments.len()
    );

    Ok(Engine {
        name: name.to_string(),
        source: text.to_string(),
        description,
        segments,
        parameters,
        schema,
        validator,
    })
}

fn describe(template: &str, placeholder: &Placeholder, schemas: &SchemaSet) -> Result<ParameterDescriptor> {
    let kind = placeholder.parameter_type();

    let (mut fragment, widget) = match &kind {
        ParameterType::Primitive(primitive) => (json!({"type": primitive.as_str()}), None),
        ParameterType::Text => (json!({"type": "string", "format": "text"}), Some(UiWidget::Textarea)),
        ParameterType::SchemaRef {
            set,
            name,
        } => {
            let Some(fragment) = schemas.fragment(set, name) else {
                return Err(DeclkitError::SchemaNotFound {
                    template: template.to_string(),
                    reference: format!("{set}.{name}"),
                }
                .into());
            };
            let widget = fragment.get("enum").map(|_| UiWidget::Select);
            (fragment.clone(), widget)
        }
    };

    let reserved = RESERVED_PARAMS.contains(&placeholder.name.as_str());
    let default = if reserved {
        None
    } else {
        choose_default(&placeholder.name, placeholder.default.as_ref(), &fragment)
    };
    if let (Some(default), Value::Object(map)) = (&default, &mut fragment) {
        map.insert("default".to_string(), default.clone());
    }

    Ok(ParameterDescriptor {
        name: placeholder.name.clone(),
        token: placeholder.raw.clone(),
        interpolation: kind.interpolation(),
        kind,
        schema: fragment,
        default,
        required: !reserved,
        reserved,
        widget,
    })
}

fn choose_default(name: &str, explicit: Option<&Value>, fragment: &Value) -> Option<Value> {
    if let Some(explicit) = explicit {
        return Some(explicit.clone());
    }

    let declared = fragment.get("type").and_then(Value::as_str).and_then(PrimitiveType::parse);

    if let Some(domain) = domain_default(name) {
        let fits = declared.is_none_or(|t| t.matches(&domain));
        let allowed = fragment
            .get("enum")
            .and_then(Value::as_array)
            .is_none_or(|values| values.contains(&domain));
        if fits && allowed {
            return Some(domain);
        }
    }

    if let Some(own) = fragment.get("default") {
        return Some(own.clone());
    }

    if let Some(first) = fragment.get("enum").and_then(Value::as_array).and_then(|v| v.first()) {
        return Some(first.clone());
    }

    declared.map(PrimitiveType::synthetic_default)
}

fn build_schema(name: &str, description: &str, parameters: &[ParameterDescriptor]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for parameter in parameters.iter().filter(|p| !p.reserved) {
        properties.insert(parameter.name.clone(), parameter.schema.clone());
        if parameter.required {
            required.push(Value::String(parameter.name.clone()));
        }
    }

    json!({
        "type": "object",
        "title": name,
        "description": description,
        "properties": properties,
        "required": required,
    })
}
