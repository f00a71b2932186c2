//! Placeholder grammar and token scanner.
//!
//! Template text is JSON-shaped text interleaved with `{{ ... }}` tokens:
//!
//! | Token | Meaning |
//! |---|---|
//! | `{{name}}` | string parameter |
//! | `{{name:type}}` | parameter of a primitive type or `text` |
//! | `{{name:type:default}}` | typed parameter with an explicit default |
//! | `{{name:set}}` | parameter described by fragment `name` of schema set `set` |
//! | `{{name:set:fragment}}` | parameter described by fragment `fragment` of schema set `set` |
//! | `{{!comment}}` | comment; the first one is the template description |
//!
//! Primitive types are `boolean`, `object`, `array`, `number`, `string` and
//! `integer`. `text` is a long string shown as a multi-line input.

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::fmt;

use crate::core::DeclkitError;

const TOKEN_PATTERN: &str = r"(?s)\{\{(.*?)\}\}";
const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_.\-]*$";

/// The primitive JSON types a placeholder can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `true` / `false`
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
    /// Any JSON number
    Number,
    /// JSON string
    String,
    /// Whole JSON number
    Integer,
}

impl PrimitiveType {
    /// Parse a declared type name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            _ => None,
        }
    }

    /// The JSON Schema `type` keyword value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }

    /// Default used when nothing more specific is known.
    pub fn synthetic_default(self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::Object => Value::Object(serde_json::Map::new()),
            Self::Array => Value::Array(Vec::new()),
            Self::Number | Self::Integer => Value::from(0),
            Self::String => Value::String(String::new()),
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a placeholder declares about its parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    /// One of the primitive JSON types
    Primitive(PrimitiveType),
    /// Long text; a string shown as a multi-line input
    Text,
    /// A fragment looked up in the schema set
    SchemaRef {
        /// Schema set (file) name
        set: String,
        /// Fragment name inside the set
        name: String,
    },
}

impl ParameterType {
    /// How values of this type are written into the template text.
    pub const fn interpolation(&self) -> Interpolation {
        match self {
            Self::Primitive(PrimitiveType::Number | PrimitiveType::Integer | PrimitiveType::Boolean) => {
                Interpolation::Raw
            }
            _ => Interpolation::Json,
        }
    }
}

/// How a parameter value is written into template text.
///
/// Fixed at compile time from the parameter's winning placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Strings verbatim, everything else as JSON text
    Raw,
    /// Always JSON text, so strings keep their quotes
    Json,
}

impl Interpolation {
    /// Format `value` for insertion into template text.
    pub fn format(self, value: &Value) -> String {
        match (self, value) {
            (Self::Raw, Value::String(s)) => s.clone(),
            _ => value.to_string(),
        }
    }
}

/// A parsed `{{name[:type[:extra]]}}` token.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Parameter name
    pub name: String,
    /// Token text between the braces, trimmed
    pub raw: String,
    /// Declared type, `None` for a bare `{{name}}`
    pub declared: Option<ParameterType>,
    /// Explicit default from the third segment
    pub default: Option<Value>,
}

impl Placeholder {
    /// Whether the token carries explicit type information.
    pub const fn is_typed(&self) -> bool {
        self.declared.is_some()
    }

    /// Declared type, or `string` for a bare token.
    pub fn parameter_type(&self) -> ParameterType {
        self.declared.clone().unwrap_or(ParameterType::Primitive(PrimitiveType::String))
    }
}

/// One token found in template text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `{{!text}}`, trimmed text without the `!`
    Comment(String),
    /// Any other token
    Placeholder(Placeholder),
}

/// A token together with its byte range in the source (braces included).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    /// Byte offset of the opening braces
    pub start: usize,
    /// Byte offset just past the closing braces
    pub end: usize,
    /// Parsed token
    pub token: Token,
}

/// Find and parse every token in `text`, in source order.
///
/// # Errors
///
/// [`DeclkitError::InvalidPlaceholder`] for the first token that does not follow
/// the grammar.
pub fn scan(template: &str, text: &str) -> Result<Vec<TokenSpan>> {
    let token_re = Regex::new(TOKEN_PATTERN)?;
    let name_re = Regex::new(NAME_PATTERN)?;

    let mut spans = Vec::new();
    for captures in token_re.captures_iter(text) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let inner = inner.as_str().trim();

        let token = match inner.strip_prefix('!') {
            Some(comment) => Token::Comment(comment.trim().to_string()),
            None => Token::Placeholder(parse_placeholder(template, inner, &name_re)?),
        };

        spans.push(TokenSpan {
            start: whole.start(),
            end: whole.end(),
            token,
        });
    }
    Ok(spans)
}

fn parse_placeholder(template: &str, inner: &str, name_re: &Regex) -> Result<Placeholder> {
    let invalid = |reason: &str| DeclkitError::InvalidPlaceholder {
        template: template.to_string(),
        token: inner.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = inner.splitn(3, ':');
    let name = segments.next().unwrap_or_default().trim();
    let kind = segments.next().map(str::trim);
    let extra = segments.next().map(str::trim);

    if name.is_empty() {
        return Err(invalid("missing parameter name").into());
    }
    if !name_re.is_match(name) {
        return Err(invalid("parameter names start with a letter or '_' and contain only letters, digits, '_', '.' or '-'").into());
    }

    let Some(kind) = kind else {
        return Ok(Placeholder {
            name: name.to_string(),
            raw: inner.to_string(),
            declared: None,
            default: None,
        });
    };

    if kind.is_empty() {
        return Err(invalid("empty type").into());
    }

    let (declared, default) = if kind == "text" {
        (ParameterType::Text, extra.map(|d| parse_default(PrimitiveType::String, d)).transpose())
    } else if let Some(primitive) = PrimitiveType::parse(kind) {
        (ParameterType::Primitive(primitive), extra.map(|d| parse_default(primitive, d)).transpose())
    } else {
        if !name_re.is_match(kind) {
            return Err(invalid("schema set names follow the parameter name rules").into());
        }
        let fragment = match extra {
            Some("") => return Err(invalid("empty schema fragment name").into()),
            Some(fragment) => fragment,
            None => name,
        };
        (
            ParameterType::SchemaRef {
                set: kind.to_string(),
                name: fragment.to_string(),
            },
            Ok(None),
        )
    };

    let default = default.map_err(|reason| invalid(&reason))?;

    Ok(Placeholder {
        name: name.to_string(),
        raw: inner.to_string(),
        declared: Some(declared),
        default,
    })
}

/// Parse an explicit default for a primitive type.
///
/// Strings take the text verbatim unless it is a quoted JSON string. Other
/// types must parse as JSON of that type.
fn parse_default(primitive: PrimitiveType, text: &str) -> std::result::Result<Value, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if primitive.matches(&value) => Ok(value),
        _ if primitive == PrimitiveType::String => Ok(Value::String(text.to_string())),
        _ => Err(format!("default '{text}' is not a valid {primitive}")),
    }
}
