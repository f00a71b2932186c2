//! Declaration templates: placeholder grammar, compiler, validator and renderer.
//!
//! A template is JSON-shaped text with `{{ ... }}` placeholders. Compiling it
//! yields an [`Engine`] that knows the template's parameters, exposes an inferred
//! JSON Schema for them, validates parameter sets, and renders declarations.
//!
//! # Modules
//!
//! - [`placeholder`] - token grammar and scanner
//! - [`compiler`] - template text to [`Engine`]
//! - [`validator`] - schema validation with array coercion and defaults
//! - [`renderer`] - [`Engine::render`] and stitching of grouping/unit nodes
//! - [`set`] - template set bundles, content hashes, schema sets
//!
//! # Example
//!
//! ```rust
//! use declkit::templating::{SchemaSet, compile};
//! use serde_json::json;
//!
//! # fn example() -> anyhow::Result<()> {
//! let text = r#"{{! One HTTP service }}
//! {
//!   "class": "ADC",
//!   {{tenant_name}}: {
//!     "class": "Tenant",
//!     {{app_name}}: {
//!       "class": "Application",
//!       "port": {{virtual_port:integer}}
//!     }
//!   }
//! }"#;
//!
//! let engine = compile("examples/http", text, &SchemaSet::new())?;
//! assert_eq!(engine.description(), "One HTTP service");
//! assert_eq!(engine.required(), vec!["tenant_name", "app_name", "virtual_port"]);
//!
//! let declaration = engine.render(&json!({"tenant_name": "prod", "app_name": "web"}))?;
//! assert_eq!(declaration["prod"]["web"]["port"], 443);
//! assert_eq!(declaration["prod"]["web"]["constants"]["template"], "examples/http");
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod placeholder;
pub mod renderer;
pub mod set;
pub mod validator;

pub use compiler::{Engine, ParameterDescriptor, UiWidget, compile};
pub use placeholder::{Interpolation, ParameterType, PrimitiveType};
pub use set::{KnownHashes, SchemaSet, SetStatus, TemplateSetData, compute_set_hash};
pub use validator::{ParamValidator, ValidationIssue};
