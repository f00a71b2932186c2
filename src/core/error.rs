//! Error handling for declkit
//!
//! This module provides the error types used across the crate and the user-facing
//! error reporting used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** for precise handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`DeclkitError`] - Enumerated error kinds for every failure mode
//! - [`ErrorContext`] - Wrapper that adds user-friendly details and suggestions
//!
//! Library functions return [`anyhow::Result`] with a [`DeclkitError`] inside, so
//! callers that need to branch on the failure kind use
//! `error.downcast_ref::<DeclkitError>()`.
//!
//! # Error Categories
//!
//! - **Arguments**: [`DeclkitError::MissingArgument`]
//! - **Lookup**: [`DeclkitError::TemplateNotFound`], [`DeclkitError::SchemaNotFound`],
//!   [`DeclkitError::SetNotFound`]
//! - **Templates**: [`DeclkitError::InvalidPlaceholder`], [`DeclkitError::MissingParameter`],
//!   [`DeclkitError::MalformedOutput`], [`DeclkitError::RenameConflict`]
//! - **Storage**: [`DeclkitError::BackendConflict`], [`DeclkitError::InvalidKey`],
//!   [`DeclkitError::CodecCorruption`],
//!   [`DeclkitError::ShellCommandFailed`]
//!
//! Parameter validation failures are not errors: they are returned as
//! values by [`crate::templating::Engine::validate`], never raised.
//!
//! # Examples
//!
//! ```rust,no_run
//! use declkit::core::{DeclkitError, user_friendly_error};
//!
//! fn lookup() -> anyhow::Result<()> {
//!     Err(DeclkitError::SetNotFound {
//!         name: "examples".to_string(),
//!     }
//!     .into())
//! }
//!
//! if let Err(e) = lookup() {
//!     let ctx = user_friendly_error(e);
//!     ctx.display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for declkit operations.
///
/// Each variant carries the identifiers needed to explain the failure to a user
/// (template names, keys, commands). Variants are cheap to clone so they can be
/// re-wrapped into an [`ErrorContext`] without losing information.
#[derive(Error, Debug, Clone)]
pub enum DeclkitError {
    /// A cache or storage call received an empty key.
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Name of the argument that was empty
        argument: String,
    },

    /// No template with the requested name exists in the provider.
    #[error("Template '{name}' not found")]
    TemplateNotFound {
        /// Fully-qualified template name (`set/template`)
        name: String,
        /// Close matches among the known template names
        suggestions: Vec<String>,
    },

    /// A placeholder referenced a schema fragment that the schema set lacks.
    #[error("Schema reference '{reference}' used by template '{template}' not found")]
    SchemaNotFound {
        /// Template being compiled
        template: String,
        /// Qualified reference (`set.fragment`)
        reference: String,
    },

    /// No template set with the requested name exists.
    #[error("Template set '{name}' not found")]
    SetNotFound {
        /// Name of the missing template set
        name: String,
    },

    /// A `{{...}}` token does not follow the placeholder grammar.
    #[error("Invalid placeholder '{{{{{token}}}}}' in template '{template}': {reason}")]
    InvalidPlaceholder {
        /// Template being compiled
        template: String,
        /// Raw token text between the braces
        token: String,
        /// Why the token was rejected
        reason: String,
    },

    /// A placeholder had no value in the merged render view.
    #[error("Template '{template}' has no value for parameter '{parameter}'")]
    MissingParameter {
        /// Template being rendered
        template: String,
        /// Parameter without a value
        parameter: String,
    },

    /// Substituted template text is not valid JSON.
    #[error("Template '{template}' rendered invalid JSON: {reason}\nview: {view}\ntext: {text}")]
    MalformedOutput {
        /// Template being rendered
        template: String,
        /// Parser message
        reason: String,
        /// The merged view used for substitution, as JSON text
        view: String,
        /// The raw substituted text
        text: String,
    },

    /// A unit could not be renamed to the caller-specified key.
    #[error("Cannot rename '{from}' to '{to}' in '{grouping}': key already exists")]
    RenameConflict {
        /// Grouping node that holds the unit
        grouping: String,
        /// Template-derived unit key
        from: String,
        /// Caller-specified unit key
        to: String,
    },

    /// Backend provisioning failed with something other than "already exists".
    #[error("Backend provisioning failed for '{resource}': {reason}")]
    BackendConflict {
        /// Namespace or collection being provisioned
        resource: String,
        /// Backend error output
        reason: String,
    },

    /// A key uses characters the backend cannot store in a record name.
    #[error("Invalid key '{key}' for the {backend} store: {reason}")]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Store that rejected it
        backend: String,
        /// Which characters are accepted
        reason: String,
    },

    /// Stored records could not be decoded back into a value.
    #[error("Corrupt stored value '{key}': {reason}")]
    CodecCorruption {
        /// Logical key being decoded
        key: String,
        /// Decoding stage that failed
        reason: String,
    },

    /// A privileged shell command exited unsuccessfully.
    #[error("Command failed: {command}")]
    ShellCommandFailed {
        /// The command line that was run
        command: String,
        /// Captured error output
        stderr: String,
    },

    /// Settings could not be loaded or are inconsistent.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl DeclkitError {
    /// Shorthand for [`DeclkitError::MissingArgument`].
    pub fn missing_argument(argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            argument: argument.into(),
        }
    }

    /// Shorthand for [`DeclkitError::CodecCorruption`].
    pub fn corruption(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CodecCorruption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Wraps a [`DeclkitError`] with optional details (why it happened) and a
/// suggestion (what to do about it). The CLI prints these in color.
///
/// ```rust,no_run
/// use declkit::core::{DeclkitError, ErrorContext};
///
/// let context = ErrorContext::new(DeclkitError::SetNotFound {
///     name: "examples".to_string(),
/// })
/// .with_suggestion("Run 'declkit upload examples' first");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DeclkitError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no details or suggestion.
    #[must_use]
    pub const fn new(error: DeclkitError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`DeclkitError`] anywhere in the error chain, I/O errors, and TOML
/// parse errors. Anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(declkit_error) = error.chain().find_map(|e| e.downcast_ref::<DeclkitError>()) {
        return create_error_context(declkit_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(DeclkitError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership and permissions");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(DeclkitError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(DeclkitError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of your declkit configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(DeclkitError::Other {
        message,
    })
}

fn create_error_context(error: DeclkitError) -> ErrorContext {
    match &error {
        DeclkitError::TemplateNotFound {
            suggestions,
            ..
        } => {
            let suggestion = if suggestions.is_empty() {
                "Run 'declkit list' to see the available templates".to_string()
            } else {
                format!("Did you mean: {}?", suggestions.join(", "))
            };
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        DeclkitError::SetNotFound {
            name,
        } => {
            let suggestion = format!(
                "Check that '{name}' exists in the templates directory, or upload it with 'declkit upload {name}'"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        DeclkitError::SchemaNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Add the referenced fragment to a schema file (<set>.json) in the template set")
            .with_details("Placeholders like {{name:set:fragment}} resolve against the shared schema files"),
        DeclkitError::InvalidPlaceholder {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Placeholders use {{name}}, {{name:type}}, {{name:type:default}}, {{name:set:fragment}} or {{!comment}}",
        ),
        DeclkitError::MalformedOutput {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check quoting around placeholders: string parameters are inserted with their JSON quotes")
            .with_details("The rendered template text must be a single valid JSON document"),
        DeclkitError::BackendConflict {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that the configured namespace and collection names are valid on the appliance"),
        DeclkitError::InvalidKey {
            ..
        } => ErrorContext::new(error).with_suggestion("Rename the template set using letters, digits, '_', '.', '-' or '/'"),
        DeclkitError::CodecCorruption {
            ..
        } => ErrorContext::new(error)
            .with_details("One or more stored records are missing or damaged")
            .with_suggestion("Re-upload the affected template set"),
        DeclkitError::ShellCommandFailed {
            stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error).with_details(details)
        }
        _ => ErrorContext::new(error),
    }
}
