//! Core types shared across declkit.
//!
//! ## `error` - Error Handling
//!
//! - [`DeclkitError`] - Enumerated error kinds covering every failure mode
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to the user-friendly format
//!
//! # Examples
//!
//! ```rust
//! use declkit::core::{DeclkitError, user_friendly_error};
//! use anyhow::Result;
//!
//! fn example_operation() -> Result<String> {
//!     Err(DeclkitError::missing_argument("key").into())
//! }
//!
//! if let Err(e) = example_operation() {
//!     let friendly = user_friendly_error(e);
//!     assert!(friendly.to_string().contains("key"));
//! }
//! ```

pub mod error;

pub use error::{DeclkitError, ErrorContext, user_friendly_error};

/// Reject an empty key the way every cache and storage call does.
///
/// Returns [`DeclkitError::MissingArgument`] naming `argument` when `value` is empty.
pub fn require_key(argument: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        return Err(DeclkitError::missing_argument(argument).into());
    }
    Ok(())
}
