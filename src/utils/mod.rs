//! Small helpers shared across declkit.
//!
//! # Modules
//!
//! - [`fs`] - Directory creation and atomic file writes
//!
//! # Example
//!
//! ```rust,no_run
//! use declkit::utils::{atomic_write, ensure_dir};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("state"))?;
//! atomic_write(Path::new("state/store.json"), b"{}")?;
//! # Ok(())
//! # }
//! ```

pub mod fs;

pub use fs::{atomic_write, ensure_dir};
