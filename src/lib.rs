//! declkit - parametrized declaration templates
//!
//! Compiles JSON-shaped templates with `{{ ... }}` placeholders into engines that
//! infer a JSON Schema for their parameters, validate parameter sets, and render
//! service declarations. Template sets live in a directory tree or in a
//! key-value store; the store can be an appliance data collection whose records
//! are compressed and chunked to fit the appliance's size limit.
//!
//! # Architecture Overview
//!
//! ```text
//! cli ── provider ──┬── FsTemplateProvider ───────── templates/<set>/*.mst, *.json
//!                   └── DataStoreTemplateProvider ── storage::DataStore
//!                                                     ├── MemoryDataStore
//!                                                     ├── JsonFileDataStore
//!                                                     └── ApplianceDataStore ── codec ── PrivilegedShell
//!          provider ── cache::ResourceCache<Arc<Engine>>
//!          templating: placeholder → compiler → Engine { validate, render }
//! ```
//!
//! # Core Modules
//!
//! - [`templating`] - placeholder grammar, compiler, validator and renderer
//! - [`provider`] - template name to cached engine, template set management
//! - [`storage`] - async key-value backends for persisted template sets
//! - [`codec`] - compressed, chunked record encoding for size-limited stores
//! - [`cache`] - bounded single-flight cache for compiled engines
//! - [`config`] - settings file and the objects built from it
//! - [`cli`] - command-line interface
//! - [`core`] - error types and user-facing error formatting
//!
//! # Example
//!
//! ```rust,no_run
//! use declkit::provider::{FsTemplateProvider, TemplateProvider};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FsTemplateProvider::new("templates");
//! let engine = provider.fetch("examples/simple_http").await?;
//!
//! if let Some(issues) = engine.validate(&json!({"tenant_name": "prod"})) {
//!     for issue in issues {
//!         eprintln!("{issue}");
//!     }
//! }
//! let declaration = engine.render(&json!({"tenant_name": "prod", "pool_members": "10.0.0.5"}))?;
//! println!("{declaration:#}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod constants;
pub mod core;
pub mod provider;
pub mod storage;
pub mod templating;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
