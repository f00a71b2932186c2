//! Key-value backends for persisted template-set bundles.
//!
//! Every backend implements [`DataStore`], a small async key-value contract:
//!
//! | Method | Meaning |
//! |---|---|
//! | `keys()` | all logical keys |
//! | `has_item(key)` | whether `key` holds a value |
//! | `get_item(key)` | the value, or `None` |
//! | `set_item(key, value)` | store a value (not yet durable) |
//! | `delete_item(key)` | remove a value |
//! | `persist()` | make previous writes durable |
//!
//! Every method taking a key rejects an empty key with
//! [`DeclkitError::MissingArgument`](crate::core::DeclkitError::MissingArgument).
//!
//! # Backends
//!
//! - [`MemoryDataStore`] - a plain map, nothing is durable
//! - [`JsonFileDataStore`] - one JSON document on disk, written atomically on `persist`
//! - [`ApplianceDataStore`] - records in an appliance data collection, driven through
//!   a [`PrivilegedShell`] and encoded with [`crate::codec`]

mod appliance;
mod file;
mod memory;
pub mod shell;

pub use appliance::{ApplianceDataStore, parse_record_listing};
pub use file::JsonFileDataStore;
pub use memory::MemoryDataStore;
pub use shell::{LocalShell, PrivilegedShell};

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;

/// Async key-value contract shared by all backends.
///
/// Methods return boxed futures so stores can be used as `Arc<dyn DataStore>`.
pub trait DataStore: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &str;

    /// All logical keys currently stored.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Whether `key` holds a value.
    fn has_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// The value stored under `key`, if any.
    fn get_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>>;

    /// Remove `key`. Returns whether a value was removed.
    fn delete_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Make previous writes durable. Never implied by `set_item`.
    fn persist(&self) -> BoxFuture<'_, Result<()>>;
}
