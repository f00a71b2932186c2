//! In-memory data store.

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::DataStore;
use crate::core::require_key;

/// A [`DataStore`] backed by a map. `persist` does nothing.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    items: RwLock<BTreeMap<String, Value>>,
}

impl MemoryDataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `items`.
    pub fn with_items(items: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().collect()),
        }
    }
}

impl DataStore for MemoryDataStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move { Ok(self.items.read().await.keys().cloned().collect()) })
    }

    fn has_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            require_key("key", key)?;
            Ok(self.items.read().await.contains_key(key))
        })
    }

    fn get_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            require_key("key", key)?;
            Ok(self.items.read().await.get(key).cloned())
        })
    }

    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            require_key("key", key)?;
            self.items.write().await.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn delete_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            require_key("key", key)?;
            Ok(self.items.write().await.remove(key).is_some())
        })
    }

    fn persist(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
