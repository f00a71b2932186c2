//! Data store persisted as one JSON document on disk.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

use super::DataStore;
use crate::core::require_key;
use crate::utils::atomic_write;

type Items = BTreeMap<String, Value>;

/// A [`DataStore`] holding every item in a single JSON object file.
///
/// The file is read on first use. `set_item` and `delete_item` change the
/// in-memory copy only; `persist` writes the whole map back atomically.
/// A missing file is an empty store.
#[derive(Debug)]
pub struct JsonFileDataStore {
    path: PathBuf,
    items: Mutex<Option<Items>>,
}

impl JsonFileDataStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            items: Mutex::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn loaded(&self) -> Result<MutexGuard<'_, Option<Items>>> {
        let mut guard = self.items.lock().await;
        if guard.is_none() {
            *guard = Some(load_items(&self.path).await?);
        }
        Ok(guard)
    }
}

async fn load_items(path: &Path) -> Result<Items> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(target: "store", "no store file at {}, starting empty", path.display());
            return Ok(Items::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read store file: {}", path.display()));
        }
    };

    if content.trim().is_empty() {
        return Ok(Items::new());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Store file is not a JSON object: {}", path.display()))
}

impl DataStore for JsonFileDataStore {
    fn name(&self) -> &str {
        "file"
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let guard = self.loaded().await?;
            Ok(guard.iter().flat_map(|items| items.keys().cloned()).collect())
        })
    }

    fn has_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            require_key("key", key)?;
            let guard = self.loaded().await?;
            Ok(guard.as_ref().is_some_and(|items| items.contains_key(key)))
        })
    }

    fn get_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            require_key("key", key)?;
            let guard = self.loaded().await?;
            Ok(guard.as_ref().and_then(|items| items.get(key).cloned()))
        })
    }

    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            require_key("key", key)?;
            let mut guard = self.loaded().await?;
            guard.get_or_insert_with(Items::new).insert(key.to_string(), value);
            Ok(())
        })
    }

    fn delete_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            require_key("key", key)?;
            let mut guard = self.loaded().await?;
            Ok(guard.as_mut().is_some_and(|items| items.remove(key).is_some()))
        })
    }

    fn persist(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let guard = self.loaded().await?;
            let content = serde_json::to_vec_pretty(guard.as_ref().unwrap_or(&Items::new()))
                .context("Failed to serialize store contents")?;
            let path = self.path.clone();

            tokio::task::spawn_blocking(move || atomic_write(&path, &content))
                .await
                .context("Store write task failed")??;

            tracing::debug!(target: "store", "persisted store to {}", self.path.display());
            Ok(())
        })
    }
}
