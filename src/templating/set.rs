//! Template set bundles, content hashes and the shared schema set.
//!
//! A template set is a named group of templates plus the schema files their
//! placeholders reference. On disk it is a directory:
//!
//! ```text
//! templates/
//! └── examples/
//!     ├── simple_http.mst     # template "examples/simple_http"
//!     ├── simple_tcp.mst
//!     └── f5.json             # schema set "f5": { "<fragment>": {...}, ... }
//! ```
//!
//! In a data store it is one [`TemplateSetData`] value keyed by the set name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::BUILTIN_SET_HASHES;
use crate::core::DeclkitError;

/// A complete template set as persisted in a data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSetData {
    /// Set name
    pub name: String,
    /// `sha256:<hex>` content hash, see [`compute_set_hash`]
    pub hash: String,
    /// Template name (without set prefix) to template text
    pub templates: BTreeMap<String, String>,
    /// Schema set name to schema file text
    #[serde(default)]
    pub schemas: BTreeMap<String, String>,
}

impl TemplateSetData {
    /// Bundle `templates` and `schemas` under `name`, computing the hash.
    pub fn new(
        name: impl Into<String>,
        templates: BTreeMap<String, String>,
        schemas: BTreeMap<String, String>,
    ) -> Self {
        let hash = compute_set_hash(&templates, &schemas);
        Self {
            name: name.into(),
            hash,
            templates,
            schemas,
        }
    }

    /// Whether the stored hash matches the content.
    pub fn verify_hash(&self) -> bool {
        self.hash == compute_set_hash(&self.templates, &self.schemas)
    }

    /// Read a bundle back from a data store value.
    ///
    /// # Errors
    ///
    /// [`DeclkitError::CodecCorruption`] when the value is not a template set.
    pub fn from_value(key: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| DeclkitError::corruption(key, format!("not a template set: {e}")).into())
    }

    /// Serialize for storage.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).with_context(|| format!("Failed to serialize template set '{}'", self.name))
    }
}

/// Content hash of a template set.
///
/// SHA-256 over `"template:<name>\n<text>\n"` for every template in name order,
/// then `"schema:<name>\n<text>\n"` for every schema in name order.
pub fn compute_set_hash(templates: &BTreeMap<String, String>, schemas: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, text) in templates {
        hasher.update(format!("template:{name}\n").as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(b"\n");
    }
    for (name, text) in schemas {
        hasher.update(format!("schema:{name}\n").as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(b"\n");
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Named schema fragments that `{{name:set:fragment}}` placeholders resolve against.
///
/// Keyed by schema set name (the schema file stem). Sets with the same name
/// from different template sets are merged; later fragments replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    sets: BTreeMap<String, Map<String, Value>>,
}

impl SchemaSet {
    /// Empty schema set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `fragments` into the set named `name`.
    pub fn insert(&mut self, name: impl Into<String>, fragments: Map<String, Value>) {
        self.sets.entry(name.into()).or_default().extend(fragments);
    }

    /// Parse a schema file and merge it into the set named `name`.
    ///
    /// # Errors
    ///
    /// Fails if `text` is not a JSON object.
    pub fn insert_text(&mut self, name: &str, text: &str) -> Result<()> {
        let value: Value = serde_json::from_str(text)
            .with_context(|| format!("Schema file '{name}' is not valid JSON"))?;
        let Value::Object(fragments) = value else {
            anyhow::bail!("Schema file '{name}' must contain a JSON object of named fragments");
        };
        self.insert(name, fragments);
        Ok(())
    }

    /// Merge every schema of every bundle in `sets`.
    pub fn from_set_data<'a>(sets: impl IntoIterator<Item = &'a TemplateSetData>) -> Result<Self> {
        let mut schema_set = Self::new();
        for data in sets {
            for (name, text) in &data.schemas {
                schema_set
                    .insert_text(name, text)
                    .with_context(|| format!("in template set '{}'", data.name))?;
            }
        }
        Ok(schema_set)
    }

    /// Fragment `name` of schema set `set`.
    pub fn fragment(&self, set: &str, name: &str) -> Option<&Value> {
        self.sets.get(set).and_then(|fragments| fragments.get(name))
    }

    /// Names of all schema sets.
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Whether no schema sets are loaded.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Accepted content hashes per template set name.
///
/// A persisted bundle whose hash is listed for its name is "supported".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownHashes {
    sets: BTreeMap<String, BTreeSet<String>>,
}

impl KnownHashes {
    /// Hashes of the template sets shipped with declkit.
    pub fn builtin() -> Self {
        let mut known = Self::default();
        for (name, hashes) in BUILTIN_SET_HASHES {
            known.extend(*name, hashes.iter().map(|h| (*h).to_string()));
        }
        known
    }

    /// Accept additional `hashes` for set `name`.
    pub fn extend(&mut self, name: impl Into<String>, hashes: impl IntoIterator<Item = String>) {
        self.sets.entry(name.into()).or_default().extend(hashes);
    }

    /// Whether `hash` is accepted for set `name`.
    pub fn is_supported(&self, name: &str, hash: &str) -> bool {
        self.sets.get(name).is_some_and(|hashes| hashes.contains(hash))
    }
}

/// Status of one persisted template set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatus {
    /// Set name
    pub name: String,
    /// Hash of the persisted bundle
    pub hash: String,
    /// Hash is in the known-hash table
    pub supported: bool,
    /// A filesystem copy exists and its hash differs from the persisted one
    pub update_available: bool,
}
