//! Data store kept inside an appliance data collection.
//!
//! Values are encoded with [`crate::codec`] into `{name, data}` records and kept
//! in one internal string data-group on the appliance. The appliance is driven
//! entirely through a [`PrivilegedShell`]:
//!
//! | Step | Command |
//! |---|---|
//! | provision namespace | `create sys folder /<ns>/` |
//! | provision collection | `create ltm data-group internal /<ns>/<collection> type string` |
//! | read | `list ltm data-group internal /<ns>/<collection>` |
//! | write | `modify ltm data-group internal /<ns>/<collection> records replace-all-with { ... }` |
//! | persist | `save sys config` |
//!
//! # Keys
//!
//! Record names are written unquoted, so keys are limited to ASCII letters,
//! digits and `_ . - /`. Any other key is rejected with
//! [`DeclkitError::InvalidKey`] before the appliance is contacted.
//!
//! # Consistency
//!
//! Every write reads the whole collection, swaps in the records of one key, and
//! replaces the entire collection. Two writers racing on different keys can
//! therefore lose one update: the last write wins.

use anyhow::Result;
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::DataStore;
use super::shell::PrivilegedShell;
use crate::codec::{self, Record, RecordGroup};
use crate::core::{DeclkitError, require_key};

/// Matches one `name { data value }` entry of a data-group listing.
const RECORD_PATTERN: &str = r#"([A-Za-z0-9_.\-/]+)\s*\{\s*data\s+"?([A-Za-z0-9+/=]*)"?\s*\}"#;

const ALREADY_EXISTS: &str = "already exists";

/// Punctuation allowed in keys besides ASCII letters and digits.
const KEY_PUNCTUATION: &str = "_.-/";

/// A [`DataStore`] backed by an appliance data-group.
pub struct ApplianceDataStore {
    shell: Arc<dyn PrivilegedShell>,
    namespace: String,
    collection: String,
    provisioned: OnceCell<()>,
}

impl std::fmt::Debug for ApplianceDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplianceDataStore")
            .field("namespace", &self.namespace)
            .field("collection", &self.collection)
            .field("provisioned", &self.provisioned.initialized())
            .finish_non_exhaustive()
    }
}

impl ApplianceDataStore {
    /// Store using collection `/<namespace>/<collection>` through `shell`.
    ///
    /// Nothing is sent to the appliance until the first operation.
    pub fn new(
        shell: Arc<dyn PrivilegedShell>,
        namespace: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            shell,
            namespace: namespace.into(),
            collection: collection.into(),
            provisioned: OnceCell::new(),
        }
    }

    /// Full path of the backing collection.
    pub fn collection_path(&self) -> String {
        format!("/{}/{}", self.namespace, self.collection)
    }

    async fn ensure_provisioned(&self) -> Result<()> {
        self.provisioned
            .get_or_try_init(|| async {
                let folder = format!("/{}/", self.namespace);
                self.create_idempotent(&folder, &format!("create sys folder {folder}")).await?;

                let path = self.collection_path();
                self.create_idempotent(
                    &path,
                    &format!("create ltm data-group internal {path} type string"),
                )
                .await?;

                tracing::debug!(target: "store", "collection {} ready", path);
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn create_idempotent(&self, resource: &str, command: &str) -> Result<()> {
        match self.shell.run(command).await {
            Ok(_) => {
                tracing::debug!(target: "store", "created {}", resource);
                Ok(())
            }
            Err(e) => {
                let reason = match e.downcast_ref::<DeclkitError>() {
                    Some(DeclkitError::ShellCommandFailed {
                        stderr,
                        ..
                    }) => stderr.clone(),
                    _ => format!("{e:#}"),
                };
                if reason.contains(ALREADY_EXISTS) {
                    tracing::debug!(target: "store", "{} already exists", resource);
                    Ok(())
                } else {
                    Err(DeclkitError::BackendConflict {
                        resource: resource.to_string(),
                        reason: reason.trim().to_string(),
                    }
                    .into())
                }
            }
        }
    }

    async fn read_records(&self) -> Result<Vec<Record>> {
        self.ensure_provisioned().await?;
        let listing = self
            .shell
            .run(&format!("list ltm data-group internal {}", self.collection_path()))
            .await?;
        parse_record_listing(&listing)
    }

    async fn read_groups(&self) -> Result<Vec<RecordGroup>> {
        Ok(codec::group_records(&self.read_records().await?))
    }

    async fn write_records(&self, records: &[Record]) -> Result<()> {
        let body = if records.is_empty() {
            "none".to_string()
        } else {
            let entries: Vec<String> = records
                .iter()
                .map(|r| format!("{} {{ data \"{}\" }}", r.name, r.data))
                .collect();
            format!("replace-all-with {{ {} }}", entries.join(" "))
        };
        let command =
            format!("modify ltm data-group internal {} records {}", self.collection_path(), body);
        self.shell.run(&command).await?;
        tracing::debug!(target: "store", "wrote {} record(s) to {}", records.len(), self.collection_path());
        Ok(())
    }

    /// Records of every group except `key`, in listing order.
    fn records_except(groups: &[RecordGroup], key: &str) -> Vec<Record> {
        groups.iter().filter(|g| g.key != key).flat_map(|g| g.records.iter().cloned()).collect()
    }
}

/// Reject keys whose record names would not survive a listing round trip.
fn check_key(key: &str) -> Result<()> {
    require_key("key", key)?;
    if let Some(c) = key.chars().find(|c| !c.is_ascii_alphanumeric() && !KEY_PUNCTUATION.contains(*c)) {
        return Err(DeclkitError::InvalidKey {
            key: key.to_string(),
            backend: "appliance".to_string(),
            reason: format!("character {c:?} is not allowed, use letters, digits or one of '{KEY_PUNCTUATION}'"),
        }
        .into());
    }
    Ok(())
}

/// Parse the text listing of a data-group into records, in listing order.
///
/// Only `name { data value }` entries are recognized; everything else in the
/// listing (headers, `type string`, braces) is ignored.
pub fn parse_record_listing(listing: &str) -> Result<Vec<Record>> {
    let re = Regex::new(RECORD_PATTERN)?;
    Ok(re.captures_iter(listing).map(|c| Record::new(&c[1], &c[2])).collect())
}

impl DataStore for ApplianceDataStore {
    fn name(&self) -> &str {
        "appliance"
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let mut keys: Vec<String> = Vec::new();
            for group in self.read_groups().await? {
                if !keys.contains(&group.key) {
                    keys.push(group.key);
                }
            }
            Ok(keys)
        })
    }

    fn has_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            check_key(key)?;
            Ok(self.read_groups().await?.iter().any(|g| g.key == key))
        })
    }

    fn get_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            check_key(key)?;
            let groups = self.read_groups().await?;
            let Some(group) = groups.iter().find(|g| g.key == key) else {
                return Ok(None);
            };
            let value = codec::decode(&group.records, &group.key, group.offset)?;
            Ok(Some(value))
        })
    }

    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            check_key(key)?;
            let groups = self.read_groups().await?;
            let mut records = Self::records_except(&groups, key);
            records.extend(codec::encode(key, &value, 0)?);
            self.write_records(&records).await
        })
    }

    fn delete_item<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            check_key(key)?;
            let groups = self.read_groups().await?;
            if !groups.iter().any(|g| g.key == key) {
                return Ok(false);
            }
            self.write_records(&Self::records_except(&groups, key)).await?;
            Ok(true)
        })
    }

    fn persist(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.ensure_provisioned().await?;
            self.shell.run("save sys config").await?;
            tracing::debug!(target: "store", "saved appliance configuration");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeAppliance;
    use serde_json::json;

    fn store(shell: &Arc<FakeAppliance>) -> ApplianceDataStore {
        ApplianceDataStore::new(shell.clone(), "declkit", "dataStore")
    }

    #[test]
    fn test_parse_record_listing() {
        let listing = r#"ltm data-group internal /declkit/dataStore {
    records {
        a0 {
            data eNpLTEoGAAJJAS8=
        }
        b0 {
            data "eNpLSgQAAkQBJA=="
        }
    }
    type string
}"#;
        let records = parse_record_listing(listing).unwrap();
        assert_eq!(
            records,
            vec![Record::new("a0", "eNpLTEoGAAJJAS8="), Record::new("b0", "eNpLSgQAAkQBJA==")]
        );
        let empty = parse_record_listing("ltm data-group internal /x/y {\n    type string\n}");
        assert!(empty.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provisions_once() {
        let shell = Arc::new(FakeAppliance::new());
        let store = store(&shell);

        assert!(store.keys().await.unwrap().is_empty());
        assert!(store.keys().await.unwrap().is_empty());

        let creates = shell.commands().iter().filter(|c| c.starts_with("create")).count();
        assert_eq!(creates, 2);
    }

    #[tokio::test]
    async fn test_existing_collection_is_tolerated() {
        let shell = Arc::new(FakeAppliance::new());
        store(&shell).set_item("a", json!(1)).await.unwrap();

        // A second store instance provisions again and hits "already exists".
        let second = store(&shell);
        assert_eq!(second.get_item("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_provisioning_failure_is_backend_conflict() {
        let shell = Arc::new(FakeAppliance::new());
        shell.fail_on("create sys folder", "01070712:3: Invalid folder name");
        let err = store(&shell).keys().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeclkitError>(),
            Some(DeclkitError::BackendConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_replaces_only_its_key() {
        let shell = Arc::new(FakeAppliance::new());
        let store = store(&shell);

        store.set_item("a", json!({"v": 1})).await.unwrap();
        store.set_item("b", json!({"v": 2})).await.unwrap();
        store.set_item("a", json!({"v": 3})).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(store.get_item("a").await.unwrap(), Some(json!({"v": 3})));
        assert_eq!(store.get_item("b").await.unwrap(), Some(json!({"v": 2})));
        assert!(store.has_item("b").await.unwrap());
        assert_eq!(store.get_item("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_and_persist() {
        let shell = Arc::new(FakeAppliance::new());
        let store = store(&shell);

        store.set_item("a", json!("x")).await.unwrap();
        assert_eq!(shell.save_count(), 0);

        assert!(store.delete_item("a").await.unwrap());
        assert!(!store.delete_item("a").await.unwrap());
        assert!(shell.commands().iter().any(|c| c.ends_with("records none")));

        store.persist().await.unwrap();
        assert_eq!(shell.save_count(), 1);
    }

    #[tokio::test]
    async fn test_large_value_round_trip() {
        let shell = Arc::new(FakeAppliance::new());
        let store = store(&shell);

        let templates: serde_json::Map<String, Value> = (0..400)
            .map(|i| (format!("t{i}"), json!(format!("{i:x}-{}", uuid::Uuid::new_v4()))))
            .collect();
        let value = json!({"name": "big", "templates": templates});

        store.set_item("big", value.clone()).await.unwrap();
        assert!(shell.record_count("/declkit/dataStore") > 0);
        assert_eq!(store.get_item("big").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_keys_outside_record_alphabet_rejected() {
        let shell = Arc::new(FakeAppliance::new());
        let store = store(&shell);

        for key in ["my+set", "my set", "me@host", "caf\u{e9}"] {
            let err = store.set_item(key, json!({"v": 1})).await.unwrap_err();
            assert!(
                matches!(err.downcast_ref::<DeclkitError>(), Some(DeclkitError::InvalidKey { .. })),
                "{key} should be rejected"
            );
            assert!(store.get_item(key).await.is_err());
            assert!(store.has_item(key).await.is_err());
            assert!(store.delete_item(key).await.is_err());
        }
        assert!(shell.commands().is_empty());

        store.set_item("team.a-1/web_2", json!({"v": 1})).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["team.a-1/web_2".to_string()]);
        assert_eq!(store.get_item("team.a-1/web_2").await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let shell = Arc::new(FakeAppliance::new());
        let err = store(&shell).get_item("").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeclkitError>(),
            Some(DeclkitError::MissingArgument { .. })
        ));
        assert!(shell.commands().is_empty());
    }
}
