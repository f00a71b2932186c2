//! Template provider backed by a key-value data store.

use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

use super::{ProviderCore, TemplateProvider, split_template_name, template_not_found};
use crate::constants::DEFAULT_CACHE_LIMIT;
use crate::core::DeclkitError;
use crate::storage::DataStore;
use crate::templating::{Engine, KnownHashes, SchemaSet, SetStatus, TemplateSetData, compile};

/// Template sets persisted as [`TemplateSetData`] values, one per set name.
///
/// Sets get here through [`DataStoreTemplateProvider::upload_set`], usually from
/// a filesystem copy. Comparing hashes against that copy and against the
/// known-hash table yields each set's [`SetStatus`].
pub struct DataStoreTemplateProvider {
    store: Arc<dyn DataStore>,
    known: KnownHashes,
    core: ProviderCore,
}

impl std::fmt::Debug for DataStoreTemplateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStoreTemplateProvider")
            .field("store", &self.store.name())
            .field("known", &self.known)
            .field("core", &self.core)
            .finish()
    }
}

impl DataStoreTemplateProvider {
    /// Provider over `store`, accepting the built-in known hashes.
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self::with_cache_limit(store, DEFAULT_CACHE_LIMIT)
    }

    /// Provider over `store` caching at most `cache_limit` engines.
    pub fn with_cache_limit(store: Arc<dyn DataStore>, cache_limit: usize) -> Self {
        Self {
            store,
            known: KnownHashes::builtin(),
            core: ProviderCore::new(cache_limit),
        }
    }

    /// Replace the known-hash table.
    #[must_use]
    pub fn with_known_hashes(mut self, known: KnownHashes) -> Self {
        self.known = known;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// Shared provider state.
    pub fn core(&self) -> &ProviderCore {
        &self.core
    }

    /// Store `data` under its name and persist the store.
    ///
    /// The schema set is reloaded on the next fetch and every compiled engine is
    /// dropped, since the upload may add or change schema files.
    pub async fn upload_set(&self, data: &TemplateSetData) -> Result<()> {
        self.store.set_item(&data.name, data.to_value()?).await?;
        self.store.persist().await?;
        self.core.reload_schemas();
        tracing::info!(
            target: "provider",
            "uploaded template set '{}' ({}) to {} store",
            data.name,
            data.hash,
            self.store.name()
        );
        Ok(())
    }

    /// Status of persisted set `set`, compared against `source` when given.
    ///
    /// `update_available` is set when `source` has the set and its hash differs
    /// from the persisted one.
    pub async fn set_status(&self, set: &str, source: Option<&dyn TemplateProvider>) -> Result<SetStatus> {
        let data = self.read_set(set).await?;

        let mut update_available = false;
        if let Some(source) = source {
            if source.has_set(set).await? {
                update_available = source.get_set_data(set).await?.hash != data.hash;
            }
        }

        Ok(SetStatus {
            supported: self.known.is_supported(&data.name, &data.hash),
            name: data.name,
            hash: data.hash,
            update_available,
        })
    }

    /// [`Self::set_status`] for every persisted set.
    pub async fn list_set_status(&self, source: Option<&dyn TemplateProvider>) -> Result<Vec<SetStatus>> {
        let mut statuses = Vec::new();
        for set in self.set_names().await? {
            statuses.push(self.set_status(&set, source).await?);
        }
        Ok(statuses)
    }

    async fn set_names(&self) -> Result<Vec<String>> {
        let mut names = self.store.keys().await?;
        names.sort();
        Ok(names)
    }

    async fn read_set(&self, set: &str) -> Result<TemplateSetData> {
        let Some(value) = self.store.get_item(set).await? else {
            return Err(DeclkitError::SetNotFound {
                name: set.to_string(),
            }
            .into());
        };
        TemplateSetData::from_value(set, value)
    }

    async fn load_schemas(&self) -> Result<SchemaSet> {
        let mut sets = Vec::new();
        for set in self.set_names().await? {
            sets.push(self.read_set(&set).await?);
        }
        SchemaSet::from_set_data(&sets)
    }

    async fn read_template(&self, name: &str) -> Result<String> {
        if let Some((set, template)) = split_template_name(name) {
            if let Some(value) = self.store.get_item(set).await? {
                let data = TemplateSetData::from_value(set, value)?;
                if let Some(text) = data.templates.get(template) {
                    return Ok(text.clone());
                }
            }
        }
        Err(template_not_found(name, &self.list_templates().await?))
    }

    async fn fetch_engine(&self, name: &str) -> Result<Arc<Engine>> {
        self.core
            .engine(name, || async {
                let text = self.read_template(name).await?;
                let schemas = self.core.schemas(|| self.load_schemas()).await?;
                compile(name, &text, &schemas)
            })
            .await
    }

    async fn list_templates(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for set in self.set_names().await? {
            let data = self.read_set(&set).await?;
            names.extend(data.templates.keys().map(|t| format!("{set}/{t}")));
        }
        Ok(names)
    }

    async fn delete_set(&self, set: &str) -> Result<()> {
        if !self.store.delete_item(set).await? {
            return Err(DeclkitError::SetNotFound {
                name: set.to_string(),
            }
            .into());
        }
        self.store.persist().await?;
        self.core.reload_schemas();
        tracing::info!(target: "provider", "removed template set '{}' from {} store", set, self.store.name());
        Ok(())
    }
}

impl TemplateProvider for DataStoreTemplateProvider {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Engine>>> {
        Box::pin(self.fetch_engine(name))
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.list_templates())
    }

    fn list_sets(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.set_names())
    }

    fn has_set<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<bool>> {
        self.store.has_item(set)
    }

    fn get_set_data<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<TemplateSetData>> {
        Box::pin(self.read_set(set))
    }

    fn remove_set<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.delete_set(set))
    }

    fn invalidate_cache(&self) {
        self.core.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FsTemplateProvider;
    use crate::storage::MemoryDataStore;
    use crate::test_utils::TemplateFixture;
    use serde_json::json;

    async fn uploaded(fixture: &TemplateFixture) -> (FsTemplateProvider, DataStoreTemplateProvider) {
        let fs = FsTemplateProvider::new(fixture.root());
        let provider = DataStoreTemplateProvider::new(Arc::new(MemoryDataStore::new()));
        for set in fs.list_sets().await.unwrap() {
            provider.upload_set(&fs.get_set_data(&set).await.unwrap()).await.unwrap();
        }
        (fs, provider)
    }

    #[tokio::test]
    async fn test_fetch_from_store() {
        let fixture = TemplateFixture::examples().unwrap();
        let (fs, provider) = uploaded(&fixture).await;

        assert_eq!(provider.list().await.unwrap(), fs.list().await.unwrap());
        let engine = provider.fetch("examples/with_pool").await.unwrap();
        let declaration = engine.render(&json!({"pool_members": "10.0.1.10"})).unwrap();
        assert_eq!(declaration["t1"]["app1"]["pool"]["members"][0]["serverAddresses"], json!(["10.0.1.10"]));
    }

    #[tokio::test]
    async fn test_missing_set_and_template() {
        let provider = DataStoreTemplateProvider::new(Arc::new(MemoryDataStore::new()));
        let err = provider.get_set_data("nope").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DeclkitError>(), Some(DeclkitError::SetNotFound { .. })));

        let err = provider.fetch("nope/x").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DeclkitError>(), Some(DeclkitError::TemplateNotFound { .. })));

        let err = provider.remove_set("nope").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DeclkitError>(), Some(DeclkitError::SetNotFound { .. })));
    }

    #[tokio::test]
    async fn test_status_supported_and_update_available() {
        let fixture = TemplateFixture::examples().unwrap();
        let (fs, provider) = uploaded(&fixture).await;

        let status = provider.set_status("examples", Some(&fs)).await.unwrap();
        assert!(status.supported, "bundled examples hash should be known");
        assert!(!status.update_available);

        let extra = provider.set_status("extra", Some(&fs)).await.unwrap();
        assert!(!extra.supported);

        fixture.write_template("examples", "simple_http", r#"{"changed": true}"#).unwrap();
        let status = provider.set_status("examples", Some(&fs)).await.unwrap();
        assert!(status.update_available);

        let statuses = provider.list_set_status(None).await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.update_available));
    }

    #[tokio::test]
    async fn test_upload_replaces_engines_and_remove() {
        let fixture = TemplateFixture::examples().unwrap();
        let (fs, provider) = uploaded(&fixture).await;

        let before = provider.fetch("extra/plain").await.unwrap();
        fixture.write_template("extra", "plain", r#"{"v": {{v:integer}}}"#).unwrap();
        provider.upload_set(&fs.get_set_data("extra").await.unwrap()).await.unwrap();

        let after = provider.fetch("extra/plain").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.parameter("v").is_some());

        provider.remove_set("extra").await.unwrap();
        assert!(!provider.has_set("extra").await.unwrap());
        assert_eq!(provider.list_sets().await.unwrap(), vec!["examples".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_brings_new_schema_files() {
        let fixture = TemplateFixture::examples().unwrap();
        let fs = FsTemplateProvider::new(fixture.root());
        let provider = DataStoreTemplateProvider::new(Arc::new(MemoryDataStore::new()));

        provider.upload_set(&fs.get_set_data("examples").await.unwrap()).await.unwrap();
        provider.fetch("examples/simple_http").await.unwrap();

        fixture.write_schema("colors", "mine", r#"{"color": {"type": "string", "enum": ["red", "blue"]}}"#).unwrap();
        fixture.write_template("colors", "colored", r#"{"c": {{color:mine}}}"#).unwrap();
        provider.upload_set(&fs.get_set_data("colors").await.unwrap()).await.unwrap();

        let engine = provider.fetch("colors/colored").await.unwrap();
        assert_eq!(engine.render(&json!({"color": "blue"})).unwrap(), json!({"c": "blue"}));

        provider.remove_set("colors").await.unwrap();
        let err = provider.fetch("colors/colored").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DeclkitError>(), Some(DeclkitError::TemplateNotFound { .. })));
        assert!(provider.fetch("examples/simple_http").await.is_ok());
    }
}
