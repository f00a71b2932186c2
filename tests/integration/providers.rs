use declkit::config::{Settings, StoreKind};
use declkit::provider::{DataStoreTemplateProvider, FsTemplateProvider, TemplateProvider};
use declkit::storage::JsonFileDataStore;
use declkit::templating::KnownHashes;
use declkit::test_utils::TemplateFixture;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_file_store_survives_restart() {
    let fixture = TemplateFixture::examples().unwrap();
    let state = TempDir::new().unwrap();
    let store_path = state.path().join("store.json");
    let local = FsTemplateProvider::new(fixture.root());

    {
        let store = DataStoreTemplateProvider::new(Arc::new(JsonFileDataStore::new(&store_path)));
        for set in local.list_sets().await.unwrap() {
            store.upload_set(&local.get_set_data(&set).await.unwrap()).await.unwrap();
        }
    }

    let reopened = DataStoreTemplateProvider::new(Arc::new(JsonFileDataStore::new(&store_path)));
    assert_eq!(reopened.list().await.unwrap(), local.list().await.unwrap());

    let from_store = reopened.fetch("examples/with_pool").await.unwrap();
    let from_disk = local.fetch("examples/with_pool").await.unwrap();
    assert_eq!(from_store.schema(), from_disk.schema());

    let params = json!({"uuid": "fixed", "pool_members": "10.0.1.10"});
    assert_eq!(from_store.render(&params).unwrap(), from_disk.render(&params).unwrap());
}

#[tokio::test]
async fn test_status_tracks_local_edits() {
    let fixture = TemplateFixture::examples().unwrap();
    let local = FsTemplateProvider::new(fixture.root());
    let store = DataStoreTemplateProvider::new(Arc::new(declkit::storage::MemoryDataStore::new()));

    let data = local.get_set_data("extra").await.unwrap();
    store.upload_set(&data).await.unwrap();

    let status = store.set_status("extra", Some(&local)).await.unwrap();
    assert!(!status.supported);
    assert!(!status.update_available);

    fixture
        .write_template("extra", "second", r#"{"class": "ADC"}"#)
        .unwrap();
    let status = store.set_status("extra", Some(&local)).await.unwrap();
    assert!(status.update_available);

    // Engines built before the upload are replaced afterwards.
    let before = store.fetch("extra/plain").await.unwrap();
    store.upload_set(&local.get_set_data("extra").await.unwrap()).await.unwrap();
    assert!(store.list().await.unwrap().contains(&"extra/second".to_string()));
    let after = store.fetch("extra/plain").await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_configured_hashes_mark_sets_supported() {
    let fixture = TemplateFixture::examples().unwrap();
    let local = FsTemplateProvider::new(fixture.root());
    let data = local.get_set_data("extra").await.unwrap();

    let mut settings = Settings::default();
    settings.store.kind = StoreKind::Memory;
    settings.supported_hashes.insert("extra".to_string(), vec![data.hash.clone()]);

    let store = DataStoreTemplateProvider::new(settings.build_store()).with_known_hashes(settings.known_hashes());
    store.upload_set(&data).await.unwrap();
    assert!(store.set_status("extra", None).await.unwrap().supported);

    let builtin_only = DataStoreTemplateProvider::new(settings.build_store()).with_known_hashes(KnownHashes::builtin());
    builtin_only.upload_set(&data).await.unwrap();
    assert!(!builtin_only.set_status("extra", None).await.unwrap().supported);
}

#[tokio::test]
async fn test_engine_cache_bound() {
    let fixture = TemplateFixture::examples().unwrap();
    let provider = FsTemplateProvider::with_cache_limit(fixture.root(), 2);

    for name in ["examples/simple_http", "examples/with_pool", "extra/plain"] {
        provider.fetch(name).await.unwrap();
    }
    assert_eq!(provider.core().engines().len(), 2);
    assert!(!provider.core().engines().contains("examples/simple_http"));
}
