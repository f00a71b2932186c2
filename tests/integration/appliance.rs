use declkit::codec::{self, Record};
use declkit::constants::MAX_RECORD_DATA;
use declkit::core::DeclkitError;
use declkit::provider::{DataStoreTemplateProvider, FsTemplateProvider, TemplateProvider};
use declkit::storage::{ApplianceDataStore, DataStore};
use declkit::templating::TemplateSetData;
use declkit::test_utils::{FakeAppliance, TemplateFixture};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const COLLECTION: &str = "/declkit/dataStore";

fn appliance_store(shell: &Arc<FakeAppliance>) -> Arc<ApplianceDataStore> {
    Arc::new(ApplianceDataStore::new(shell.clone(), "declkit", "dataStore"))
}

/// A set whose bundle does not compress below one record.
fn oversized_set() -> TemplateSetData {
    let noise: Vec<String> = (0..6000).map(|_| uuid::Uuid::new_v4().to_string()).collect();
    let mut templates = BTreeMap::new();
    templates.insert(
        "big".to_string(),
        format!(
            "{{\"class\": \"ADC\", {{{{tenant_name}}}}: {{\"class\": \"Tenant\", {{{{app_name}}}}: {{\"class\": \"Application\", \"remark\": \"{}\"}}}}}}",
            noise.join(" ")
        ),
    );
    TemplateSetData::new("large", templates, BTreeMap::new())
}

#[tokio::test]
async fn test_upload_and_render_through_appliance() {
    let fixture = TemplateFixture::examples().unwrap();
    let local = FsTemplateProvider::new(fixture.root());
    let shell = Arc::new(FakeAppliance::new());
    let provider = DataStoreTemplateProvider::new(appliance_store(&shell));

    provider.upload_set(&local.get_set_data("examples").await.unwrap()).await.unwrap();
    assert_eq!(shell.save_count(), 1);

    let status = provider.set_status("examples", Some(&local)).await.unwrap();
    assert!(status.supported);
    assert!(!status.update_available);

    let engine = provider.fetch("examples/with_pool").await.unwrap();
    let declaration = engine.render(&json!({"tenant_name": "edge", "pool_members": "10.9.9.9"})).unwrap();
    assert_eq!(declaration["edge"]["app1"]["pool"]["members"][0]["serverAddresses"], json!(["10.9.9.9"]));
}

#[tokio::test]
async fn test_oversized_set_is_chunked() {
    let shell = Arc::new(FakeAppliance::new());
    let provider = DataStoreTemplateProvider::new(appliance_store(&shell));
    let data = oversized_set();

    provider.upload_set(&data).await.unwrap();

    let records = shell.records(COLLECTION);
    assert!(records.len() > 1, "expected several chunks, got {}", records.len());
    assert!(records.iter().all(|r| r.data.len() <= MAX_RECORD_DATA));
    assert_eq!(codec::records_to_keys(&records), vec!["large".to_string()]);

    // A fresh store instance reads the chunks back in order.
    let reopened = DataStoreTemplateProvider::new(appliance_store(&shell));
    let restored = reopened.get_set_data("large").await.unwrap();
    assert_eq!(restored, data);
    assert!(restored.verify_hash());

    let engine = reopened.fetch("large/big").await.unwrap();
    assert!(engine.render(&json!({})).unwrap()["t1"]["app1"]["remark"].as_str().unwrap().len() > 200_000);
}

#[tokio::test]
async fn test_sets_share_one_collection() {
    let fixture = TemplateFixture::examples().unwrap();
    let local = FsTemplateProvider::new(fixture.root());
    let shell = Arc::new(FakeAppliance::new());
    let store = appliance_store(&shell);
    let provider = DataStoreTemplateProvider::new(store.clone());

    for set in ["examples", "extra"] {
        provider.upload_set(&local.get_set_data(set).await.unwrap()).await.unwrap();
    }
    provider.upload_set(&oversized_set()).await.unwrap();

    let mut keys = store.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["examples", "extra", "large"]);

    provider.remove_set("large").await.unwrap();
    let remaining: Vec<Record> = shell.records(COLLECTION);
    let mut keys = codec::records_to_keys(&remaining);
    keys.sort();
    assert_eq!(keys, vec!["examples", "extra"]);
    assert_eq!(provider.list_sets().await.unwrap(), vec!["examples".to_string(), "extra".to_string()]);
}

#[tokio::test]
async fn test_shell_failure_surfaces() {
    let shell = Arc::new(FakeAppliance::new());
    let store = appliance_store(&shell);
    store.set_item("a", json!(1)).await.unwrap();

    shell.fail_on("save sys config", "01070734:3: Configuration error");
    let err = store.persist().await.unwrap_err();
    match err.downcast_ref::<DeclkitError>() {
        Some(DeclkitError::ShellCommandFailed {
            stderr,
            ..
        }) => assert!(stderr.contains("Configuration error")),
        other => panic!("unexpected error: {other:?}"),
    }
}
