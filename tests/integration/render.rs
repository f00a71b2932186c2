use declkit::core::DeclkitError;
use declkit::provider::{FsTemplateProvider, TemplateProvider};
use declkit::test_utils::TemplateFixture;
use serde_json::{Value, json};

async fn provider() -> (TemplateFixture, FsTemplateProvider) {
    let fixture = TemplateFixture::examples().unwrap();
    let provider = FsTemplateProvider::new(fixture.root());
    (fixture, provider)
}

#[tokio::test]
async fn test_render_simple_http_with_defaults() {
    let (_fixture, provider) = provider().await;
    let engine = provider.fetch("examples/simple_http").await.unwrap();

    let declaration = engine.render(&json!({})).unwrap();
    assert_eq!(declaration["class"], "ADC");

    let app = &declaration["t1"]["app1"];
    assert_eq!(app["serviceMain"]["virtualAddresses"], json!(["10.0.0.1"]));
    assert_eq!(app["serviceMain"]["virtualPort"], 80);
    assert_eq!(app["web_pool"]["members"][0]["serverAddresses"], json!([]));

    // The declaration id and the recorded view share the generated uuid.
    let uuid = app["constants"]["view"]["uuid"].as_str().unwrap();
    assert_eq!(declaration["id"], uuid);
}

#[tokio::test]
async fn test_render_with_pool_unwraps_request() {
    let (_fixture, provider) = provider().await;
    let engine = provider.fetch("examples/with_pool").await.unwrap();

    let params = json!({
        "tenant_name": "prod",
        "app_name": "shop",
        "virtual_address": "10.0.0.2",
        "virtual_port": 8443,
        "lb_method": "least-connections-member",
        "monitor": "http",
        "server_port": 443,
        "pool_members": ["10.0.1.10", "10.0.1.11"],
        "share_nodes": false,
    });
    assert!(engine.validate(&params).is_none());

    let declaration = engine.render(&params).unwrap();
    assert!(declaration.get("action").is_none());
    let pool = &declaration["prod"]["shop"]["pool"];
    assert_eq!(pool["loadBalancingMode"], "least-connections-member");
    assert_eq!(pool["monitors"], json!(["http"]));
    assert_eq!(pool["members"][0]["servicePort"], 443);
    assert_eq!(pool["members"][0]["shareNodes"], false);
    assert_eq!(declaration["prod"]["shop"]["service"]["virtualPort"], 8443);
}

#[tokio::test]
async fn test_enum_violation_reported() {
    let (_fixture, provider) = provider().await;
    let engine = provider.fetch("examples/with_pool").await.unwrap();

    let issues = engine
        .validate(&json!({
            "tenant_name": "prod",
            "app_name": "shop",
            "virtual_address": "10.0.0.2",
            "virtual_port": 443,
            "lb_method": "random",
            "monitor": "tcp",
            "server_port": 443,
            "pool_members": "10.0.1.10",
            "share_nodes": true,
        }))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "/lb_method");
}

#[tokio::test]
async fn test_rename_application() {
    let (_fixture, provider) = provider().await;
    let engine = provider.fetch("examples/simple_http").await.unwrap();

    let declaration = engine.render(&json!({"application_name": "storefront"})).unwrap();
    let tenant = declaration["t1"].as_object().unwrap();
    assert!(tenant.contains_key("storefront"));
    assert!(!tenant.contains_key("app1"));
    assert_eq!(tenant["storefront"]["constants"]["view"]["application_name"], "storefront");
}

#[tokio::test]
async fn test_malformed_template_reports_text() {
    let (fixture, provider) = provider().await;
    fixture.write_template("extra", "broken", r#"{"port": {{port:integer}},}"#).unwrap();

    let engine = provider.fetch("extra/broken").await.unwrap();
    let err = engine.render(&json!({"port": 1})).unwrap_err();
    match err.downcast_ref::<DeclkitError>() {
        Some(DeclkitError::MalformedOutput {
            template,
            text,
            ..
        }) => {
            assert_eq!(template, "extra/broken");
            assert_eq!(text, r#"{"port": 1,}"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_schema_is_deterministic() {
    let (_fixture, first) = provider().await;
    let (_other, second) = provider().await;

    let a: Value = first.fetch("examples/with_pool").await.unwrap().schema().clone();
    let b: Value = second.fetch("examples/with_pool").await.unwrap().schema().clone();
    assert_eq!(a.to_string(), b.to_string());
}
