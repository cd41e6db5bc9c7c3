use super::helpers::users_contract;
use contractwatch::errors::GatewayError;
use contractwatch::gateway::{MockServerGateway, StubCatalog};
use contractwatch::stubs::stubs_from_contract;
use contractwatch::testing::{FakeHttpServer, FakeResponse};
use std::time::Duration;

fn gateway(server: &FakeHttpServer) -> MockServerGateway {
    MockServerGateway::new(&format!("{}/__admin/", server.url()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_create_stub_posts_mapping() {
    let server = FakeHttpServer::builder()
        .route("POST", "/__admin/mappings", FakeResponse::json(201, r#"{"id":"m-1"}"#))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);
    let stub = stubs_from_contract(&users_contract("http://p")).remove(0);

    let id = gw.create_stub(&stub).await.unwrap();
    assert_eq!(id, "m-1");

    let calls = server.requests().await;
    assert_eq!(calls.len(), 1);
    let sent: serde_json::Value = serde_json::from_str(&calls[0].body).unwrap();
    assert_eq!(sent["request"]["method"], stub.request.method.as_str());
    assert!(sent["response"]["status"].is_u64());
    server.stop().await;
}

#[tokio::test]
async fn test_list_stubs_decodes_mappings() {
    let body = r#"{"mappings":[
        {"id":"a","request":{"method":"GET","urlPath":"/health"},"response":{"status":200}},
        {"id":"b","request":{"method":"GET","urlPathPattern":"/users/([^/]+)"},"response":{"status":200},
         "scenarioName":"s","requiredScenarioState":"state_0"}
    ],"meta":{"total":2}}"#;
    let server = FakeHttpServer::builder()
        .route("GET", "/__admin/mappings", FakeResponse::json(200, body))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);

    let stubs = StubCatalog::list_stubs(&gw).await.unwrap();
    assert_eq!(stubs.len(), 2);
    assert_eq!(stubs[0].id.as_deref(), Some("a"));
    assert_eq!(stubs[0].url_matcher(), Some("/health"));
    assert!(stubs[1].request.is_pattern());
    assert_eq!(
        stubs[1].scenario.as_ref().unwrap().required_scenario_state.as_deref(),
        Some("state_0")
    );
    server.stop().await;
}

#[tokio::test]
async fn test_clear_and_reset() {
    let server = FakeHttpServer::builder()
        .route("DELETE", "/__admin/mappings", FakeResponse::empty(200))
        .route("POST", "/__admin/reset", FakeResponse::empty(200))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);

    gw.clear_stubs().await.unwrap();
    gw.clear_stubs().await.unwrap();
    gw.reset().await.unwrap();
    assert_eq!(server.hits("DELETE", "/__admin/mappings").await, 2);
    assert_eq!(server.hits("POST", "/__admin/reset").await, 1);
    server.stop().await;
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = FakeHttpServer::builder()
        .fallback(FakeResponse::new(503, "down"))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);

    match gw.list_stubs().await {
        Err(GatewayError::HttpStatus { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "down");
        }
        other => panic!("unexpected: {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_unreachable_admin_is_transport_error() {
    let gw = MockServerGateway::new("http://127.0.0.1:1/__admin", Duration::from_secs(2)).unwrap();
    assert!(matches!(gw.reset().await, Err(GatewayError::Transport(_))));
}

#[tokio::test]
async fn test_deploy_skips_failed_stubs() {
    let server = FakeHttpServer::builder()
        .route("POST", "/__admin/mappings", FakeResponse::json(201, r#"{"id":"first"}"#))
        .route("POST", "/__admin/mappings", FakeResponse::new(500, "boom"))
        .route("POST", "/__admin/mappings", FakeResponse::json(201, r#"{"uuid":"third"}"#))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);
    let stubs = stubs_from_contract(&users_contract("http://p"));
    assert_eq!(stubs.len(), 3);

    let deployed = gw.deploy(&stubs).await;
    let ids: Vec<&str> = deployed.iter().filter_map(|s| s.id.as_deref()).collect();
    assert_eq!(ids, vec!["first", "third"]);
    assert_eq!(deployed[0].request, stubs[0].request);
    assert_eq!(deployed[1].request, stubs[2].request);
    server.stop().await;
}

#[tokio::test]
async fn test_generate_and_deploy_clears_first() {
    let server = FakeHttpServer::builder()
        .route("DELETE", "/__admin/mappings", FakeResponse::empty(200))
        .route("POST", "/__admin/mappings", FakeResponse::json(201, r#"{"id":"x"}"#))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);

    let deployed = gw
        .generate_and_deploy(&users_contract("http://p"), true)
        .await
        .unwrap();
    assert_eq!(deployed.len(), 3);

    let calls = server.requests().await;
    assert_eq!(calls[0].method, "DELETE");
    assert_eq!(calls.iter().filter(|c| c.method == "POST").count(), 3);
    server.stop().await;
}

#[tokio::test]
async fn test_generate_and_deploy_fails_when_clear_fails() {
    let server = FakeHttpServer::builder()
        .route("DELETE", "/__admin/mappings", FakeResponse::new(500, "nope"))
        .build()
        .await
        .unwrap();
    let gw = gateway(&server);

    let result = gw.generate_and_deploy(&users_contract("http://p"), true).await;
    assert!(matches!(result, Err(GatewayError::HttpStatus { status: 500, .. })));
    assert_eq!(server.hits("POST", "/__admin/mappings").await, 0);
    server.stop().await;
}
