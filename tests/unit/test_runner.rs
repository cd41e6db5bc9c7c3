use super::helpers::users_contract;
use contractwatch::runner::{
    connectivity_check, prepare_auth, ContractTestRunner, PreparedAuth, RunnerOptions,
};
use contractwatch::testing::{FakeHttpServer, FakeResponse};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn options(timeout_ms: u64) -> RunnerOptions {
    RunnerOptions {
        timeout: Duration::from_millis(timeout_ms),
        ..Default::default()
    }
}

async fn healthy_provider() -> FakeHttpServer {
    FakeHttpServer::builder()
        .route("GET", "/users/42", FakeResponse::json(200, r#"{"id":42,"name":"Ada"}"#))
        .route("GET", "/health", FakeResponse::json(200, r#"{"ok":true}"#))
        .route("POST", "/users", FakeResponse::json(201, r#"{"id":7}"#))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_all_declared_operations_pass() {
    let provider = healthy_provider().await;
    let contract = users_contract(provider.url());
    let runner = ContractTestRunner::new(options(5_000)).unwrap();

    let result = runner.run(&contract, provider.url(), &PreparedAuth::default()).await;
    assert_eq!(result.total, 3);
    assert_eq!(result.passed, 3);
    assert_eq!(result.failed, 0);
    assert_eq!(result.success_rate, 100.0);
    assert!(result.errors.is_empty());
    assert!(result.results.iter().all(|r| r.issues.is_empty()));

    let order: Vec<(&str, &str)> = result
        .results
        .iter()
        .map(|r| (r.method.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(order, vec![("GET", "/health"), ("POST", "/users"), ("GET", "/users/{id}")]);

    let create = provider
        .requests()
        .await
        .into_iter()
        .find(|r| r.method == "POST")
        .unwrap();
    assert_eq!(create.body, r#"{"name":"Grace"}"#);
    assert_eq!(create.header("content-type"), Some("application/json"));
    provider.stop().await;
}

#[tokio::test]
async fn test_bearer_header_injected() {
    let provider = healthy_provider().await;
    let contract = users_contract(provider.url());
    let auth = prepare_auth("bearer", &BTreeMap::from([("token".to_string(), "s3cret".to_string())]));
    let runner = ContractTestRunner::new(options(5_000)).unwrap();

    runner.run(&contract, provider.url(), &auth).await;
    let requests = provider.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|r| r.header("authorization") == Some("Bearer s3cret")));
    provider.stop().await;
}

#[tokio::test]
async fn test_api_key_in_query() {
    let provider = healthy_provider().await;
    let contract = users_contract(provider.url());
    let auth = prepare_auth(
        "api_key",
        &BTreeMap::from([
            ("key".to_string(), "k1".to_string()),
            ("location".to_string(), "query".to_string()),
        ]),
    );
    let runner = ContractTestRunner::new(options(5_000)).unwrap();

    let result = runner.run(&contract, provider.url(), &auth).await;
    assert_eq!(result.passed, 3);
    let requests = provider.requests().await;
    assert!(requests.iter().all(|r| r.query.as_deref() == Some("api_key=k1")));
    provider.stop().await;
}

#[tokio::test]
async fn test_undeclared_status_passes_with_issue() {
    let provider = FakeHttpServer::builder()
        .route("GET", "/users/42", FakeResponse::empty(418))
        .fallback(FakeResponse::json(200, "{}"))
        .build()
        .await
        .unwrap();
    let contract = users_contract(provider.url());
    let runner = ContractTestRunner::new(options(5_000)).unwrap();

    let result = runner.run(&contract, provider.url(), &PreparedAuth::default()).await;
    let user = result.results.iter().find(|r| r.path == "/users/{id}").unwrap();
    assert!(user.passed);
    assert_eq!(user.status, Some(418));
    assert_eq!(user.issues, vec!["undeclared status code 418".to_string()]);

    // POST /users declares only 201
    let create = result.results.iter().find(|r| r.method == "POST").unwrap();
    assert!(create.issues.iter().any(|i| i.contains("undeclared status code 200")));
    provider.stop().await;
}

#[tokio::test]
async fn test_server_error_fails_call() {
    let provider = FakeHttpServer::builder()
        .route("GET", "/health", FakeResponse::new(500, "oops"))
        .route("GET", "/users/42", FakeResponse::json(200, "{}"))
        .route("POST", "/users", FakeResponse::json(201, "{}"))
        .build()
        .await
        .unwrap();
    let contract = users_contract(provider.url());
    let runner = ContractTestRunner::new(options(5_000)).unwrap();

    let result = runner.run(&contract, provider.url(), &PreparedAuth::default()).await;
    assert_eq!(result.failed, 1);
    assert!(result.has_failure_for("get", "/health"));
    assert!(!result.has_failure_for("GET", "/users/{id}"));
    assert!((result.success_rate - 200.0 / 3.0).abs() < 1e-9);
    provider.stop().await;
}

#[tokio::test]
async fn test_timeout_is_failed_call() {
    let provider = FakeHttpServer::builder()
        .route("GET", "/health", FakeResponse::json(200, "{}").with_delay(2_000))
        .fallback(FakeResponse::json(200, "{}"))
        .build()
        .await
        .unwrap();
    let contract = users_contract(provider.url());
    let runner = ContractTestRunner::new(options(300)).unwrap();

    let result = runner.run(&contract, provider.url(), &PreparedAuth::default()).await;
    assert_eq!(result.total, 3);
    let health = result.results.iter().find(|r| r.path == "/health").unwrap();
    assert!(!health.passed);
    assert_eq!(health.status, None);
    assert!(health.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(result.errors.len(), 1);
    provider.stop().await;
}

#[tokio::test]
async fn test_slow_call_flagged() {
    let provider = FakeHttpServer::builder()
        .fallback(FakeResponse::json(200, "{}"))
        .with_latency(150)
        .build()
        .await
        .unwrap();
    let contract = users_contract(provider.url());
    let runner = ContractTestRunner::new(RunnerOptions {
        slow_threshold: Duration::from_millis(50),
        max_examples: 1,
        ..Default::default()
    })
    .unwrap();

    let result = runner.run(&contract, provider.url(), &PreparedAuth::default()).await;
    assert_eq!(result.total, 1);
    assert!(result.results[0].passed);
    assert!(result.results[0].issues[0].starts_with("slow response"));
    provider.stop().await;
}

#[tokio::test]
async fn test_unreachable_provider_fails_every_call() {
    let contract = users_contract("http://127.0.0.1:1");
    let runner = ContractTestRunner::new(options(2_000)).unwrap();

    let result = runner.run(&contract, "http://127.0.0.1:1", &PreparedAuth::default()).await;
    assert_eq!(result.total, 3);
    assert_eq!(result.passed, 0);
    assert_eq!(result.success_rate, 0.0);
    assert_eq!(result.errors.len(), 3);
}

#[tokio::test]
async fn test_cancelled_runner_issues_no_calls() {
    let provider = healthy_provider().await;
    let contract = users_contract(provider.url());
    let flag = Arc::new(AtomicBool::new(false));
    let runner = ContractTestRunner::new(options(5_000))
        .unwrap()
        .with_cancellation_flag(Arc::clone(&flag));

    flag.store(true, Ordering::SeqCst);
    assert!(runner.is_cancelled());
    let result = runner.run(&contract, provider.url(), &PreparedAuth::default()).await;
    assert_eq!(result.total, 0);
    assert!(provider.requests().await.is_empty());
    provider.stop().await;
}

#[tokio::test]
async fn test_connectivity_check() {
    let provider = FakeHttpServer::builder()
        .route("GET", "/", FakeResponse::empty(204))
        .build()
        .await
        .unwrap();
    let report = connectivity_check(provider.url(), Duration::from_secs(2)).await;
    assert!(report.reachable);
    assert_eq!(report.status_code, Some(204));
    assert!(report.error.is_none());
    provider.stop().await;

    let report = connectivity_check("http://127.0.0.1:1", Duration::from_secs(2)).await;
    assert!(!report.reachable);
    assert!(report.error.is_some());
}

#[test]
fn test_runner_builds_outside_runtime() {
    let runner = ContractTestRunner::new(RunnerOptions::default()).unwrap();
    assert_eq!(runner.options().max_examples, 50);
    let report = tokio_test::block_on(connectivity_check("http://127.0.0.1:1", Duration::from_millis(500)));
    assert!(!report.reachable);
}
