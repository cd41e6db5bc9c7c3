use super::helpers::users_contract;
use async_trait::async_trait;
use contractwatch::errors::{GatewayError, PipelineStage};
use contractwatch::gateway::StubCatalog;
use contractwatch::health::{HealthStatus, REC_HIGH_FAILURE_RATE, REC_IMMEDIATE_ATTENTION, REC_UPDATE_MOCKS};
use contractwatch::openapi::OpenApiDocument;
use contractwatch::orchestrator::{
    InMemoryRunStore, NotificationSink, RunEvent, RunState, RunStore, StaticAuth,
    ValidationOrchestrator, ValidationRequest, ValidationRun,
};
use contractwatch::runner::RunnerOptions;
use contractwatch::stubs::{stubs_from_contract, MockStub};
use contractwatch::testing::{FakeHttpServer, FakeResponse};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct FixedCatalog(Result<Vec<MockStub>, GatewayError>);

#[async_trait]
impl StubCatalog for FixedCatalog {
    async fn list_stubs(&self) -> Result<Vec<MockStub>, GatewayError> {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<RunEvent>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, event: &RunEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl NotificationSink for FailingNotifier {
    async fn notify(&self, _event: &RunEvent) -> anyhow::Result<()> {
        anyhow::bail!("webhook rejected token=abc123")
    }
}

/// Sleeps after claiming, widening the PENDING window.
struct SlowClaimStore {
    inner: InMemoryRunStore,
    claim_delay: Duration,
}

#[async_trait]
impl RunStore for SlowClaimStore {
    async fn begin_run(&self, run_id: &str) -> anyhow::Result<ValidationRun> {
        let run = self.inner.begin_run(run_id).await?;
        tokio::time::sleep(self.claim_delay).await;
        Ok(run)
    }

    async fn save(&self, run: &ValidationRun) -> anyhow::Result<()> {
        self.inner.save(run).await
    }

    async fn load(&self, run_id: &str) -> anyhow::Result<Option<ValidationRun>> {
        self.inner.load(run_id).await
    }
}

struct HangingNotifier;

#[async_trait]
impl NotificationSink for HangingNotifier {
    async fn notify(&self, _event: &RunEvent) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Notifications are delivered on a spawned task; wait for `expected` of them.
async fn wait_for_events(notifier: &RecordingNotifier, expected: usize) -> Vec<RunEvent> {
    for _ in 0..100 {
        {
            let events = notifier.events.lock().await;
            if events.len() >= expected {
                return events.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    notifier.events.lock().await.clone()
}

struct Harness {
    store: Arc<InMemoryRunStore>,
    notifier: Arc<RecordingNotifier>,
    orchestrator: Arc<ValidationOrchestrator>,
}

fn harness(catalog: FixedCatalog) -> Harness {
    let store = Arc::new(InMemoryRunStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = ValidationOrchestrator::new(
        store.clone(),
        Arc::new(catalog),
        notifier.clone(),
        Arc::new(StaticAuth::new("none", BTreeMap::new())),
    )
    .with_runner_options(RunnerOptions {
        timeout: Duration::from_secs(5),
        ..Default::default()
    });
    Harness {
        store,
        notifier,
        orchestrator: Arc::new(orchestrator),
    }
}

fn request(run_id: &str, contract: &OpenApiDocument, provider: &str) -> ValidationRequest {
    ValidationRequest {
        run_id: run_id.to_string(),
        contract: contract.clone(),
        provider_url: provider.to_string(),
    }
}

async fn provider(status: u16, delay_ms: u64) -> FakeHttpServer {
    FakeHttpServer::builder()
        .fallback(FakeResponse::json(status, "{}").with_delay(delay_ms))
        .route("GET", "/users/42", FakeResponse::json(200, "{}").with_delay(delay_ms))
        .route("GET", "/health", FakeResponse::json(200, "{}").with_delay(delay_ms))
        .route("POST", "/users", FakeResponse::json(201, "{}").with_delay(delay_ms))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_healthy_run_completes() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let h = harness(FixedCatalog(Ok(stubs_from_contract(&contract))));

    let run = h
        .orchestrator
        .execute(&request("contract-1", &contract, server.url()))
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Completed);
    assert!(run.started_at.is_some() && run.finished_at.is_some());
    assert_eq!(run.test_result.as_ref().unwrap().passed, 3);
    let alignment = run.alignment.as_ref().unwrap();
    assert_eq!(alignment.aligned_endpoints, 3);
    assert_eq!(alignment.alignment_rate, 1.0);
    let health = run.health.as_ref().unwrap();
    assert_eq!(health.score, 1.0);
    assert_eq!(health.status, HealthStatus::Healthy);

    let stored = h.orchestrator.status("contract-1").await.unwrap().unwrap();
    assert_eq!(stored.state, RunState::Completed);

    let events = wait_for_events(&h.notifier, 1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, RunState::Completed);
    assert_eq!(events[0].health_status, Some(HealthStatus::Healthy));
    server.stop().await;
}

#[tokio::test]
async fn test_failing_provider_is_broken() {
    let server = FakeHttpServer::builder()
        .fallback(FakeResponse::new(500, "down"))
        .build()
        .await
        .unwrap();
    let contract = users_contract(server.url());
    let h = harness(FixedCatalog(Ok(stubs_from_contract(&contract))));

    let run = h
        .orchestrator
        .execute(&request("broken", &contract, server.url()))
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Completed);
    let alignment = run.alignment.as_ref().unwrap();
    assert_eq!(alignment.schema_mismatches, 3);

    let health = run.health.as_ref().unwrap();
    // 0.7 * 0.0 + 0.3 * (1.0 - 0.3)
    assert_eq!(health.score, 0.21);
    assert_eq!(health.status, HealthStatus::Broken);
    assert_eq!(
        health.recommendations,
        vec![
            REC_IMMEDIATE_ATTENTION.to_string(),
            REC_HIGH_FAILURE_RATE.to_string(),
            REC_UPDATE_MOCKS.to_string(),
        ]
    );
    server.stop().await;
}

#[tokio::test]
async fn test_catalog_error_fails_run() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let h = harness(FixedCatalog(Err(GatewayError::Transport("refused".to_string()))));

    let run = h
        .orchestrator
        .execute(&request("contract-2", &contract, server.url()))
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Failed);
    let error = run.error.as_ref().unwrap();
    assert_eq!(error.stage, PipelineStage::Alignment);
    assert!(error.to_string().contains("refused"));
    assert!(run.health.is_none());

    let events = wait_for_events(&h.notifier, 1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, RunState::Failed);
    assert!(events[0].error.is_some());
    server.stop().await;
}

#[tokio::test]
async fn test_retrigger_replaces_previous_run() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let h = harness(FixedCatalog(Ok(stubs_from_contract(&contract))));
    let req = request("again", &contract, server.url());

    let first = h.orchestrator.execute(&req).await.unwrap();
    let second = h.orchestrator.execute(&req).await.unwrap();
    assert_eq!(second.state, RunState::Completed);
    assert!(second.started_at >= first.finished_at);
    assert_eq!(h.store.len().await, 1);
    assert_eq!(wait_for_events(&h.notifier, 2).await.len(), 2);
    server.stop().await;
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_run() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let store = Arc::new(InMemoryRunStore::new());
    let orchestrator = ValidationOrchestrator::new(
        store.clone(),
        Arc::new(FixedCatalog(Ok(stubs_from_contract(&contract)))),
        Arc::new(FailingNotifier),
        Arc::new(StaticAuth::default()),
    );

    let run = orchestrator
        .execute(&request("noisy", &contract, server.url()))
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Completed);
    assert_eq!(store.load("noisy").await.unwrap().unwrap().state, RunState::Completed);
    server.stop().await;
}

#[tokio::test]
async fn test_active_run_cannot_be_restarted() {
    let contract = users_contract("http://127.0.0.1:1");
    let h = harness(FixedCatalog(Ok(Vec::new())));
    let mut busy = ValidationRun::new("busy");
    busy.state = RunState::Running;
    h.store.save(&busy).await.unwrap();

    let err = h
        .orchestrator
        .execute(&request("busy", &contract, "http://127.0.0.1:1"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, PipelineStage::Persistence);
    assert!(h.notifier.events.lock().await.is_empty());
}

#[tokio::test]
async fn test_cancel_discards_results() {
    let server = provider(200, 800).await;
    let contract = users_contract(server.url());
    let h = harness(FixedCatalog(Ok(stubs_from_contract(&contract))));

    let orchestrator = Arc::clone(&h.orchestrator);
    let req = request("slow", &contract, server.url());
    let task = tokio::spawn(async move { orchestrator.execute(&req).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.orchestrator.cancel("slow").await.unwrap());
    let stored = h.orchestrator.status("slow").await.unwrap().unwrap();
    assert_eq!(stored.state, RunState::Cancelled);

    let run = task.await.unwrap().unwrap();
    assert_eq!(run.state, RunState::Cancelled);
    assert!(run.test_result.is_none());
    assert!(run.health.is_none());
    assert!(h.notifier.events.lock().await.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn test_cancel_unknown_or_finished_run() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let h = harness(FixedCatalog(Ok(stubs_from_contract(&contract))));

    assert!(!h.orchestrator.cancel("missing").await.unwrap());

    h.orchestrator
        .execute(&request("done", &contract, server.url()))
        .await
        .unwrap();
    assert!(!h.orchestrator.cancel("done").await.unwrap());
    let stored = h.orchestrator.status("done").await.unwrap().unwrap();
    assert_eq!(stored.state, RunState::Completed);
    server.stop().await;
}

#[tokio::test]
async fn test_cancel_while_pending_is_honoured() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let store = Arc::new(SlowClaimStore {
        inner: InMemoryRunStore::new(),
        claim_delay: Duration::from_millis(200),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = Arc::new(ValidationOrchestrator::new(
        store.clone(),
        Arc::new(FixedCatalog(Ok(stubs_from_contract(&contract)))),
        notifier.clone(),
        Arc::new(StaticAuth::default()),
    ));

    let running = Arc::clone(&orchestrator);
    let req = request("early", &contract, server.url());
    let task = tokio::spawn(async move { running.execute(&req).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orchestrator.cancel("early").await.unwrap());

    let run = task.await.unwrap().unwrap();
    assert_eq!(run.state, RunState::Cancelled);
    assert!(run.started_at.is_none());
    assert!(run.test_result.is_none());
    assert_eq!(store.load("early").await.unwrap().unwrap().state, RunState::Cancelled);
    assert!(server.requests().await.is_empty());
    assert!(notifier.events.lock().await.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn test_second_trigger_while_pending_is_rejected() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let store = Arc::new(SlowClaimStore {
        inner: InMemoryRunStore::new(),
        claim_delay: Duration::from_millis(200),
    });
    let orchestrator = Arc::new(ValidationOrchestrator::new(
        store.clone(),
        Arc::new(FixedCatalog(Ok(stubs_from_contract(&contract)))),
        Arc::new(RecordingNotifier::default()),
        Arc::new(StaticAuth::default()),
    ));

    let first = Arc::clone(&orchestrator);
    let req = request("twice", &contract, server.url());
    let task = tokio::spawn(async move { first.execute(&req).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = orchestrator
        .execute(&request("twice", &contract, server.url()))
        .await
        .unwrap_err();
    assert_eq!(err.stage, PipelineStage::Persistence);

    let run = task.await.unwrap().unwrap();
    assert_eq!(run.state, RunState::Completed);
    assert_eq!(server.requests().await.len(), 3);
    server.stop().await;
}

#[tokio::test]
async fn test_slow_notifier_does_not_delay_result() {
    let server = provider(200, 0).await;
    let contract = users_contract(server.url());
    let orchestrator = ValidationOrchestrator::new(
        Arc::new(InMemoryRunStore::new()),
        Arc::new(FixedCatalog(Ok(stubs_from_contract(&contract)))),
        Arc::new(HangingNotifier),
        Arc::new(StaticAuth::default()),
    );

    let run = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.execute(&request("hang", &contract, server.url())),
    )
    .await
    .expect("execute waited on the notification sink")
    .unwrap();
    assert_eq!(run.state, RunState::Completed);
    server.stop().await;
}
