//! Validation Orchestrator
//!
//! Drives one validation pass for a contract:
//! test run -> alignment check -> health scoring -> persistence.
//!
//! Runs move `PENDING -> RUNNING -> {COMPLETED | FAILED | CANCELLED}`.
//! Triggering a run id again replaces the previous record.

pub mod pipeline;
pub mod ports;

pub use pipeline::{synthesize_from_traffic, SynthesisOutput, SynthesisSettings};
pub use ports::{AuthSource, InMemoryRunStore, NotificationSink, RunStore, StaticAuth, TracingNotifier};

use crate::alignment::{self, AlignmentReport};
use crate::errors::{PipelineError, PipelineStage};
use crate::gateway::StubCatalog;
use crate::health::{self, HealthAssessment, HealthStatus};
use crate::observability::{redact_for_log, track_stage};
use crate::openapi::OpenApiDocument;
use crate::runner::{auth::prepare_auth, ContractTestRunner, RunnerOptions, TestRunResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "PENDING",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Failed => "FAILED",
            RunState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Cancelled)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Completed, Pending)
                | (Failed, Pending)
                | (Cancelled, Pending)
        )
    }
}

/// One validation pass and, once finished, its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRun {
    pub run_id: String,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_result: Option<TestRunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PipelineError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ValidationRun {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            state: RunState::Pending,
            test_result: None,
            alignment: None,
            health: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(
                run_id = self.run_id.as_str(),
                from = self.state.as_str(),
                to = next.as_str(),
                "Unexpected run state transition"
            );
        }
        self.state = next;
        match next {
            RunState::Running => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.finished_at = Some(Utc::now()),
            _ => {}
        }
    }

    fn clear_results(&mut self) {
        self.test_result = None;
        self.alignment = None;
        self.health = None;
        self.error = None;
    }
}

/// Published to the notification sink when a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: String,
    pub state: RunState,
    pub health_score: Option<f64>,
    pub health_status: Option<HealthStatus>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RunEvent {
    fn from_run(run: &ValidationRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            state: run.state,
            health_score: run.health.as_ref().map(|h| h.score),
            health_status: run.health.as_ref().map(|h| h.status),
            error: run.error.as_ref().map(|e| e.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// What one validation pass should check.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub run_id: String,
    pub contract: OpenApiDocument,
    pub provider_url: String,
}

pub struct ValidationOrchestrator {
    store: Arc<dyn RunStore>,
    catalog: Arc<dyn StubCatalog>,
    notifier: Arc<dyn NotificationSink>,
    auth: Arc<dyn AuthSource>,
    runner_options: RunnerOptions,
    active: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl ValidationOrchestrator {
    pub fn new(
        store: Arc<dyn RunStore>,
        catalog: Arc<dyn StubCatalog>,
        notifier: Arc<dyn NotificationSink>,
        auth: Arc<dyn AuthSource>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            auth,
            runner_options: RunnerOptions::default(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_runner_options(mut self, options: RunnerOptions) -> Self {
        self.runner_options = options;
        self
    }

    /// Run one pass to a terminal state.
    ///
    /// Stage failures end in a FAILED run, not an `Err`. `Err` means the
    /// run could not be started or its final state could not be stored.
    pub async fn execute(&self, request: &ValidationRequest) -> Result<ValidationRun, PipelineError> {
        let run_id = request.run_id.as_str();

        // Registered before the claim so a cancel during PENDING is seen.
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.active.lock().await;
            if active.contains_key(run_id) {
                return Err(PipelineError::new(
                    PipelineStage::Persistence,
                    format!("run '{}' already has an active pass", run_id),
                ));
            }
            active.insert(run_id.to_string(), Arc::clone(&cancelled));
        }

        let mut run = match self.store.begin_run(run_id).await {
            Ok(run) => run,
            Err(e) => {
                self.active.lock().await.remove(run_id);
                return Err(PipelineError::new(PipelineStage::Persistence, e));
            }
        };

        if self.cancelled_while_pending(run_id, &cancelled).await {
            self.active.lock().await.remove(run_id);
            run.clear_results();
            run.transition(RunState::Cancelled);
            info!(run_id, "Validation run cancelled before start");
            self.store
                .save(&run)
                .await
                .map_err(|e| PipelineError::new(PipelineStage::Persistence, e))?;
            return Ok(run);
        }

        run.clear_results();
        run.transition(RunState::Running);
        if let Err(e) = self.store.save(&run).await {
            self.active.lock().await.remove(run_id);
            return Err(PipelineError::new(PipelineStage::Persistence, e));
        }
        info!(run_id, provider = request.provider_url.as_str(), "Validation run started");

        let outcome = self.run_stages(request, &cancelled).await;
        self.active.lock().await.remove(run_id);

        if cancelled.load(Ordering::SeqCst) {
            run.clear_results();
            run.transition(RunState::Cancelled);
            info!(run_id, "Validation run cancelled; results discarded");
            self.store
                .save(&run)
                .await
                .map_err(|e| PipelineError::new(PipelineStage::Persistence, e))?;
            return Ok(run);
        }

        match outcome {
            Ok((test_result, alignment, health)) => {
                run.test_result = Some(test_result);
                run.alignment = Some(alignment);
                run.health = Some(health);
                run.transition(RunState::Completed);
                let saved = track_stage(PipelineStage::Persistence, run_id, || self.store.save(&run)).await;
                if let Err(e) = saved {
                    run.clear_results();
                    run.error = Some(PipelineError::new(PipelineStage::Persistence, e));
                    run.state = RunState::Failed;
                    run.finished_at = Some(Utc::now());
                    // best effort: the store just failed once
                    if let Err(e) = self.store.save(&run).await {
                        warn!(run_id, error = %e, "Could not record failed run");
                    }
                }
            }
            Err(e) => {
                run.error = Some(e);
                run.transition(RunState::Failed);
                self.store
                    .save(&run)
                    .await
                    .map_err(|e| PipelineError::new(PipelineStage::Persistence, e))?;
            }
        }

        self.publish(&run);
        Ok(run)
    }

    async fn cancelled_while_pending(&self, run_id: &str, flag: &AtomicBool) -> bool {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        match self.store.load(run_id).await {
            Ok(Some(stored)) => stored.state == RunState::Cancelled,
            Ok(None) => false,
            Err(e) => {
                warn!(run_id, error = %e, "Could not re-read run before start");
                false
            }
        }
    }

    async fn run_stages(
        &self,
        request: &ValidationRequest,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<(TestRunResult, AlignmentReport, HealthAssessment), PipelineError> {
        let run_id = request.run_id.as_str();

        let test_result = track_stage(PipelineStage::TestRun, run_id, || async {
            let (method, settings) = self
                .auth
                .auth_for(run_id)
                .await
                .map_err(|e| PipelineError::new(PipelineStage::TestRun, e))?;
            let prepared = prepare_auth(&method, &settings);
            let runner = ContractTestRunner::new(self.runner_options.clone())
                .map_err(|e| PipelineError::new(PipelineStage::TestRun, e))?
                .with_cancellation_flag(Arc::clone(cancelled));
            Ok::<_, PipelineError>(
                runner
                    .run(&request.contract, &request.provider_url, &prepared)
                    .await,
            )
        })
        .await?;

        if cancelled.load(Ordering::SeqCst) {
            return Err(PipelineError::new(PipelineStage::TestRun, "cancelled"));
        }

        let alignment = track_stage(PipelineStage::Alignment, run_id, || async {
            let deployed = self
                .catalog
                .list_stubs()
                .await
                .map_err(|e| PipelineError::new(PipelineStage::Alignment, e))?;
            Ok::<_, PipelineError>(alignment::compare(&request.contract, &deployed, Some(&test_result)))
        })
        .await?;

        let health = track_stage(PipelineStage::Scoring, run_id, || async {
            Ok::<_, PipelineError>(health::assess(&test_result, &alignment))
        })
        .await?;

        Ok((test_result, alignment, health))
    }

    /// Cancel a PENDING or RUNNING run. Returns whether anything was cancelled.
    pub async fn cancel(&self, run_id: &str) -> Result<bool, PipelineError> {
        let was_active = match self.active.lock().await.get(run_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        };

        let stored = self
            .store
            .load(run_id)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Persistence, e))?;
        match stored {
            Some(mut run) if matches!(run.state, RunState::Pending | RunState::Running) => {
                run.clear_results();
                run.transition(RunState::Cancelled);
                self.store
                    .save(&run)
                    .await
                    .map_err(|e| PipelineError::new(PipelineStage::Persistence, e))?;
                info!(run_id, "Validation run cancelled");
                Ok(true)
            }
            _ => Ok(was_active),
        }
    }

    pub async fn status(&self, run_id: &str) -> Result<Option<ValidationRun>, PipelineError> {
        self.store
            .load(run_id)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Persistence, e))
    }

    /// Fire and forget; the sink runs on its own task.
    fn publish(&self, run: &ValidationRun) {
        if !matches!(run.state, RunState::Completed | RunState::Failed) {
            return;
        }
        let event = RunEvent::from_run(run);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                warn!(
                    run_id = event.run_id.as_str(),
                    error = %redact_for_log(&e.to_string()),
                    "Notification failed"
                );
            }
        });
    }
}
