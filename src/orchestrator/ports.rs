//! Collaborator ports for the validation orchestrator
//!
//! The persistence store, notification sink and auth source are supplied by
//! the embedding application. In-memory and logging adapters ship here for
//! the CLI and tests.

use super::{RunEvent, RunState, ValidationRun};
use crate::observability::sanitize_for_log;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::info;

/// Durable record of validation runs keyed by run id.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Claim `run_id` for a new pass. Must fail while a pass for the same id
    /// is PENDING or RUNNING; a prior terminal record is replaced by a fresh
    /// PENDING one.
    async fn begin_run(&self, run_id: &str) -> anyhow::Result<ValidationRun>;

    /// Overwrite the stored record.
    async fn save(&self, run: &ValidationRun) -> anyhow::Result<()>;

    async fn load(&self, run_id: &str) -> anyhow::Result<Option<ValidationRun>>;
}

/// Receives terminal run events. Failures are logged, never fail the run.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &RunEvent) -> anyhow::Result<()>;
}

/// Auth method and settings for the provider under test, per run.
#[async_trait]
pub trait AuthSource: Send + Sync {
    async fn auth_for(&self, run_id: &str) -> anyhow::Result<(String, BTreeMap<String, String>)>;
}

#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<String, ValidationRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn begin_run(&self, run_id: &str) -> anyhow::Result<ValidationRun> {
        let mut runs = self.runs.write().await;
        if let Some(existing) = runs.get(run_id) {
            if matches!(existing.state, RunState::Pending | RunState::Running) {
                anyhow::bail!("run '{}' already has an active pass", run_id);
            }
        }
        let run = ValidationRun::new(run_id);
        runs.insert(run_id.to_string(), run.clone());
        Ok(run)
    }

    async fn save(&self, run: &ValidationRun) -> anyhow::Result<()> {
        self.runs
            .write()
            .await
            .insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> anyhow::Result<Option<ValidationRun>> {
        Ok(self.runs.read().await.get(run_id).cloned())
    }
}

/// Writes run events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, event: &RunEvent) -> anyhow::Result<()> {
        info!(
            run_id = %sanitize_for_log(&event.run_id),
            state = event.state.as_str(),
            score = event.health_score,
            status = event.health_status.map(|s| s.as_str()),
            "Validation run finished"
        );
        Ok(())
    }
}

/// The same auth for every run, typically from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    pub method: String,
    pub settings: BTreeMap<String, String>,
}

impl StaticAuth {
    pub fn new(method: impl Into<String>, settings: BTreeMap<String, String>) -> Self {
        Self {
            method: method.into(),
            settings,
        }
    }
}

#[async_trait]
impl AuthSource for StaticAuth {
    async fn auth_for(&self, _run_id: &str) -> anyhow::Result<(String, BTreeMap<String, String>)> {
        Ok((self.method.clone(), self.settings.clone()))
    }
}
