//! Contract Test Runner
//!
//! Exercises a live provider against the operations a contract declares and
//! classifies every call. Calls run on a bounded worker pool; a call that
//! times out or cannot connect is a failed call, never a crashed run.

use crate::errors::TestExecutionError;
use crate::openapi::{DeclaredOperation, OpenApiDocument, ParameterLocation};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

pub mod auth;

pub use auth::{prepare_auth, AuthMethod, PreparedAuth};

/// Methods the runner will call
pub const TESTABLE_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 5000;
const FALLBACK_PATH_VALUE: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerOptions {
    /// Upper bound on calls made in one run
    pub max_examples: usize,
    /// Per-call timeout
    pub timeout: Duration,
    /// Calls slower than this pass with an issue
    pub slow_threshold: Duration,
    /// Worker pool size, capped by `max_examples`
    pub concurrency: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_examples: 50,
            timeout: Duration::from_secs(30),
            slow_threshold: Duration::from_millis(DEFAULT_SLOW_THRESHOLD_MS),
            concurrency: 8,
        }
    }
}

/// Outcome of a single provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub method: String,
    /// Declared path template
    pub path: String,
    /// Concrete URL that was called
    pub url: String,
    pub status: Option<u16>,
    pub passed: bool,
    pub duration_ms: u64,
    pub issues: Vec<String>,
    pub error: Option<String>,
}

/// Aggregated result of one test run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRunResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<CallOutcome>,
    pub errors: Vec<String>,
    /// Wall-clock seconds
    pub execution_time: f64,
    /// Percentage in `[0, 100]`
    pub success_rate: f64,
}

impl TestRunResult {
    pub fn from_outcomes(mut results: Vec<CallOutcome>, execution_time: f64) -> Self {
        results.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let errors = results.iter().filter_map(|r| r.error.clone()).collect();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
            errors,
            execution_time,
            success_rate: success_rate(passed, total),
        }
    }

    /// Whether any call for `method` + `path` failed
    pub fn has_failure_for(&self, method: &str, path: &str) -> bool {
        self.results
            .iter()
            .any(|r| !r.passed && r.path == path && r.method.eq_ignore_ascii_case(method))
    }
}

pub fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

/// Pre-flight reachability probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub reachable: bool,
    pub status_code: Option<u16>,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

/// A single planned call
#[derive(Debug, Clone)]
struct PlannedCall {
    method: String,
    path: String,
    url: String,
    body: Option<(String, Value)>,
    declared: Vec<u16>,
}

pub struct ContractTestRunner {
    client: Client,
    options: RunnerOptions,
    cancelled: Arc<AtomicBool>,
}

impl ContractTestRunner {
    pub fn new(options: RunnerOptions) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .build()?;
        Ok(Self {
            client,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Shared flag; once set, no further provider calls are issued.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn with_cancellation_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Call every declared `(path, method)` pair once, up to `max_examples`.
    pub async fn run(
        &self,
        contract: &OpenApiDocument,
        provider_url: &str,
        auth: &PreparedAuth,
    ) -> TestRunResult {
        let started = Instant::now();
        let plan: Vec<PlannedCall> = contract
            .operations()
            .iter()
            .filter(|op| TESTABLE_METHODS.contains(&op.method.as_str()))
            .take(self.options.max_examples)
            .map(|op| plan_call(op, provider_url, auth))
            .collect();

        info!(calls = plan.len(), provider = provider_url, "Starting contract test run");

        let permits = self
            .options
            .concurrency
            .clamp(1, self.options.max_examples.max(1));
        let semaphore = Arc::new(Semaphore::new(permits));
        let collected: Arc<Mutex<Vec<CallOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for call in plan {
            let semaphore = Arc::clone(&semaphore);
            let collected = Arc::clone(&collected);
            let cancelled = Arc::clone(&self.cancelled);
            let client = self.client.clone();
            let auth = auth.clone();
            let options = self.options.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                if cancelled.load(Ordering::SeqCst) {
                    debug!(method = call.method.as_str(), path = call.path.as_str(), "Skipping call after cancellation");
                    return;
                }
                let outcome = execute_call(&client, &call, &auth, &options).await;
                collected.lock().await.push(outcome);
            }));
        }

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                warn!(error = %e, "Test worker panicked");
            }
        }

        let outcomes = std::mem::take(&mut *collected.lock().await);
        let result = TestRunResult::from_outcomes(outcomes, started.elapsed().as_secs_f64());
        info!(
            total = result.total,
            passed = result.passed,
            failed = result.failed,
            success_rate = result.success_rate,
            "Contract test run finished"
        );
        result
    }
}

/// Build the concrete request for a declared operation.
///
/// Path parameters come from their `example` (fallback `1`), required query
/// parameters with an example are appended, and POST/PUT/PATCH carry the
/// request-body example.
fn plan_call(op: &DeclaredOperation<'_>, provider_url: &str, auth: &PreparedAuth) -> PlannedCall {
    let mut path = op.path.to_string();
    for param in op.operation.path_parameters() {
        let value = param
            .example
            .as_ref()
            .map(scalar_text)
            .unwrap_or_else(|| FALLBACK_PATH_VALUE.to_string());
        path = path.replace(&format!("{{{}}}", param.name), &value);
    }

    let mut query: Vec<(String, String)> = op
        .operation
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Query && p.required)
        .filter_map(|p| p.example.as_ref().map(|ex| (p.name.clone(), scalar_text(ex))))
        .collect();
    query.extend(auth.query_params.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut url = format!("{}{}", provider_url.trim_end_matches('/'), path);
    if !query.is_empty() {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query.iter())
            .finish();
        url.push('?');
        url.push_str(&encoded);
    }

    let body = match op.method.as_str() {
        "POST" | "PUT" | "PATCH" => op
            .operation
            .request_example()
            .map(|(ct, example)| (ct.to_string(), example.clone())),
        _ => None,
    };

    PlannedCall {
        method: op.method.clone(),
        path: op.path.to_string(),
        url,
        body,
        declared: op.operation.declared_statuses(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn execute_call(
    client: &Client,
    call: &PlannedCall,
    auth: &PreparedAuth,
    options: &RunnerOptions,
) -> CallOutcome {
    let method = Method::from_bytes(call.method.as_bytes()).unwrap_or(Method::GET);
    let mut request = client.request(method, &call.url);
    for (name, value) in &auth.headers {
        request = request.header(name, value);
    }
    if let Some((content_type, example)) = &call.body {
        let payload = match example {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        request = request.header("Content-Type", content_type).body(payload);
    }

    let started = Instant::now();
    let sent = tokio::time::timeout(options.timeout, request.send()).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let failure = match sent {
        Ok(Ok(response)) => {
            let status = response.status().as_u16();
            return classify(call, status, duration_ms, options);
        }
        Ok(Err(e)) if e.is_timeout() => TestExecutionError::Timeout {
            method: call.method.clone(),
            url: call.url.clone(),
            timeout_ms: options.timeout.as_millis() as u64,
        },
        Ok(Err(e)) => TestExecutionError::Transport {
            method: call.method.clone(),
            url: call.url.clone(),
            message: e.to_string(),
        },
        Err(_) => TestExecutionError::Timeout {
            method: call.method.clone(),
            url: call.url.clone(),
            timeout_ms: options.timeout.as_millis() as u64,
        },
    };

    warn!(method = call.method.as_str(), path = call.path.as_str(), error = %failure, "Provider call failed");
    CallOutcome {
        method: call.method.clone(),
        path: call.path.clone(),
        url: call.url.clone(),
        status: None,
        passed: false,
        duration_ms,
        issues: Vec::new(),
        error: Some(failure.to_string()),
    }
}

fn classify(call: &PlannedCall, status: u16, duration_ms: u64, options: &RunnerOptions) -> CallOutcome {
    let mut issues = Vec::new();
    let threshold_ms = options.slow_threshold.as_millis() as u64;
    if duration_ms > threshold_ms {
        issues.push(format!(
            "slow response: {}ms exceeds {}ms",
            duration_ms, threshold_ms
        ));
    }
    if !call.declared.is_empty() && !call.declared.contains(&status) {
        issues.push(format!("undeclared status code {}", status));
    }
    let passed = status < 500;
    if !passed {
        issues.push(format!("server error {}", status));
    }

    debug!(
        method = call.method.as_str(),
        path = call.path.as_str(),
        status,
        duration_ms,
        passed,
        "Provider call classified"
    );
    CallOutcome {
        method: call.method.clone(),
        path: call.path.clone(),
        url: call.url.clone(),
        status: Some(status),
        passed,
        duration_ms,
        issues,
        error: None,
    }
}

/// Probe `url` once. Never fails; problems are reported in the result.
pub async fn connectivity_check(url: &str, timeout: Duration) -> ConnectivityReport {
    let client = match Client::builder().timeout(timeout).connect_timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            return ConnectivityReport {
                reachable: false,
                status_code: None,
                elapsed_ms: None,
                error: Some(e.to_string()),
            }
        }
    };

    let started = Instant::now();
    match tokio::time::timeout(timeout, client.get(url).send()).await {
        Ok(Ok(response)) => ConnectivityReport {
            reachable: true,
            status_code: Some(response.status().as_u16()),
            elapsed_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Ok(Err(e)) => ConnectivityReport {
            reachable: false,
            status_code: None,
            elapsed_ms: None,
            error: Some(e.to_string()),
        },
        Err(_) => ConnectivityReport {
            reachable: false,
            status_code: None,
            elapsed_ms: None,
            error: Some(format!("timed out after {}ms", timeout.as_millis())),
        },
    }
}
