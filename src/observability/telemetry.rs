//! Telemetry
//!
//! Structured logging setup and the pipeline stage span helpers.
//! - Filter from `RUST_LOG`, quiet by default
//! - Compact or JSON lines on stderr
//! - Stage spans carrying `stage`, `run_id`, duration and outcome
//! - Log-safe rendering of untrusted strings

use crate::analysis::{detect_sensitive, DataLocation};
use crate::errors::PipelineStage;
use std::future::Future;
use std::sync::Once;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

/// Initialize the global subscriber from `RUST_LOG`, falling back to warnings only.
pub fn init_tracing(json: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    init_tracing_with_filter(&filter, json);
}

/// Initialize with an explicit filter string. Later calls are no-ops.
pub fn init_tracing_with_filter(filter: &str, json: bool) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter_layer =
            EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let registry = tracing_subscriber::registry().with(filter_layer);
        let result = if json {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_level(true)
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .try_init()
        };
        let _ = result;
    });
}

/// Escape control characters so untrusted text cannot forge log lines.
pub fn sanitize_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1b' => out.push_str("\\e"),
            '\x00' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

/// Sanitize, then replace anything the sensitive-data rules match with its placeholder.
pub fn redact_for_log(s: &str) -> String {
    let mut out = sanitize_for_log(s);
    let mut matches = detect_sensitive(&out, DataLocation::Unknown);
    // longest first so an overlapping shorter match cannot split a longer one
    matches.sort_by(|a, b| b.value.len().cmp(&a.value.len()));
    for m in matches {
        out = out.replace(&m.value, &m.placeholder);
    }
    out
}

/// Span for one pipeline stage.
pub fn stage_span(stage: PipelineStage, run_id: &str) -> tracing::Span {
    info_span!(
        "pipeline.stage",
        stage = stage.as_str(),
        run_id = %sanitize_for_log(run_id),
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
        error = tracing::field::Empty,
    )
}

/// Run one stage inside its span, recording duration and outcome.
pub async fn track_stage<F, Fut, T, E>(stage: PipelineStage, run_id: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let span = stage_span(stage, run_id);
    let start = Instant::now();

    let outcome = f().instrument(span.clone()).await;
    let duration = start.elapsed().as_millis() as u64;
    span.record("duration_ms", duration);

    let _enter = span.enter();
    match &outcome {
        Ok(_) => {
            span.record("success", true);
            info!(duration_ms = duration, "Stage completed");
        }
        Err(e) => {
            let safe_err = redact_for_log(&e.to_string());
            span.record("success", false);
            span.record("error", safe_err.as_str());
            error!(duration_ms = duration, error = safe_err.as_str(), "Stage failed");
        }
    }
    outcome
}

#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
