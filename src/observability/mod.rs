//! Observability
//!
//! Tracing subscriber setup, pipeline stage spans and log redaction.

pub mod telemetry;

pub use telemetry::{init_tracing, redact_for_log, sanitize_for_log, track_stage};
