//! Health Analyzer
//!
//! Folds a provider test run and an alignment report into one score in
//! `[0, 1]`, a three-level status and a list of recommendations.

use crate::alignment::AlignmentReport;
use crate::runner::TestRunResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HEALTHY_THRESHOLD: f64 = 0.8;
pub const DEGRADED_THRESHOLD: f64 = 0.5;

const PRODUCER_WEIGHT: f64 = 0.7;
const ALIGNMENT_WEIGHT: f64 = 0.3;
const SLOW_RUN_SECS: f64 = 30.0;

pub const REC_IMMEDIATE_ATTENTION: &str =
    "Contract is broken: immediate attention required before relying on mocks or provider";
pub const REC_HIGH_FAILURE_RATE: &str =
    "High failure rate against the provider: investigate failing endpoints";
pub const REC_MULTIPLE_ERRORS: &str =
    "Multiple errors during the test run: check provider availability and authentication";
pub const REC_SLOW_RESPONSES: &str =
    "Slow responses: the test run took over a minute, review provider performance";
pub const REC_UPDATE_MOCKS: &str =
    "Schema mismatches found: update mocks or spec to match provider behaviour";
pub const REC_POOR_ALIGNMENT: &str =
    "Poor mock alignment: regenerate stubs so every declared endpoint is mocked";
pub const REC_CONTINUE_MONITORING: &str = "Contract is healthy: continue monitoring";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Broken,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= HEALTHY_THRESHOLD {
            HealthStatus::Healthy
        } else if score >= DEGRADED_THRESHOLD {
            HealthStatus::Degraded
        } else {
            HealthStatus::Broken
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Broken => "broken",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub score: f64,
    pub status: HealthStatus,
    pub producer_score: f64,
    pub alignment_score: f64,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Pass rate minus error and slowness penalties, floored at zero.
pub fn producer_score(run: &TestRunResult) -> f64 {
    let pass_rate = if run.total == 0 {
        0.0
    } else {
        run.passed as f64 / run.total as f64
    };
    let error_penalty = (run.errors.len() as f64 * 0.1).min(0.5);
    let time_penalty = if run.execution_time > SLOW_RUN_SECS {
        ((run.execution_time - SLOW_RUN_SECS) / 60.0 * 0.2).min(0.3)
    } else {
        0.0
    };
    (pass_rate - error_penalty - time_penalty).max(0.0)
}

/// Neutral 0.5 when nothing was declared.
pub fn alignment_score(alignment: &AlignmentReport) -> f64 {
    if alignment.total_endpoints == 0 {
        return 0.5;
    }
    let mismatch_penalty = (alignment.schema_mismatches as f64 * 0.1).min(0.4);
    (alignment.alignment_rate - mismatch_penalty).max(0.0)
}

pub fn health_score(run: &TestRunResult, alignment: &AlignmentReport) -> f64 {
    let raw = PRODUCER_WEIGHT * producer_score(run) + ALIGNMENT_WEIGHT * alignment_score(alignment);
    round3(raw.clamp(0.0, 1.0))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Every applicable trigger fires, in a fixed order.
pub fn recommendations(
    status: HealthStatus,
    run: &TestRunResult,
    alignment: &AlignmentReport,
) -> Vec<String> {
    let mut recs = Vec::new();
    if status == HealthStatus::Broken {
        recs.push(REC_IMMEDIATE_ATTENTION);
    }
    if run.total > 0 && run.failed as f64 / run.total as f64 > 0.3 {
        recs.push(REC_HIGH_FAILURE_RATE);
    }
    if run.errors.len() > 5 {
        recs.push(REC_MULTIPLE_ERRORS);
    }
    if run.execution_time > 60.0 {
        recs.push(REC_SLOW_RESPONSES);
    }
    if alignment.schema_mismatches > 0 {
        recs.push(REC_UPDATE_MOCKS);
    }
    if alignment.alignment_rate < HEALTHY_THRESHOLD {
        recs.push(REC_POOR_ALIGNMENT);
    }
    if recs.is_empty() && status == HealthStatus::Healthy {
        recs.push(REC_CONTINUE_MONITORING);
    }
    recs.into_iter().map(String::from).collect()
}

pub fn assess(run: &TestRunResult, alignment: &AlignmentReport) -> HealthAssessment {
    let score = health_score(run, alignment);
    let status = HealthStatus::from_score(score);
    HealthAssessment {
        score,
        status,
        producer_score: round3(producer_score(run)),
        alignment_score: round3(alignment_score(alignment)),
        recommendations: recommendations(status, run, alignment),
        timestamp: Utc::now(),
    }
}
