use super::helpers::{sample_interactions, users_contract};
use contractwatch::alignment::{compare, AlignmentReport};
use contractwatch::health::{
    alignment_score, assess, health_score, HealthStatus, REC_CONTINUE_MONITORING,
    REC_HIGH_FAILURE_RATE, REC_IMMEDIATE_ATTENTION, REC_POOR_ALIGNMENT, REC_SLOW_RESPONSES,
    REC_UPDATE_MOCKS,
};
use contractwatch::openapi::synthesize;
use contractwatch::runner::TestRunResult;
use contractwatch::stubs::{synthesize_stubs, MockStub, RequestPattern, ResponseDefinition, StubOptions};
use contractwatch::traffic::group_by_endpoint;
use std::collections::BTreeMap;

fn run(total: usize, passed: usize, errors: usize, secs: f64) -> TestRunResult {
    TestRunResult {
        total,
        passed,
        failed: total - passed,
        results: Vec::new(),
        errors: (0..errors).map(|i| format!("error {}", i)).collect(),
        execution_time: secs,
        success_rate: if total == 0 { 0.0 } else { passed as f64 / total as f64 * 100.0 },
    }
}

fn alignment(total: usize, aligned: usize, mismatches: usize, rate: f64) -> AlignmentReport {
    AlignmentReport {
        total_endpoints: total,
        aligned_endpoints: aligned,
        schema_mismatches: mismatches,
        alignment_rate: rate,
        details: String::new(),
        missing: Vec::new(),
    }
}

fn pattern_stub(method: &str, pattern: &str) -> MockStub {
    MockStub {
        id: None,
        request: RequestPattern {
            method: method.to_string(),
            url_pattern: Some(pattern.to_string()),
            ..Default::default()
        },
        response: ResponseDefinition::new(200),
        scenario: None,
        metadata: BTreeMap::new(),
    }
}

#[test]
fn test_clean_run_is_healthy() {
    let verdict = assess(&run(10, 10, 0, 15.0), &alignment(5, 5, 0, 1.0));
    assert!(verdict.score >= 0.8);
    assert_eq!(verdict.status, HealthStatus::Healthy);
    assert_eq!(verdict.recommendations, vec![REC_CONTINUE_MONITORING.to_string()]);
}

#[test]
fn test_bad_run_is_broken() {
    let verdict = assess(&run(10, 2, 4, 120.0), &alignment(5, 1, 4, 0.2));
    assert_eq!(verdict.status, HealthStatus::Broken);
    assert_eq!(verdict.score, 0.0);
    assert_eq!(
        verdict.recommendations,
        vec![
            REC_IMMEDIATE_ATTENTION.to_string(),
            REC_HIGH_FAILURE_RATE.to_string(),
            REC_SLOW_RESPONSES.to_string(),
            REC_UPDATE_MOCKS.to_string(),
            REC_POOR_ALIGNMENT.to_string(),
        ]
    );
}

#[test]
fn test_degraded_band() {
    // 0.7 * 0.6 + 0.3 * 1.0
    let verdict = assess(&run(10, 6, 0, 1.0), &alignment(4, 4, 0, 1.0));
    assert_eq!(verdict.score, 0.72);
    assert_eq!(verdict.status, HealthStatus::Degraded);
    assert_eq!(verdict.recommendations, vec![REC_HIGH_FAILURE_RATE.to_string()]);
}

#[test]
fn test_nothing_declared_is_neutral() {
    let empty = alignment(0, 0, 0, 0.0);
    assert_eq!(alignment_score(&empty), 0.5);
    assert_eq!(health_score(&run(4, 4, 0, 1.0), &empty), 0.85);
}

#[test]
fn test_parameter_path_aligns_with_pattern_stub() {
    let mut doc = users_contract("http://p");
    doc.paths.retain(|path, _| path == "/users/{id}");

    let report = compare(&doc, &[pattern_stub("GET", "/users/([^/]+)")], None);
    assert_eq!(report.total_endpoints, 1);
    assert_eq!(report.aligned_endpoints, 1);
    assert_eq!(report.alignment_rate, 1.0);
    assert!(report.missing.is_empty());
}

#[test]
fn test_method_must_match() {
    let mut doc = users_contract("http://p");
    doc.paths.retain(|path, _| path == "/users/{id}");

    let report = compare(&doc, &[pattern_stub("DELETE", "/users/([^/]+)")], None);
    assert_eq!(report.aligned_endpoints, 0);
    assert_eq!(report.missing, vec!["GET /users/{id}".to_string()]);
}

#[test]
fn test_failed_calls_count_as_mismatches() {
    let doc = users_contract("http://p");
    let stubs = vec![
        pattern_stub("GET", "/users/([^/]+)"),
        pattern_stub("GET", "/health"),
        pattern_stub("POST", "/users"),
    ];
    let mut result = run(3, 2, 0, 1.0);
    result.results.push(contractwatch::runner::CallOutcome {
        method: "GET".to_string(),
        path: "/health".to_string(),
        url: "http://p/health".to_string(),
        status: Some(503),
        passed: false,
        duration_ms: 3,
        issues: vec!["server error 503".to_string()],
        error: None,
    });

    let report = compare(&doc, &stubs, Some(&result));
    assert_eq!(report.aligned_endpoints, 3);
    assert_eq!(report.schema_mismatches, 1);
}

#[test]
fn test_no_deployed_stubs() {
    let report = compare(&users_contract("http://p"), &[], None);
    assert_eq!(report.total_endpoints, 0);
    assert!(report.details.contains("no mock stubs"));
}

#[test]
fn test_recorded_traffic_stubs_align_with_recorded_contract() {
    let groups = group_by_endpoint(&sample_interactions());
    let contract = synthesize(&groups, "t", "1", None).unwrap();
    let stubs = synthesize_stubs(&groups, &StubOptions::default());

    let report = compare(&contract, &stubs, None);
    assert_eq!(report.total_endpoints, 4);
    assert_eq!(report.aligned_endpoints, 4);
    assert_eq!(report.alignment_rate, 1.0);
}
