//! Mock Alignment
//!
//! Compares the operations a contract declares against the stubs deployed on
//! the mock server. Both sides are reduced to a `METHOD:pattern` key where
//! every parameter segment is `([^/]+)`.
//!
//! A "schema mismatch" here only means the provider test for an aligned
//! endpoint failed. It is a presence-plus-health proxy and does not diff
//! response schemas.

use crate::openapi::OpenApiDocument;
use crate::runner::TestRunResult;
use crate::stubs::MockStub;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const PARAM_PATTERN: &str = "([^/]+)";
const NO_MOCKS_NOTE: &str = "no mock stubs are deployed; alignment could not be assessed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub total_endpoints: usize,
    pub aligned_endpoints: usize,
    pub schema_mismatches: usize,
    /// Fraction in `[0, 1]`
    pub alignment_rate: f64,
    pub details: String,
    /// Declared endpoints with no matching stub, as `METHOD path`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Canonical form of a contract path template: `{param}` -> `([^/]+)`.
pub fn canonical_contract_path(template: &str) -> String {
    template
        .split('/')
        .map(|segment| {
            if segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}') {
                PARAM_PATTERN.to_string()
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical form of a stub URL matcher.
///
/// Anchors are dropped, a trailing query portion is ignored, and any segment
/// that carries regex syntax counts as one parameter.
pub fn canonical_stub_path(matcher: &str, is_pattern: bool) -> String {
    let trimmed = matcher.trim_start_matches('^').trim_end_matches('$');
    let path = if is_pattern {
        trimmed
    } else {
        trimmed.split('?').next().unwrap_or(trimmed)
    };
    if !is_pattern {
        return path.to_string();
    }

    split_pattern(path)
        .into_iter()
        .map(|segment| {
            if segment.chars().any(|c| "\\[](){}*+?|^$.".contains(c)) && !is_escaped_literal(segment) {
                PARAM_PATTERN.to_string()
            } else {
                segment.replace('\\', "")
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a regex on `/` outside of groups and character classes.
fn split_pattern(pattern: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                segments.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&pattern[start..]);
    segments
}

/// A segment like `v1\.0` is a literal with escaped dots, not a parameter.
fn is_escaped_literal(segment: &str) -> bool {
    let unescaped = segment.replace("\\.", "").replace("\\-", "");
    !unescaped.chars().any(|c| "\\[](){}*+?|^$.".contains(c))
}

fn key(method: &str, canonical_path: &str) -> String {
    format!("{}:{}", method.to_ascii_uppercase(), canonical_path)
}

/// Compare declared operations with deployed stubs.
///
/// `test_result`, when given, turns failed provider calls on aligned
/// endpoints into schema mismatches.
pub fn compare(
    contract: &OpenApiDocument,
    deployed: &[MockStub],
    test_result: Option<&TestRunResult>,
) -> AlignmentReport {
    if deployed.is_empty() {
        return AlignmentReport {
            details: NO_MOCKS_NOTE.to_string(),
            ..Default::default()
        };
    }

    let index: HashSet<String> = deployed
        .iter()
        .filter_map(|stub| {
            let matcher = stub.url_matcher()?;
            Some(key(
                &stub.request.method,
                &canonical_stub_path(matcher, stub.request.is_pattern()),
            ))
        })
        .collect();

    let mut report = AlignmentReport::default();
    for declared in contract.operations() {
        report.total_endpoints += 1;
        let lookup = key(&declared.method, &canonical_contract_path(declared.path));
        if index.contains(&lookup) {
            report.aligned_endpoints += 1;
            if test_result.is_some_and(|r| r.has_failure_for(&declared.method, declared.path)) {
                report.schema_mismatches += 1;
            }
        } else {
            report.missing.push(format!("{} {}", declared.method, declared.path));
        }
    }

    report.alignment_rate = if report.total_endpoints == 0 {
        0.0
    } else {
        report.aligned_endpoints as f64 / report.total_endpoints as f64
    };
    report.details = format!(
        "{}/{} declared endpoints have a deployed stub; {} aligned endpoint(s) failed provider tests",
        report.aligned_endpoints, report.total_endpoints, report.schema_mismatches
    );
    report
}
