//! Sensitive data detection

use crate::traffic::ApiInteraction;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveDataType {
    ApiKey,
    BearerToken,
    Jwt,
    CreditCard,
    Ssn,
    SessionId,
}

impl SensitiveDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitiveDataType::ApiKey => "api_key",
            SensitiveDataType::BearerToken => "bearer_token",
            SensitiveDataType::Jwt => "jwt",
            SensitiveDataType::CreditCard => "credit_card",
            SensitiveDataType::Ssn => "ssn",
            SensitiveDataType::SessionId => "session_id",
        }
    }
}

/// Where in an interaction a value was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLocation {
    RequestHeader,
    QueryParam,
    RequestBody,
    ResponseHeader,
    ResponseBody,
    Url,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveMatch {
    pub data_type: SensitiveDataType,
    pub location: DataLocation,
    pub field_name: Option<String>,
    pub value: String,
    pub confidence: f64,
    pub placeholder: String,
}

struct SensitiveRule {
    data_type: SensitiveDataType,
    regex: Regex,
    confidence: f64,
    placeholder: &'static str,
}

static SENSITIVE_RULES: OnceLock<Vec<SensitiveRule>> = OnceLock::new();

fn rules() -> &'static Vec<SensitiveRule> {
    SENSITIVE_RULES.get_or_init(|| {
        vec![
            SensitiveRule {
                data_type: SensitiveDataType::ApiKey,
                regex: Regex::new(r#"(?i)api[_-]?key["']?\s*[=:]\s*["']?[A-Za-z0-9_\-]{16,}"#).expect("invalid api key regex"),
                confidence: 0.9,
                placeholder: "[REDACTED_API_KEY]",
            },
            SensitiveRule {
                data_type: SensitiveDataType::BearerToken,
                regex: Regex::new(r"(?i)bearer\s+[A-Za-z0-9_\-\.~+/]{16,}=*").expect("invalid bearer regex"),
                confidence: 0.95,
                placeholder: "[REDACTED_BEARER_TOKEN]",
            },
            SensitiveRule {
                data_type: SensitiveDataType::Jwt,
                regex: Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").expect("invalid jwt regex"),
                confidence: 0.9,
                placeholder: "[REDACTED_JWT]",
            },
            SensitiveRule {
                data_type: SensitiveDataType::CreditCard,
                regex: Regex::new(r"\b(?:\d{4}[\s-]?){3}\d{4}\b").expect("invalid card regex"),
                confidence: 0.8,
                placeholder: "[REDACTED_CARD]",
            },
            SensitiveRule {
                data_type: SensitiveDataType::Ssn,
                regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("invalid ssn regex"),
                confidence: 0.85,
                placeholder: "[REDACTED_SSN]",
            },
            SensitiveRule {
                data_type: SensitiveDataType::SessionId,
                regex: Regex::new(r#"(?i)session[_-]?id["']?\s*[=:]\s*["']?[A-Za-z0-9_\-]{8,}"#).expect("invalid session regex"),
                confidence: 0.8,
                placeholder: "[REDACTED_SESSION]",
            },
        ]
    })
}

/// Apply the sensitive-data rule set to `text`.
pub fn detect_sensitive(text: &str, location: DataLocation) -> Vec<SensitiveMatch> {
    let mut found = Vec::new();
    for rule in rules() {
        for m in rule.regex.find_iter(text) {
            found.push(SensitiveMatch {
                data_type: rule.data_type,
                location,
                field_name: None,
                value: m.as_str().to_string(),
                confidence: rule.confidence,
                placeholder: rule.placeholder.to_string(),
            });
        }
    }
    found
}

/// Severity for a sensitive data (or pattern) type tag.
pub fn severity(data_type: &str) -> &'static str {
    match data_type {
        "credit_card" | "ssn" => "critical",
        "api_key" | "bearer_token" | "jwt" | "session_id" => "high",
        "email" | "phone" => "medium",
        "ipv4" | "uuid" => "low",
        _ => "low",
    }
}

/// Remediation advice for a sensitive data (or pattern) type tag.
pub fn recommendation(data_type: &str) -> &'static str {
    match data_type {
        "credit_card" => "remove card numbers from captured traffic; use test card numbers",
        "ssn" => "remove national identifiers from captured traffic",
        "api_key" => "rotate the key and strip it from recordings",
        "bearer_token" | "jwt" => "expire the token and redact authorization headers before sharing",
        "session_id" => "invalidate the session and redact cookies before sharing",
        "email" | "phone" => "replace personal contact data with synthetic values",
        _ => "review and sanitize",
    }
}

/// A sensitive match attributed to a concrete interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveFinding {
    pub interaction_id: String,
    pub endpoint: String,
    #[serde(rename = "match")]
    pub matched: SensitiveMatch,
    pub severity: String,
    pub recommendation: String,
}

/// Scan every part of every interaction for sensitive data.
///
/// Findings are de-duplicated by `(type, location, value)`; the first
/// interaction carrying a value is the one reported.
pub fn analyze_interactions(interactions: &[ApiInteraction]) -> Vec<SensitiveFinding> {
    let mut seen = BTreeSet::new();
    let mut findings = Vec::new();

    for interaction in interactions {
        let mut matches = Vec::new();
        for (name, value) in &interaction.request.headers {
            matches.extend(with_field(
                detect_sensitive(&format!("{}: {}", name, value), DataLocation::RequestHeader),
                name,
            ));
        }
        for (name, value) in &interaction.request.query_params {
            matches.extend(with_field(
                detect_sensitive(&format!("{}={}", name, value), DataLocation::QueryParam),
                name,
            ));
        }
        if let Some(body) = &interaction.request.body {
            matches.extend(detect_sensitive(body, DataLocation::RequestBody));
        }
        for (name, value) in &interaction.response.headers {
            matches.extend(with_field(
                detect_sensitive(&format!("{}: {}", name, value), DataLocation::ResponseHeader),
                name,
            ));
        }
        if let Some(body) = &interaction.response.body {
            matches.extend(detect_sensitive(body, DataLocation::ResponseBody));
        }

        for m in matches {
            let key = (m.data_type, m.location, m.value.clone());
            if !seen.insert(key) {
                continue;
            }
            let tag = m.data_type.as_str();
            findings.push(SensitiveFinding {
                interaction_id: interaction.id.clone(),
                endpoint: format!("{} {}", interaction.request.method, interaction.request.path),
                severity: severity(tag).to_string(),
                recommendation: recommendation(tag).to_string(),
                matched: m,
            });
        }
    }
    findings
}

fn with_field(matches: Vec<SensitiveMatch>, field: &str) -> Vec<SensitiveMatch> {
    matches
        .into_iter()
        .map(|mut m| {
            m.field_name = Some(field.to_string());
            m
        })
        .collect()
}
