//! Value pattern detection

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Recognised value pattern kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Email,
    Uuid,
    Phone,
    CreditCard,
    Ssn,
    Ipv4,
    Url,
    NumericId,
    IsoDatetime,
    Date,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Email => "email",
            PatternType::Uuid => "uuid",
            PatternType::Phone => "phone",
            PatternType::CreditCard => "credit_card",
            PatternType::Ssn => "ssn",
            PatternType::Ipv4 => "ipv4",
            PatternType::Url => "url",
            PatternType::NumericId => "numeric_id",
            PatternType::IsoDatetime => "iso_datetime",
            PatternType::Date => "date",
        }
    }
}

/// A pattern occurrence inside a string value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub value: String,
    pub placeholder: String,
    pub description: String,
}

struct PatternRule {
    pattern_type: PatternType,
    regex: Regex,
    placeholder: &'static str,
    description: &'static str,
}

static PATTERN_RULES: OnceLock<Vec<PatternRule>> = OnceLock::new();

fn rules() -> &'static Vec<PatternRule> {
    PATTERN_RULES.get_or_init(|| {
        vec![
            PatternRule {
                pattern_type: PatternType::Email,
                regex: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("invalid email regex"),
                placeholder: "{email}",
                description: "Email address",
            },
            PatternRule {
                pattern_type: PatternType::Uuid,
                regex: Regex::new(r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b").expect("invalid uuid regex"),
                placeholder: "{uuid}",
                description: "UUID",
            },
            PatternRule {
                pattern_type: PatternType::Phone,
                regex: Regex::new(r"(?:\+\d{1,3}[\s.-]?)?\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b").expect("invalid phone regex"),
                placeholder: "{phone}",
                description: "Phone number",
            },
            PatternRule {
                pattern_type: PatternType::CreditCard,
                regex: Regex::new(r"\b(?:\d{4}[\s-]?){3}\d{4}\b").expect("invalid card regex"),
                placeholder: "{credit_card}",
                description: "Credit card number",
            },
            PatternRule {
                pattern_type: PatternType::Ssn,
                regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("invalid ssn regex"),
                placeholder: "{ssn}",
                description: "Social security number",
            },
            PatternRule {
                pattern_type: PatternType::Ipv4,
                regex: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("invalid ipv4 regex"),
                placeholder: "{ip_address}",
                description: "IPv4 address",
            },
            PatternRule {
                pattern_type: PatternType::Url,
                regex: Regex::new(r#"https?://[^\s"'<>]+"#).expect("invalid url regex"),
                placeholder: "{url}",
                description: "URL",
            },
            PatternRule {
                pattern_type: PatternType::NumericId,
                regex: Regex::new(r"\b\d{6,}\b").expect("invalid numeric id regex"),
                placeholder: "{id}",
                description: "Numeric identifier",
            },
            PatternRule {
                pattern_type: PatternType::IsoDatetime,
                regex: Regex::new(r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})?").expect("invalid datetime regex"),
                placeholder: "{datetime}",
                description: "ISO 8601 timestamp",
            },
            PatternRule {
                pattern_type: PatternType::Date,
                regex: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("invalid date regex"),
                placeholder: "{date}",
                description: "Calendar date",
            },
        ]
    })
}

const PUBLIC_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "icloud.com",
    "aol.com",
    "protonmail.com",
];

fn confidence_for(pattern_type: PatternType, value: &str) -> f64 {
    match pattern_type {
        PatternType::Uuid => 0.95,
        PatternType::NumericId => 0.6,
        PatternType::Email => {
            let domain = value.rsplit('@').next().unwrap_or("").to_ascii_lowercase();
            if PUBLIC_EMAIL_DOMAINS.contains(&domain.as_str()) {
                0.9
            } else {
                DEFAULT_CONFIDENCE
            }
        }
        PatternType::IsoDatetime => {
            let parsed = DateTime::parse_from_rfc3339(value).is_ok()
                || chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok();
            if parsed {
                0.9
            } else {
                0.5
            }
        }
        PatternType::Date => {
            if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
                0.9
            } else {
                0.5
            }
        }
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Apply every pattern rule to `text`. A string may match several rules;
/// all occurrences of all rules are reported, in rule order.
pub fn detect_patterns(text: &str) -> Vec<DetectedPattern> {
    let mut found = Vec::new();
    for rule in rules() {
        for m in rule.regex.find_iter(text) {
            let value = m.as_str().to_string();
            found.push(DetectedPattern {
                pattern_type: rule.pattern_type,
                confidence: confidence_for(rule.pattern_type, &value),
                placeholder: rule.placeholder.to_string(),
                description: rule.description.to_string(),
                value,
            });
        }
    }
    found
}

/// A pattern found at a dotted JSON field path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub field_path: String,
    pub pattern: DetectedPattern,
}

/// Walk a JSON value and report patterns found in string leaves.
pub fn detect_patterns_in_value(value: &serde_json::Value) -> Vec<FieldPattern> {
    let mut found = Vec::new();
    walk(value, String::new(), &mut found);
    found
}

fn walk(value: &serde_json::Value, path: String, out: &mut Vec<FieldPattern>) {
    match value {
        serde_json::Value::String(s) => {
            for pattern in detect_patterns(s) {
                out.push(FieldPattern {
                    field_path: path.clone(),
                    pattern,
                });
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, format!("{}[{}]", path, i), out);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                walk(item, child, out);
            }
        }
        _ => {}
    }
}
