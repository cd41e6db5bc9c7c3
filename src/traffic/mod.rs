//! Traffic Ingestion
//!
//! Turns a recorded HTTP traffic log (HAR-shaped JSON) into classified API
//! interactions and buckets them into endpoint groups:
//! - Structural validation before any extraction
//! - Static-asset rejection and API heuristics
//! - Deterministic, idempotent path normalization
//! - Filtering and summary statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod grouping;
pub mod parser;

pub use grouping::{
    filter, group_by_endpoint, normalize_base_path, summary_stats, EndpointGroup,
    FilterCriteria, TrafficSummary,
};
pub use parser::{is_api_request, parse, parse_str};

// ============================================================================
// Raw traffic log (HAR 1.2 subset)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficLog {
    pub log: LogBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBody {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub creator: Creator,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub started_date_time: String,
    /// Total elapsed time in milliseconds
    #[serde(default)]
    pub time: f64,
    pub request: LogRequest,
    pub response: LogResponse,
    #[serde(default)]
    pub cache: serde_json::Value,
    #[serde(default)]
    pub timings: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub query_string: Vec<NameValue>,
    #[serde(default)]
    pub post_data: Option<PostData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub content: LogContent,
    #[serde(default = "unknown_size")]
    pub body_size: i64,
}

fn unknown_size() -> i64 {
    -1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContent {
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

// ============================================================================
// Classified interactions
// ============================================================================

/// One request/response pair extracted from a traffic-log entry that was
/// classified as an API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInteraction {
    /// Stable entry id (`entry_{index}` in the source log)
    pub id: String,
    pub request: RecordedRequest,
    pub response: RecordedResponse,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    /// Upper-cased HTTP verb
    pub method: String,
    pub url: String,
    pub scheme: String,
    /// Host, including a non-default port
    pub domain: String,
    pub path: String,
    pub query_params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecordedRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    /// Body size in bytes
    pub size: u64,
}

impl RecordedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Whether a content type carries JSON (`application/json`, `+json` suffixes).
pub fn is_json_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    let essence = lower.split(';').next().unwrap_or("").trim();
    essence == "application/json" || essence.ends_with("+json") || essence == "text/json"
}
