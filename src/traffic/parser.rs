//! Traffic log parsing and API classification

use super::*;
use crate::errors::FormatError;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

struct UrlRules {
    static_assets: Vec<Regex>,
    api_hints: Vec<Regex>,
}

static URL_RULES: OnceLock<UrlRules> = OnceLock::new();

fn url_rules() -> &'static UrlRules {
    URL_RULES.get_or_init(|| UrlRules {
        static_assets: vec![
            Regex::new(
                r"(?i)\.(js|mjs|css|png|jpe?g|gif|svg|ico|webp|avif|bmp|woff2?|ttf|otf|eot|map|mp4|webm|mp3|wav|html?|txt|pdf|zip)(\?|#|$)",
            )
            .expect("invalid static asset regex"),
            Regex::new(r"(?i)/static/").expect("invalid static dir regex"),
            Regex::new(r"(?i)/assets/").expect("invalid assets dir regex"),
        ],
        api_hints: vec![
            Regex::new(r"(?i)/api/").expect("invalid api regex"),
            Regex::new(r"(?i)/v\d+/").expect("invalid version regex"),
            Regex::new(r"(?i)/graphql").expect("invalid graphql regex"),
            Regex::new(r"(?i)\.json(\?|#|$)").expect("invalid json regex"),
            Regex::new(r"(?i)\.xml(\?|#|$)").expect("invalid xml regex"),
        ],
    })
}

const API_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "text/xml",
    "application/graphql",
    "application/x-www-form-urlencoded",
    "application/grpc-web",
    "application/x-ndjson",
];

fn is_api_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    is_json_content_type(&lower)
        || lower.contains("+xml")
        || API_CONTENT_TYPES.iter().any(|ct| lower.contains(ct))
}

/// Classify a traffic-log entry as an API call.
///
/// Static-asset rejection wins over every acceptance heuristic. After that
/// the URL shape, then the declared content types, then the response body
/// itself are consulted.
pub fn is_api_request(entry: &LogEntry) -> bool {
    let rules = url_rules();
    let url = entry.request.url.as_str();

    if rules.static_assets.iter().any(|re| re.is_match(url)) {
        return false;
    }

    if rules.api_hints.iter().any(|re| re.is_match(url)) {
        return true;
    }

    let request_ct = request_content_type(&entry.request);
    let response_ct = response_content_type(&entry.response);
    if request_ct.iter().chain(response_ct.iter()).any(|ct| is_api_content_type(ct)) {
        return true;
    }

    match response_text(&entry.response.content) {
        Some(body) if !body.trim().is_empty() => {
            serde_json::from_str::<serde_json::Value>(&body).is_ok()
        }
        _ => false,
    }
}

/// Parse a serialized traffic log.
pub fn parse_str(input: &str) -> Result<Vec<ApiInteraction>, FormatError> {
    let value: serde_json::Value =
        serde_json::from_str(input).map_err(|e| FormatError::InvalidJson(e.to_string()))?;
    let log = validate_structure(value)?;
    Ok(parse(&log))
}

/// Structurally validate a raw JSON traffic log and convert it into a typed
/// [`TrafficLog`]. Every entry's required request/response fields are checked
/// so a malformed log is rejected before any extraction happens.
pub fn validate_structure(value: serde_json::Value) -> Result<TrafficLog, FormatError> {
    let log = value.get("log").ok_or_else(|| FormatError::missing("log"))?;
    let entries = log
        .get("entries")
        .and_then(|e| e.as_array())
        .ok_or_else(|| FormatError::missing("log.entries"))?;

    for (i, entry) in entries.iter().enumerate() {
        for (section, fields) in [("request", &["method", "url"][..]), ("response", &["status"][..])] {
            let base = format!("log.entries[{}].{}", i, section);
            let obj = entry
                .get(section)
                .filter(|v| v.is_object())
                .ok_or_else(|| FormatError::missing(base.clone()))?;
            for field in fields {
                if obj.get(*field).map_or(true, |v| v.is_null()) {
                    return Err(FormatError::missing(format!("{}.{}", base, field)));
                }
            }
        }
    }

    serde_json::from_value(value).map_err(|e| FormatError::InvalidJson(e.to_string()))
}

/// Extract API interactions from a validated traffic log.
///
/// Entries that are not API calls are skipped; an entry whose URL cannot be
/// parsed is logged and skipped without failing the batch.
pub fn parse(log: &TrafficLog) -> Vec<ApiInteraction> {
    let mut interactions = Vec::new();
    for (index, entry) in log.log.entries.iter().enumerate() {
        if !is_api_request(entry) {
            debug!(url = entry.request.url.as_str(), "Skipping non-API entry");
            continue;
        }
        match build_interaction(index, entry) {
            Ok(interaction) => interactions.push(interaction),
            Err(e) => warn!(entry = index, error = %e, "Skipping malformed entry"),
        }
    }
    debug!(
        entries = log.log.entries.len(),
        interactions = interactions.len(),
        "Parsed traffic log"
    );
    interactions
}

fn build_interaction(index: usize, entry: &LogEntry) -> Result<ApiInteraction, FormatError> {
    let parsed = url::Url::parse(&entry.request.url).map_err(|e| FormatError::InvalidUrl {
        url: entry.request.url.clone(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| FormatError::InvalidUrl {
        url: entry.request.url.clone(),
        reason: "missing host".to_string(),
    })?;
    let domain = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut query_params = BTreeMap::new();
    if entry.request.query_string.is_empty() {
        for (k, v) in parsed.query_pairs() {
            query_params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
        }
    } else {
        for nv in &entry.request.query_string {
            query_params
                .entry(nv.name.clone())
                .or_insert_with(|| nv.value.clone());
        }
    }

    let body = entry
        .request
        .post_data
        .as_ref()
        .and_then(|p| p.text.clone())
        .filter(|t| !t.is_empty());

    let timestamp = DateTime::parse_from_rfc3339(&entry.started_date_time)
        .ok()
        .map(|t| t.with_timezone(&Utc));

    let response_body = response_text(&entry.response.content).filter(|t| !t.is_empty());
    let size = if entry.response.body_size >= 0 {
        entry.response.body_size as u64
    } else if let Some(size) = entry.response.content.size.filter(|s| *s >= 0) {
        size as u64
    } else {
        response_body.as_ref().map_or(0, |b| b.len() as u64)
    };

    Ok(ApiInteraction {
        id: format!("entry_{}", index),
        request: RecordedRequest {
            method: entry.request.method.to_ascii_uppercase(),
            url: entry.request.url.clone(),
            scheme: parsed.scheme().to_string(),
            domain,
            path: parsed.path().to_string(),
            query_params,
            headers: to_header_map(&entry.request.headers),
            body,
            content_type: request_content_type(&entry.request),
            timestamp,
        },
        response: RecordedResponse {
            status: entry.response.status,
            headers: to_header_map(&entry.response.headers),
            body: response_body,
            content_type: response_content_type(&entry.response),
            size,
        },
        duration_ms: entry.time.max(0.0),
    })
}

fn to_header_map(headers: &[NameValue]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for h in headers {
        map.entry(h.name.clone()).or_insert_with(|| h.value.clone());
    }
    map
}

fn header_value(headers: &[NameValue], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn request_content_type(request: &LogRequest) -> Option<String> {
    request
        .post_data
        .as_ref()
        .and_then(|p| p.mime_type.clone())
        .filter(|m| !m.is_empty())
        .or_else(|| header_value(&request.headers, "content-type"))
}

fn response_content_type(response: &LogResponse) -> Option<String> {
    response
        .content
        .mime_type
        .clone()
        .filter(|m| !m.is_empty())
        .or_else(|| header_value(&response.headers, "content-type"))
}

/// Response text, base64-decoded when the log says so.
fn response_text(content: &LogContent) -> Option<String> {
    let text = content.text.as_ref()?;
    if content.encoding.as_deref() == Some("base64") {
        let bytes = base64::engine::general_purpose::STANDARD.decode(text).ok()?;
        return String::from_utf8(bytes).ok();
    }
    Some(text.clone())
}
