//! Request matcher construction

use super::*;
use crate::traffic::grouping::SegmentKind;
use crate::traffic::{is_json_content_type, ApiInteraction};

const UUID_PATTERN: &str = "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";
const OPAQUE_ID_PATTERN: &str = "[A-Za-z0-9_-]+";

/// Headers matched in loose mode
const LOOSE_HEADERS: &[&str] = &["content-type", "accept"];

/// Headers never matched, even in strict mode
const EXCLUDED_REQUEST_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "authorization",
    "cookie",
];

const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// Build the request side of a stub from a recorded interaction.
///
/// The path is matched exactly unless it has dynamic segments, in which case
/// a regex is emitted. When query parameters are present the path-only
/// matcher fields are used so query matchers apply.
pub fn build_request_matcher(interaction: &ApiInteraction, options: &StubOptions) -> RequestPattern {
    let request = &interaction.request;
    let path = strip_base_url(request, options.base_url.as_deref());
    let (matcher, dynamic) = path_matcher(&path);
    let has_query = !request.query_params.is_empty();

    let mut pattern = RequestPattern {
        method: request.method.clone(),
        ..Default::default()
    };
    match (dynamic, has_query) {
        (false, false) => pattern.url = Some(matcher),
        (true, false) => pattern.url_pattern = Some(matcher),
        (false, true) => pattern.url_path = Some(matcher),
        (true, true) => pattern.url_path_pattern = Some(matcher),
    }

    pattern.query_parameters = request
        .query_params
        .iter()
        .map(|(k, v)| (k.clone(), ValueMatcher::EqualTo(v.clone())))
        .collect();

    for (name, value) in &request.headers {
        let lower = name.to_ascii_lowercase();
        let keep = if options.strict_headers {
            !lower.starts_with(':') && !EXCLUDED_REQUEST_HEADERS.contains(&lower.as_str())
        } else {
            LOOSE_HEADERS.contains(&lower.as_str())
        };
        if keep {
            pattern
                .headers
                .insert(name.clone(), ValueMatcher::EqualTo(value.clone()));
        }
    }

    if BODY_METHODS.contains(&request.method.as_str()) {
        if let Some(body) = request.body.as_deref().filter(|b| !b.trim().is_empty()) {
            pattern.body_patterns.push(body_pattern(body, request.content_type.as_deref()));
        }
    }

    pattern
}

fn body_pattern(body: &str, content_type: Option<&str>) -> BodyPattern {
    let json_like = content_type.is_some_and(is_json_content_type)
        || matches!(body.trim_start().chars().next(), Some('{') | Some('['));
    if json_like {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return BodyPattern::json(value);
        }
    }
    BodyPattern::text(body)
}

/// Remove a configured prefix from the request before matching.
///
/// The prefix may be a full URL (`https://api.x.io/v1`) or a bare path
/// (`/v1`). A request that does not start with it keeps its path.
pub(crate) fn strip_base_url(request: &crate::traffic::RecordedRequest, base_url: Option<&str>) -> String {
    let Some(base) = base_url.map(|b| b.trim_end_matches('/')).filter(|b| !b.is_empty()) else {
        return request.path.clone();
    };

    let full = format!("{}{}", request.origin(), request.path);
    let remainder = if base.starts_with('/') {
        request.path.strip_prefix(base)
    } else {
        full.strip_prefix(base)
    };

    match remainder {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => request.path.clone(),
    }
}

/// Exact path, or a regex with dynamic segments replaced; the flag tells
/// which one was produced.
pub(crate) fn path_matcher(path: &str) -> (String, bool) {
    let segments: Vec<&str> = path.split('/').collect();
    if !segments.iter().any(|s| SegmentKind::of(s).is_dynamic()) {
        return (path.to_string(), false);
    }

    let pattern = segments
        .iter()
        .map(|segment| match SegmentKind::of(segment) {
            SegmentKind::Numeric => r"\d+".to_string(),
            SegmentKind::Uuid => UUID_PATTERN.to_string(),
            SegmentKind::OpaqueId => OPAQUE_ID_PATTERN.to_string(),
            SegmentKind::Literal => regex::escape(segment),
        })
        .collect::<Vec<_>>()
        .join("/");
    (pattern, true)
}
