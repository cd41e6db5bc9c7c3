//! Stub response construction and dynamic templating

use super::*;
use crate::traffic::{is_json_content_type, ApiInteraction};

pub const RESPONSE_TEMPLATE_TRANSFORMER: &str = "response-template";

const UUID_TEMPLATE: &str = "{{randomValue type='UUID'}}";
const NUMERIC_ID_TEMPLATE: &str = "{{randomValue length=8 type='NUMERIC'}}";
const NOW_TEMPLATE: &str = "{{now}}";
const EMAIL_TEMPLATE: &str = "{{randomValue length=8 type='ALPHANUMERIC'}}@example.com";

/// Hop-by-hop headers and headers whose values vary per response
const EXCLUDED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
    "date",
    "age",
    "etag",
    "expires",
    "last-modified",
    "set-cookie",
    "server",
    "vary",
    "x-request-id",
];

/// Build the response side of a stub.
pub fn build_response(interaction: &ApiInteraction, options: &StubOptions) -> ResponseDefinition {
    let recorded = &interaction.response;
    let mut response = ResponseDefinition::new(recorded.status);

    response.headers = recorded
        .headers
        .iter()
        .filter(|(name, _)| !EXCLUDED_RESPONSE_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let Some(body) = recorded.body.as_deref().filter(|b| !b.is_empty()) else {
        return response;
    };

    let json_like = recorded.content_type.as_deref().is_some_and(is_json_content_type);
    match serde_json::from_str::<Value>(body) {
        Ok(value) if json_like => {
            if options.templating {
                let (templated, changed) = apply_templates(&value);
                if changed {
                    response
                        .transformers
                        .push(RESPONSE_TEMPLATE_TRANSFORMER.to_string());
                }
                response.json_body = Some(templated);
            } else {
                response.json_body = Some(value);
            }
        }
        _ => response.body = Some(body.to_string()),
    }
    response
}

/// Rewrite dynamic string fields into mock-server template expressions.
///
/// Only string values are rewritten; numeric ids are left as recorded.
/// Returns the rewritten value and whether anything changed.
pub fn apply_templates(value: &Value) -> (Value, bool) {
    let mut changed = false;
    let out = rewrite(value, None, &mut changed);
    (out, changed)
}

fn rewrite(value: &Value, key: Option<&str>, changed: &mut bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), rewrite(v, Some(k), changed)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| rewrite(v, key, changed)).collect()),
        Value::String(_) => match key.and_then(template_for_field) {
            Some(template) => {
                *changed = true;
                Value::String(template.to_string())
            }
            None => value.clone(),
        },
        other => other.clone(),
    }
}

fn template_for_field(key: &str) -> Option<&'static str> {
    let lower = key.to_ascii_lowercase();
    if lower == "id" || lower == "uuid" || lower == "guid" {
        Some(UUID_TEMPLATE)
    } else if lower.ends_with("_id") {
        Some(NUMERIC_ID_TEMPLATE)
    } else if is_timestamp_field(&lower) {
        Some(NOW_TEMPLATE)
    } else if lower == "email" || lower.ends_with("_email") {
        Some(EMAIL_TEMPLATE)
    } else {
        None
    }
}

fn is_timestamp_field(lower: &str) -> bool {
    matches!(lower, "timestamp" | "created" | "updated" | "modified" | "time" | "date")
        || lower.ends_with("_at")
        || lower.ends_with("_time")
        || lower.ends_with("_date")
        || lower.ends_with("timestamp")
}
