//! Value generalization: replace concrete data with placeholders

use super::patterns::detect_patterns;
use super::sensitive::{detect_sensitive, DataLocation};
use crate::traffic::grouping::SegmentKind;
use serde_json::Value;

/// Generalize a single string.
///
/// Sensitive matches are replaced first, then value patterns. Replacement is
/// literal substring substitution, longest match first, so a URL containing
/// an email is replaced as a whole.
pub fn generalize_text(text: &str) -> String {
    let mut sensitive: Vec<(String, String)> = detect_sensitive(text, DataLocation::Unknown)
        .into_iter()
        .map(|m| (m.value, m.placeholder))
        .collect();
    let mut result = replace_longest_first(text.to_string(), &mut sensitive);

    let mut patterns: Vec<(String, String)> = detect_patterns(&result)
        .into_iter()
        .map(|p| (p.value, p.placeholder))
        .collect();
    result = replace_longest_first(result, &mut patterns);
    result
}

fn replace_longest_first(mut text: String, replacements: &mut [(String, String)]) -> String {
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (raw, placeholder) in replacements.iter() {
        if !raw.is_empty() && text.contains(raw.as_str()) {
            text = text.replace(raw.as_str(), placeholder);
        }
    }
    text
}

/// Recursively generalize every string inside a JSON value, keeping the
/// container structure intact. Keys are left untouched.
pub fn generalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(generalize_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(generalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), generalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Generalize a URL's path while preserving scheme, host, query and fragment.
///
/// Dynamic segments (numeric, UUID, opaque ids) become placeholders; other
/// segments go through [`generalize_text`]. Input that is not an absolute URL
/// is treated as a bare path.
pub fn generalize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) if parsed.has_host() => {
            let mut out = format!("{}://", parsed.scheme());
            if let Some(host) = parsed.host_str() {
                out.push_str(host);
            }
            if let Some(port) = parsed.port() {
                out.push_str(&format!(":{}", port));
            }
            out.push_str(&generalize_path(parsed.path()));
            if let Some(query) = parsed.query() {
                out.push('?');
                out.push_str(query);
            }
            if let Some(fragment) = parsed.fragment() {
                out.push('#');
                out.push_str(fragment);
            }
            out
        }
        _ => {
            let (path, rest) = match raw.find(['?', '#']) {
                Some(idx) => raw.split_at(idx),
                None => (raw, ""),
            };
            format!("{}{}", generalize_path(path), rest)
        }
    }
}

fn generalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match SegmentKind::of(segment).placeholder() {
            Some(placeholder) => placeholder.to_string(),
            None => generalize_text(segment),
        })
        .collect::<Vec<_>>()
        .join("/")
}
