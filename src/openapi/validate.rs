//! Structural validation of OpenAPI documents

use super::*;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

static TEMPLATE_PARAM: OnceLock<Regex> = OnceLock::new();

fn template_param() -> &'static Regex {
    TEMPLATE_PARAM.get_or_init(|| Regex::new(r"\{([^{}/]+)\}").expect("invalid template param regex"))
}

/// Check the structural rules an OpenAPI 3.0 document must satisfy.
///
/// Returns a list of human readable problems; an empty list means valid.
pub fn validate_document(doc: &OpenApiDocument) -> Vec<String> {
    let mut problems = Vec::new();

    if !doc.openapi.starts_with("3.") {
        problems.push(format!("unsupported openapi version '{}'", doc.openapi));
    }
    if doc.info.title.trim().is_empty() {
        problems.push("info.title must not be empty".to_string());
    }
    if doc.info.version.trim().is_empty() {
        problems.push("info.version must not be empty".to_string());
    }
    for server in &doc.servers {
        if url::Url::parse(&server.url).is_err() {
            problems.push(format!("server url '{}' is not absolute", server.url));
        }
    }
    if doc.paths.is_empty() {
        problems.push("document declares no paths".to_string());
    }

    let mut operation_ids = HashSet::new();
    for (path, item) in &doc.paths {
        if !path.starts_with('/') {
            problems.push(format!("path '{}' must start with '/'", path));
        }
        let placeholders: Vec<&str> = template_param()
            .captures_iter(path)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        for (method, op) in item {
            let at = format!("{} {}", method.to_ascii_uppercase(), path);
            if !PATH_ITEM_METHODS.contains(&method.as_str()) {
                problems.push(format!("{}: unknown method", at));
            }
            if op.operation_id.is_empty() {
                problems.push(format!("{}: missing operationId", at));
            } else if !operation_ids.insert(op.operation_id.as_str()) {
                problems.push(format!("{}: duplicate operationId '{}'", at, op.operation_id));
            }
            if op.responses.is_empty() {
                problems.push(format!("{}: no responses declared", at));
            }
            for status in op.responses.keys() {
                if !is_response_key(status) {
                    problems.push(format!("{}: invalid response key '{}'", at, status));
                }
            }

            for name in &placeholders {
                let declared = op
                    .path_parameters()
                    .any(|p| p.name == *name && p.required);
                if !declared {
                    problems.push(format!("{}: path parameter '{}' not declared as required", at, name));
                }
            }
            for param in op.path_parameters() {
                if !placeholders.contains(&param.name.as_str()) {
                    problems.push(format!("{}: path parameter '{}' not in template", at, param.name));
                }
            }

            for reference in schema_refs(op) {
                let known = reference
                    .strip_prefix("#/components/schemas/")
                    .is_some_and(|name| doc.components.schemas.contains_key(name));
                if !known {
                    problems.push(format!("{}: unresolved reference '{}'", at, reference));
                }
            }
        }
    }

    problems
}

fn is_response_key(key: &str) -> bool {
    key == "default"
        || (key.len() == 3
            && key.parse::<u16>().is_ok_and(|code| (100..600).contains(&code)))
}

fn schema_refs(op: &Operation) -> Vec<&str> {
    let request = op.request_body.iter().flat_map(|b| b.content.values());
    let responses = op.responses.values().flat_map(|r| r.content.values());
    request
        .chain(responses)
        .filter_map(|media| media.schema.get("$ref").and_then(Value::as_str))
        .collect()
}
