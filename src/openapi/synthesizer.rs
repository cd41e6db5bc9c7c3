//! Contract synthesis from endpoint groups

use super::*;
use crate::errors::SynthesisError;
use crate::inference::infer;
use crate::traffic::grouping::SegmentKind;
use crate::traffic::{ApiInteraction, EndpointGroup};
use serde_json::json;
use std::collections::HashSet;
use crate::observability::sanitize_for_log;
use tracing::{debug, info, warn};

/// A concrete request path turned into an OpenAPI path template
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    pub template: String,
    /// `(parameter name, captured value, segment kind)` in path order
    pub params: Vec<(String, String, SegmentKind)>,
}

/// Replace dynamic segments of a concrete path with named parameters.
///
/// Numeric and opaque id segments become `{id}`, UUIDs `{uuid}`; a second
/// occurrence of the same name gets a numeric suffix (`{id2}`).
pub fn path_template(path: &str) -> PathTemplate {
    let mut params: Vec<(String, String, SegmentKind)> = Vec::new();
    let mut segments = Vec::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let kind = SegmentKind::of(segment);
        let Some(base) = param_base(kind) else {
            segments.push(segment.to_string());
            continue;
        };
        let seen = params.iter().filter(|(_, _, k)| param_base(*k) == Some(base)).count();
        let name = if seen == 0 {
            base.to_string()
        } else {
            format!("{}{}", base, seen + 1)
        };
        segments.push(format!("{{{}}}", name));
        params.push((name, segment.to_string(), kind));
    }

    PathTemplate {
        template: format!("/{}", segments.join("/")),
        params,
    }
}

fn param_base(kind: SegmentKind) -> Option<&'static str> {
    match kind {
        SegmentKind::Literal => None,
        SegmentKind::Uuid => Some("uuid"),
        SegmentKind::Numeric | SegmentKind::OpaqueId => Some("id"),
    }
}

/// Build an OpenAPI document from endpoint groups.
///
/// Every interaction contributes a `(template, method)` operation; repeated
/// pairs only add response statuses not seen yet. The result is validated
/// structurally before it is returned.
pub fn synthesize(
    groups: &[EndpointGroup],
    title: &str,
    version: &str,
    description: Option<&str>,
) -> Result<OpenApiDocument, SynthesisError> {
    if groups.iter().all(|g| g.interactions.is_empty()) {
        return Err(SynthesisError::NoInteractions);
    }

    let mut doc = OpenApiDocument::new(title, version, description);
    let mut used_ids: HashSet<String> = HashSet::new();

    for group in groups {
        for interaction in &group.interactions {
            if !add_interaction(&mut doc, &mut used_ids, interaction) {
                continue;
            }
            let url = interaction.request.origin();
            if !doc.servers.iter().any(|s| s.url == url) {
                doc.servers.push(Server {
                    url,
                    description: None,
                });
            }
        }
    }

    let problems = validate_document(&doc);
    if !problems.is_empty() {
        return Err(SynthesisError::SpecInvalid { problems });
    }

    info!(
        paths = doc.paths.len(),
        operations = doc.operation_count(),
        schemas = doc.components.schemas.len(),
        "Synthesized OpenAPI document"
    );
    Ok(doc)
}

/// Returns false when the interaction was skipped.
fn add_interaction(
    doc: &mut OpenApiDocument,
    used_ids: &mut HashSet<String>,
    interaction: &ApiInteraction,
) -> bool {
    let method = interaction.request.method.to_ascii_lowercase();
    if !PATH_ITEM_METHODS.contains(&method.as_str()) {
        warn!(
            interaction = interaction.id.as_str(),
            method = %sanitize_for_log(&interaction.request.method),
            "Skipping interaction: method cannot be declared in a path item"
        );
        return false;
    }
    let template = path_template(&interaction.request.path);
    let status = interaction.response.status.to_string();

    let existing = doc
        .paths
        .get(&template.template)
        .and_then(|item| item.get(&method))
        .map(|op| (op.operation_id.clone(), op.responses.contains_key(&status)));

    match existing {
        Some((_, true)) => {}
        Some((operation_id, false)) => {
            debug!(
                path = template.template.as_str(),
                method = method.as_str(),
                status = status.as_str(),
                "Merging response status into existing operation"
            );
            let response = build_response(&mut doc.components, &operation_id, interaction);
            if let Some(op) = doc
                .paths
                .get_mut(&template.template)
                .and_then(|item| item.get_mut(&method))
            {
                op.responses.insert(status, response);
            }
        }
        None => {
            let operation_id = unique_operation_id(used_ids, &method, &interaction.request.path);
            let operation = build_operation(
                &mut doc.components,
                operation_id,
                &method,
                &template,
                interaction,
            );
            doc.paths
                .entry(template.template.clone())
                .or_default()
                .insert(method, operation);
        }
    }
    true
}

/// `{method}{LastLiteralSegment}`, suffixed `2`, `3`, ... on collision.
fn unique_operation_id(used: &mut HashSet<String>, method: &str, path: &str) -> String {
    let resource = path
        .split('/')
        .rev()
        .find(|s| !s.is_empty() && !SegmentKind::of(s).is_dynamic())
        .map(pascal_case)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Root".to_string());
    let base = format!("{}{}", method, resource);

    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}{}", base, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn pascal_case(segment: &str) -> String {
    segment
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn build_operation(
    components: &mut Components,
    operation_id: String,
    method: &str,
    template: &PathTemplate,
    interaction: &ApiInteraction,
) -> Operation {
    let mut parameters: Vec<Parameter> = template
        .params
        .iter()
        .map(|(name, value, kind)| {
            let (schema, example) = match kind {
                SegmentKind::Uuid => (json!({"type": "string", "format": "uuid"}), json!(value)),
                _ => typed_scalar(value),
            };
            Parameter {
                name: name.clone(),
                location: ParameterLocation::Path,
                required: true,
                schema,
                example: Some(example),
            }
        })
        .collect();

    for (name, value) in &interaction.request.query_params {
        let (schema, example) = typed_scalar(value);
        parameters.push(Parameter {
            name: name.clone(),
            location: ParameterLocation::Query,
            required: false,
            schema,
            example: Some(example),
        });
    }

    let request_body = match (method, interaction.request.body.as_deref()) {
        ("get" | "delete", _) | (_, None) => None,
        (_, Some(body)) if body.trim().is_empty() => None,
        (_, Some(body)) => {
            let content_type = interaction.request.content_type.as_deref();
            let media = media_for(
                components,
                &format!("{}Request", capitalize(&operation_id)),
                body,
            );
            Some(RequestBody {
                required: true,
                content: BTreeMap::from([(media_key(content_type, &media), media)]),
            })
        }
    };

    let mut responses = BTreeMap::new();
    responses.insert(
        interaction.response.status.to_string(),
        build_response(components, &operation_id, interaction),
    );

    Operation {
        summary: Some(format!(
            "{} {}",
            method.to_ascii_uppercase(),
            template.template
        )),
        operation_id,
        parameters,
        request_body,
        responses,
    }
}

fn build_response(
    components: &mut Components,
    operation_id: &str,
    interaction: &ApiInteraction,
) -> ResponseSpec {
    let status = interaction.response.status;
    let description = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Response")
        .to_string();

    let content = match interaction.response.body.as_deref() {
        Some(body) if !body.trim().is_empty() => {
            let media = media_for(
                components,
                &format!("{}{}Response", capitalize(operation_id), status),
                body,
            );
            let key = media_key(interaction.response.content_type.as_deref(), &media);
            BTreeMap::from([(key, media)])
        }
        _ => BTreeMap::new(),
    };

    ResponseSpec {
        description,
        content,
    }
}

/// Infer a media type entry from a captured body. Object schemas are
/// registered under `component_name` and referenced.
fn media_for(components: &mut Components, component_name: &str, body: &str) -> MediaType {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let schema = infer(&value);
            let schema = if schema.is_object() {
                components
                    .schemas
                    .insert(component_name.to_string(), schema.to_json());
                json!({"$ref": format!("#/components/schemas/{}", component_name)})
            } else {
                schema.to_json()
            };
            MediaType {
                schema,
                example: Some(value),
            }
        }
        Err(_) => MediaType {
            schema: json!({"type": "string"}),
            example: Some(Value::String(body.to_string())),
        },
    }
}

fn media_key(content_type: Option<&str>, media: &MediaType) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());
    match essence {
        Some(ct) => ct,
        None if media.schema.get("type") == Some(&json!("string")) => "text/plain".to_string(),
        None => "application/json".to_string(),
    }
}

/// Schema and typed example for a scalar captured as text.
fn typed_scalar(raw: &str) -> (Value, Value) {
    if let Ok(n) = raw.parse::<i64>() {
        return (json!({"type": "integer"}), json!(n));
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return (json!({"type": "number"}), json!(f));
        }
    }
    match raw {
        "true" | "false" => (json!({"type": "boolean"}), json!(raw == "true")),
        _ => (json!({"type": "string"}), json!(raw)),
    }
}
