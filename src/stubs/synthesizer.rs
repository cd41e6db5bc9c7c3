//! Stub set synthesis and stateful scenario chaining

use super::*;
use crate::errors::FormatError;
use crate::openapi::OpenApiDocument;
use crate::traffic::{ApiInteraction, EndpointGroup};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

static TEMPLATE_PARAM: OnceLock<Regex> = OnceLock::new();

fn template_param() -> &'static Regex {
    TEMPLATE_PARAM.get_or_init(|| Regex::new(r"^\{[^{}/]+\}$").expect("invalid template param regex"))
}

/// Ordered `(required state, new state)` pairs for a chain of `len` stubs.
///
/// Step `i` requires `state_{i-1}` (nothing for the first) and moves the
/// scenario to `state_i` (nothing for the last). Chains shorter than two
/// are stateless.
pub fn scenario_chain(len: usize) -> Vec<(Option<String>, Option<String>)> {
    if len < 2 {
        return vec![(None, None); len];
    }
    (0..len)
        .map(|i| {
            let required = (i > 0).then(|| format!("state_{}", i - 1));
            let new = (i + 1 < len).then(|| format!("state_{}", i));
            (required, new)
        })
        .collect()
}

/// Synthesize one stub per interaction across all endpoint groups.
///
/// With stateful mode on, stubs sharing a request key (method + URL matcher)
/// are ordered by capture time and chained into a scenario. Output keeps the
/// input order; the slots a chain occupies are filled in chain order.
pub fn synthesize_stubs(groups: &[EndpointGroup], options: &StubOptions) -> Vec<MockStub> {
    let mut stubs: Vec<MockStub> = Vec::new();
    let mut sources: Vec<&ApiInteraction> = Vec::new();

    for group in groups {
        for interaction in &group.interactions {
            stubs.push(stub_from_interaction(interaction, &group.key(), options));
            sources.push(interaction);
        }
    }

    if options.stateful {
        let mut chains: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, stub) in stubs.iter().enumerate() {
            chains.entry(stub.request_key()).or_default().push(index);
        }

        let mut reordered: Vec<Option<MockStub>> = stubs.into_iter().map(Some).collect();
        for (key, slots) in chains.iter().filter(|(_, slots)| slots.len() >= 2) {
            let mut members = slots.clone();
            members.sort_by(|a, b| {
                let (x, y) = (sources[*a], sources[*b]);
                x.request
                    .timestamp
                    .cmp(&y.request.timestamp)
                    .then_with(|| x.id.cmp(&y.id))
            });

            let chained: Vec<MockStub> = members
                .iter()
                .zip(scenario_chain(members.len()))
                .filter_map(|(index, (required, new))| {
                    let mut stub = reordered[*index].take()?;
                    stub.scenario = Some(ScenarioStep {
                        scenario_name: key.clone(),
                        required_scenario_state: required,
                        new_scenario_state: new,
                    });
                    Some(stub)
                })
                .collect();
            debug!(scenario = key.as_str(), steps = chained.len(), "Built scenario chain");

            for (slot, stub) in slots.iter().zip(chained) {
                reordered[*slot] = Some(stub);
            }
        }
        stubs = reordered.into_iter().flatten().collect();
    }

    info!(
        stubs = stubs.len(),
        scenarios = stubs.iter().filter(|s| s.scenario.is_some()).count(),
        "Synthesized mock stubs"
    );
    stubs
}

fn stub_from_interaction(interaction: &ApiInteraction, endpoint: &str, options: &StubOptions) -> MockStub {
    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), json!("traffic"));
    metadata.insert("interaction_id".to_string(), json!(interaction.id));
    metadata.insert("endpoint".to_string(), json!(endpoint));
    if let Some(ts) = interaction.request.timestamp {
        metadata.insert("recorded_at".to_string(), json!(ts.to_rfc3339()));
    }

    MockStub {
        id: None,
        request: build_request_matcher(interaction, options),
        response: build_response(interaction, options),
        scenario: None,
        metadata,
    }
}

/// One stub per declared operation, answering with the first 2xx example.
///
/// Path parameters match any single segment; operations without a 2xx
/// example answer `200` with `{}`.
pub fn stubs_from_contract(doc: &OpenApiDocument) -> Vec<MockStub> {
    doc.operations()
        .into_iter()
        .map(|declared| {
            let (pattern, dynamic) = contract_path_matcher(declared.path);
            let mut request = RequestPattern {
                method: declared.method.clone(),
                ..Default::default()
            };
            if dynamic {
                request.url_path_pattern = Some(pattern);
            } else {
                request.url_path = Some(pattern);
            }

            let (status, content_type, example) = match declared.operation.success_example() {
                Some((status, ct, example)) => (status, ct, example.cloned()),
                None => (200, None, None),
            };
            let mut response = ResponseDefinition::new(status);
            match example {
                Some(Value::String(text)) => {
                    response.body = Some(text);
                    response.headers.insert(
                        "Content-Type".to_string(),
                        content_type.unwrap_or("text/plain").to_string(),
                    );
                }
                other => {
                    response.json_body = Some(other.unwrap_or_else(|| json!({})));
                    response.headers.insert(
                        "Content-Type".to_string(),
                        content_type.unwrap_or("application/json").to_string(),
                    );
                }
            }

            let mut metadata = BTreeMap::new();
            metadata.insert("source".to_string(), json!("contract"));
            metadata.insert(
                "operation_id".to_string(),
                json!(declared.operation.operation_id),
            );

            MockStub {
                id: None,
                request,
                response,
                scenario: None,
                metadata,
            }
        })
        .collect()
}

/// `/users/{id}` -> `/users/([^/]+)`; literal segments are escaped.
pub(crate) fn contract_path_matcher(template: &str) -> (String, bool) {
    let mut dynamic = false;
    let pattern = template
        .split('/')
        .map(|segment| {
            if template_param().is_match(segment) {
                dynamic = true;
                "([^/]+)".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    if dynamic {
        (pattern, true)
    } else {
        (template.to_string(), false)
    }
}

/// Mapping file in the mock server's bulk-import format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubExport {
    pub mappings: Vec<MockStub>,
    pub meta: ExportMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMeta {
    pub total: usize,
}

/// Deterministic, input-ordered export of a stub set.
pub fn export(stubs: &[MockStub]) -> StubExport {
    StubExport {
        mappings: stubs.to_vec(),
        meta: ExportMeta { total: stubs.len() },
    }
}

impl StubExport {
    pub fn to_json_pretty(&self) -> Result<String, FormatError> {
        serde_json::to_string_pretty(self).map_err(|e| FormatError::InvalidJson(e.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self, FormatError> {
        serde_json::from_str(input).map_err(|e| FormatError::InvalidJson(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, FormatError> {
        serde_yaml::to_string(self).map_err(|e| FormatError::InvalidYaml(e.to_string()))
    }
}
