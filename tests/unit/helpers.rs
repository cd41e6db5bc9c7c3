#![allow(dead_code)]

use contractwatch::openapi::{
    MediaType, OpenApiDocument, Operation, Parameter, ParameterLocation, ResponseSpec,
};
use contractwatch::traffic::{parse_str, ApiInteraction};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const SAMPLE_TRAFFIC: &str = include_str!("../fixtures/sample_traffic.har.json");

pub fn sample_interactions() -> Vec<ApiInteraction> {
    parse_str(SAMPLE_TRAFFIC).expect("fixture parses")
}

pub fn har(entries: Vec<Value>) -> String {
    json!({"log": {"version": "1.2", "creator": {"name": "test"}, "entries": entries}}).to_string()
}

pub fn entry(method: &str, url: &str, started: &str, status: u16, body: &str) -> Value {
    json!({
        "startedDateTime": started,
        "time": 10.0,
        "request": {"method": method, "url": url, "headers": [], "queryString": []},
        "response": {
            "status": status,
            "statusText": "",
            "headers": [{"name": "Content-Type", "value": "application/json"}],
            "content": {"text": body, "mimeType": "application/json"},
            "bodySize": body.len()
        },
        "cache": {},
        "timings": {}
    })
}

fn response(description: &str, example: Option<Value>) -> ResponseSpec {
    let mut content = BTreeMap::new();
    if let Some(example) = example {
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: json!({"type": "object"}),
                example: Some(example),
            },
        );
    }
    ResponseSpec {
        description: description.to_string(),
        content,
    }
}

/// `GET /users/{id}` (200, 404), `GET /health` (200) and `POST /users` (201).
pub fn users_contract(server: &str) -> OpenApiDocument {
    let mut doc = OpenApiDocument::new("Users", "1.0.0", None);
    doc.servers.push(contractwatch::openapi::Server {
        url: server.to_string(),
        description: None,
    });

    doc.paths.entry("/users/{id}".to_string()).or_default().insert(
        "get".to_string(),
        Operation {
            operation_id: "getUser".to_string(),
            summary: None,
            parameters: vec![Parameter {
                name: "id".to_string(),
                location: ParameterLocation::Path,
                required: true,
                schema: json!({"type": "integer"}),
                example: Some(json!(42)),
            }],
            request_body: None,
            responses: BTreeMap::from([
                ("200".to_string(), response("OK", Some(json!({"id": 42, "name": "Ada"})))),
                ("404".to_string(), response("Not Found", None)),
            ]),
        },
    );
    doc.paths.entry("/health".to_string()).or_default().insert(
        "get".to_string(),
        Operation {
            operation_id: "getHealth".to_string(),
            summary: None,
            parameters: vec![],
            request_body: None,
            responses: BTreeMap::from([("200".to_string(), response("OK", Some(json!({"ok": true}))))]),
        },
    );
    doc.paths.entry("/users".to_string()).or_default().insert(
        "post".to_string(),
        Operation {
            operation_id: "postUsers".to_string(),
            summary: None,
            parameters: vec![],
            request_body: Some(contractwatch::openapi::RequestBody {
                required: true,
                content: BTreeMap::from([(
                    "application/json".to_string(),
                    MediaType {
                        schema: json!({"type": "object"}),
                        example: Some(json!({"name": "Grace"})),
                    },
                )]),
            }),
            responses: BTreeMap::from([("201".to_string(), response("Created", Some(json!({"id": 7}))))]),
        },
    );
    doc
}
