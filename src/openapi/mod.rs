//! OpenAPI Contract
//!
//! Typed OpenAPI 3.0 document model plus synthesis from endpoint groups and a
//! structural validator. Maps are ordered so that serialization is stable.

use crate::errors::FormatError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod synthesizer;
pub mod validate;

pub use synthesizer::{path_template, synthesize, PathTemplate};
pub use validate::validate_document;

pub const OPENAPI_VERSION: &str = "3.0.3";

/// HTTP methods an OpenAPI path item may declare
pub const PATH_ITEM_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// path template -> lowercase method -> operation
    #[serde(default)]
    pub paths: BTreeMap<String, BTreeMap<String, Operation>>,
    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// status code (or `default`) -> response
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

/// One declared `(path, method)` pair
#[derive(Debug, Clone)]
pub struct DeclaredOperation<'a> {
    pub path: &'a str,
    /// Upper-cased HTTP verb
    pub method: String,
    pub operation: &'a Operation,
}

impl OpenApiDocument {
    pub fn new(title: &str, version: &str, description: Option<&str>) -> Self {
        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: title.to_string(),
                version: version.to_string(),
                description: description.map(str::to_string),
            },
            servers: Vec::new(),
            paths: BTreeMap::new(),
            components: Components::default(),
        }
    }

    /// All declared operations, ordered by path then method.
    pub fn operations(&self) -> Vec<DeclaredOperation<'_>> {
        self.paths
            .iter()
            .flat_map(|(path, item)| {
                item.iter().map(move |(method, operation)| DeclaredOperation {
                    path: path.as_str(),
                    method: method.to_ascii_uppercase(),
                    operation,
                })
            })
            .collect()
    }

    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|item| item.len()).sum()
    }

    pub fn to_json_pretty(&self) -> Result<String, FormatError> {
        serde_json::to_string_pretty(self).map_err(|e| FormatError::InvalidJson(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, FormatError> {
        serde_yaml::to_string(self).map_err(|e| FormatError::InvalidYaml(e.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self, FormatError> {
        serde_json::from_str(input).map_err(|e| FormatError::InvalidJson(e.to_string()))
    }

    pub fn from_yaml(input: &str) -> Result<Self, FormatError> {
        serde_yaml::from_str(input).map_err(|e| FormatError::InvalidYaml(e.to_string()))
    }

    /// Load a document, choosing YAML when the input does not look like JSON.
    pub fn from_str_auto(input: &str) -> Result<Self, FormatError> {
        if input.trim_start().starts_with('{') {
            Self::from_json(input)
        } else {
            Self::from_yaml(input)
        }
    }

    /// Follow a local `#/components/schemas/...` reference.
    pub fn resolve_schema<'a>(&'a self, schema: &'a Value) -> &'a Value {
        match schema.get("$ref").and_then(Value::as_str) {
            Some(reference) => reference
                .strip_prefix("#/components/schemas/")
                .and_then(|name| self.components.schemas.get(name))
                .unwrap_or(schema),
            None => schema,
        }
    }
}

impl Operation {
    /// Declared response status codes (numeric keys only)
    pub fn declared_statuses(&self) -> Vec<u16> {
        self.responses
            .keys()
            .filter_map(|k| k.parse::<u16>().ok())
            .collect()
    }

    /// Example body of the first declared 2xx response, with its status.
    pub fn success_example(&self) -> Option<(u16, Option<&str>, Option<&Value>)> {
        self.responses.iter().find_map(|(status, response)| {
            let code = status.parse::<u16>().ok()?;
            if !(200..300).contains(&code) {
                return None;
            }
            let media = response.content.iter().next();
            Some((
                code,
                media.map(|(ct, _)| ct.as_str()),
                media.and_then(|(_, m)| m.example.as_ref()),
            ))
        })
    }

    /// Request body example and its content type
    pub fn request_example(&self) -> Option<(&str, &Value)> {
        let body = self.request_body.as_ref()?;
        body.content
            .iter()
            .find_map(|(ct, media)| media.example.as_ref().map(|ex| (ct.as_str(), ex)))
    }

    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Path)
    }
}
