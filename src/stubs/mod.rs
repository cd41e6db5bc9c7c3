//! Mock Stub Synthesis
//!
//! Builds WireMock-style mappings from recorded interactions:
//! - Request matchers (exact URL or regex pattern, query/header/body matchers)
//! - Responses with optional dynamic templating
//! - Stateful scenario chains for endpoints observed more than once
//!
//! Stubs can also be derived directly from a contract's declared examples.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod matcher;
pub mod response;
pub mod synthesizer;

pub use matcher::build_request_matcher;
pub use response::{apply_templates, build_response};
pub use synthesizer::{
    export, scenario_chain, stubs_from_contract, synthesize_stubs, ExportMeta, StubExport,
};

/// Options controlling stub synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubOptions {
    /// Replace dynamic response values with mock-server templates
    pub templating: bool,
    /// Chain repeated endpoint interactions into scenarios
    pub stateful: bool,
    /// Match every request header except the excluded set
    pub strict_headers: bool,
    /// Prefix stripped from request URLs before matching
    pub base_url: Option<String>,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            templating: true,
            stateful: true,
            strict_headers: false,
            base_url: None,
        }
    }
}

impl StubOptions {
    pub fn with_templating(mut self, enabled: bool) -> Self {
        self.templating = enabled;
        self
    }

    pub fn with_stateful(mut self, enabled: bool) -> Self {
        self.stateful = enabled;
        self
    }

    pub fn with_strict_headers(mut self, enabled: bool) -> Self {
        self.strict_headers = enabled;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// A request matcher + response pair understood by the mock server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockStub {
    /// Identifier assigned by the mock server once deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub request: RequestPattern,
    pub response: ResponseDefinition,
    #[serde(flatten)]
    pub scenario: Option<ScenarioStep>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl MockStub {
    /// The URL this stub matches on, whichever matcher field carries it
    pub fn url_matcher(&self) -> Option<&str> {
        self.request.url_matcher()
    }

    /// `METHOD url-matcher` key used for scenario chains and alignment
    pub fn request_key(&self) -> String {
        format!(
            "{} {}",
            self.request.method,
            self.url_matcher().unwrap_or_default()
        )
    }
}

/// Scenario membership; serialized at the mapping's top level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    pub scenario_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scenario_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_scenario_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_parameters: BTreeMap<String, ValueMatcher>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, ValueMatcher>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_patterns: Vec<BodyPattern>,
}

impl RequestPattern {
    pub fn url_matcher(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.url_pattern.as_deref())
            .or(self.url_path.as_deref())
            .or(self.url_path_pattern.as_deref())
    }

    /// Whether the URL matcher is a regular expression
    pub fn is_pattern(&self) -> bool {
        self.url_pattern.is_some() || self.url_path_pattern.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueMatcher {
    EqualTo(String),
    Matches(String),
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_to_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_array_order: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<String>,
}

impl BodyPattern {
    pub fn json(value: Value) -> Self {
        Self {
            equal_to_json: Some(value),
            ignore_array_order: Some(true),
            equal_to: None,
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            equal_to_json: None,
            ignore_array_order: None,
            equal_to: Some(body.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<String>,
}

impl ResponseDefinition {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
            json_body: None,
            transformers: Vec::new(),
        }
    }
}
