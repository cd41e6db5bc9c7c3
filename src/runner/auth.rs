//! Provider authentication

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_API_KEY_PARAM: &str = "api_key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    None,
    ApiKey,
    Bearer,
    Basic,
}

impl AuthMethod {
    /// Lenient parse; anything unrecognised means no authentication.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "api_key" | "apikey" => AuthMethod::ApiKey,
            "bearer" | "token" => AuthMethod::Bearer,
            "basic" => AuthMethod::Basic,
            _ => AuthMethod::None,
        }
    }
}

/// Headers and query parameters injected into every provider call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedAuth {
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
}

impl PreparedAuth {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query_params.is_empty()
    }
}

/// Translate an auth method and its free-form settings into request
/// material. Missing settings contribute nothing; this never fails.
///
/// Recognised settings:
/// - `api_key`: `key`, `location` (`header` | `query`), `header_name`, `param_name`
/// - `bearer`: `token`
/// - `basic`: `username`, `password`
pub fn prepare_auth(method: &str, config: &BTreeMap<String, String>) -> PreparedAuth {
    let mut prepared = PreparedAuth::default();
    let get = |key: &str| config.get(key).map(String::as_str).filter(|v| !v.is_empty());

    match AuthMethod::parse(method) {
        AuthMethod::None => {}
        AuthMethod::ApiKey => {
            if let Some(key) = get("key").or_else(|| get("api_key")) {
                if get("location") == Some("query") {
                    let name = get("param_name").unwrap_or(DEFAULT_API_KEY_PARAM);
                    prepared.query_params.insert(name.to_string(), key.to_string());
                } else {
                    let name = get("header_name").unwrap_or(DEFAULT_API_KEY_HEADER);
                    prepared.headers.insert(name.to_string(), key.to_string());
                }
            }
        }
        AuthMethod::Bearer => {
            if let Some(token) = get("token") {
                prepared
                    .headers
                    .insert("Authorization".to_string(), format!("Bearer {}", token));
            }
        }
        AuthMethod::Basic => {
            if let Some(username) = get("username") {
                let password = get("password").unwrap_or("");
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                prepared
                    .headers
                    .insert("Authorization".to_string(), format!("Basic {}", encoded));
            }
        }
    }
    prepared
}
