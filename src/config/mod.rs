//! Configuration Management
//!
//! Loads contractwatch settings from TOML:
//! - Provider under test and its authentication
//! - Contract test runner limits
//! - Mock server admin API and stub synthesis options
//! - Synthesized contract metadata
//! - Log output format

use crate::errors::ContractWatchError;
use crate::runner::{RunnerOptions, DEFAULT_SLOW_THRESHOLD_MS};
use crate::stubs::StubOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "contractwatch.toml";

pub const ENV_PROVIDER_URL: &str = "CONTRACTWATCH_PROVIDER_URL";
pub const ENV_MOCK_ADMIN_URL: &str = "CONTRACTWATCH_MOCK_ADMIN_URL";
pub const ENV_TIMEOUT: &str = "CONTRACTWATCH_TIMEOUT";
pub const ENV_MAX_EXAMPLES: &str = "CONTRACTWATCH_MAX_EXAMPLES";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub mock: MockConfig,
    #[serde(default)]
    pub openapi: OpenApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: Option<String>,
}

/// `method` plus free-form settings such as `token` or `username`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_method")]
    pub method: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: default_auth_method(),
            settings: BTreeMap::new(),
        }
    }
}

fn default_auth_method() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_examples: default_max_examples(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            slow_threshold_ms: default_slow_threshold_ms(),
        }
    }
}

impl RunnerConfig {
    pub fn to_options(&self) -> RunnerOptions {
        RunnerOptions {
            max_examples: self.max_examples,
            timeout: Duration::from_secs(self.timeout_secs),
            slow_threshold: Duration::from_millis(self.slow_threshold_ms),
            concurrency: self.concurrency,
        }
    }
}

fn default_max_examples() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    8
}
fn default_slow_threshold_ms() -> u64 {
    DEFAULT_SLOW_THRESHOLD_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_admin_url")]
    pub admin_url: String,
    #[serde(default = "default_true")]
    pub templating: bool,
    #[serde(default = "default_true")]
    pub stateful: bool,
    #[serde(default)]
    pub strict_headers: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_true")]
    pub clear_existing: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            admin_url: default_admin_url(),
            templating: true,
            stateful: true,
            strict_headers: false,
            base_url: None,
            clear_existing: true,
        }
    }
}

impl MockConfig {
    pub fn stub_options(&self) -> StubOptions {
        let options = StubOptions::default()
            .with_templating(self.templating)
            .with_stateful(self.stateful)
            .with_strict_headers(self.strict_headers);
        match &self.base_url {
            Some(base) => options.with_base_url(base.clone()),
            None => options,
        }
    }
}

fn default_admin_url() -> String {
    "http://localhost:8080/__admin".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            version: default_version(),
            description: None,
        }
    }
}

fn default_title() -> String {
    "Recorded API".to_string()
}
fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Explicit path, else `./contractwatch.toml`, else
    /// `~/.config/contractwatch/config.toml`, else defaults. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                Self::from_toml(&content).with_context(|| format!("Failed to parse config {}", p))?
            }
            None => {
                let mut candidates = vec![std::path::PathBuf::from(CONFIG_FILE_NAME)];
                if let Some(dir) = dirs::config_dir() {
                    candidates.push(dir.join("contractwatch").join("config.toml"));
                }

                let mut loaded = None;
                for candidate in &candidates {
                    if let Ok(content) = std::fs::read_to_string(candidate) {
                        debug!(path = %candidate.display(), "Loaded config");
                        loaded = Some(Self::from_toml(&content).with_context(|| {
                            format!("Failed to parse config {}", candidate.display())
                        })?);
                        break;
                    }
                }
                loaded.unwrap_or_default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Unparseable numeric values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_PROVIDER_URL) {
            self.provider.url = Some(url);
        }
        if let Some(url) = lookup(ENV_MOCK_ADMIN_URL) {
            self.mock.admin_url = url;
        }
        if let Some(t) = lookup(ENV_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
            self.runner.timeout_secs = t;
        }
        if let Some(n) = lookup(ENV_MAX_EXAMPLES).and_then(|v| v.parse::<usize>().ok()) {
            self.runner.max_examples = n;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ContractWatchError> {
        let mut problems = Vec::new();
        if self.runner.timeout_secs == 0 {
            problems.push("runner.timeout_secs must be greater than 0".to_string());
        }
        if self.runner.max_examples == 0 {
            problems.push("runner.max_examples must be greater than 0".to_string());
        }
        if self.runner.concurrency == 0 {
            problems.push("runner.concurrency must be greater than 0".to_string());
        }
        if let Some(url) = &self.provider.url {
            check_url("provider.url", url, &mut problems);
        }
        check_url("mock.admin_url", &self.mock.admin_url, &mut problems);
        if self.openapi.title.trim().is_empty() {
            problems.push("openapi.title must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ContractWatchError::Config(problems.join("; ")))
        }
    }

    pub fn runner_options(&self) -> RunnerOptions {
        self.runner.to_options()
    }
}

fn check_url(field: &str, raw: &str, problems: &mut Vec<String>) {
    match url::Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        Ok(u) => problems.push(format!("{} has unsupported scheme '{}'", field, u.scheme())),
        Err(e) => problems.push(format!("{} is not a valid URL: {}", field, e)),
    }
}
