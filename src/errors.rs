use std::fmt;
use thiserror::Error;

/// The central error type for contractwatch.
///
/// Each family maps to one stage of the synthesis/validation pipeline so
/// callers can recover programmatically or pick an exit code.
#[derive(Error, Debug)]
pub enum ContractWatchError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Contract health is broken (score {score:.3})")]
    Unhealthy { score: f64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Malformed traffic log or contract document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("missing required field '{path}'")]
    MissingField { path: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(String),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FormatError {
    pub fn missing(path: impl Into<String>) -> Self {
        FormatError::MissingField { path: path.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("no API interactions to synthesize from")]
    NoInteractions,

    #[error("synthesized contract is invalid: {}", problems.join("; "))]
    SpecInvalid { problems: Vec<String> },
}

/// Failure talking to the mock server admin API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("mock admin API returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("mock admin API unreachable: {0}")]
    Transport(String),

    #[error("unexpected mock admin API response: {0}")]
    Decode(String),
}

/// A single provider call that did not produce a response.
///
/// Recorded on the call's outcome; it never aborts the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestExecutionError {
    #[error("{method} {url} timed out after {timeout_ms}ms")]
    Timeout {
        method: String,
        url: String,
        timeout_ms: u64,
    },

    #[error("{method} {url} failed: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },
}

/// Pipeline stage names used in logs and in [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Parse,
    Synthesis,
    Deployment,
    TestRun,
    Alignment,
    Scoring,
    Persistence,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Parse => "parse",
            PipelineStage::Synthesis => "synthesis",
            PipelineStage::Deployment => "deployment",
            PipelineStage::TestRun => "test_run",
            PipelineStage::Alignment => "alignment",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator-level wrapper naming the stage that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("stage '{stage}' failed: {message}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: impl fmt::Display) -> Self {
        Self {
            stage,
            message: source.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContractWatchError>;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_FORMAT_ERROR: u8 = 3;
pub const EXIT_NETWORK_ERROR: u8 = 4;
pub const EXIT_UNHEALTHY: u8 = 5;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<ContractWatchError>() {
        return match err {
            ContractWatchError::Config(_) => EXIT_CONFIG_ERROR,
            ContractWatchError::Format(_) => EXIT_FORMAT_ERROR,
            ContractWatchError::Synthesis(_) => EXIT_FORMAT_ERROR,
            ContractWatchError::Gateway(_) => EXIT_NETWORK_ERROR,
            ContractWatchError::Unhealthy { .. } => EXIT_UNHEALTHY,
            _ => EXIT_ERROR,
        };
    }

    if e.downcast_ref::<FormatError>().is_some() || e.downcast_ref::<SynthesisError>().is_some()
    {
        return EXIT_FORMAT_ERROR;
    }
    if e.downcast_ref::<GatewayError>().is_some() {
        return EXIT_NETWORK_ERROR;
    }

    EXIT_ERROR
}
