//! Traffic-to-artifacts pipeline: parse, group, synthesize the contract and
//! the stub set. Pure and synchronous.

use crate::errors::{PipelineError, PipelineStage};
use crate::openapi::{synthesize, OpenApiDocument};
use crate::stubs::{synthesize_stubs, MockStub, StubOptions};
use crate::traffic::{group_by_endpoint, parse_str, EndpointGroup};
use tracing::{info, info_span};

#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub stubs: StubOptions,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            title: "Recorded API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            stubs: StubOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub interaction_count: usize,
    pub groups: Vec<EndpointGroup>,
    pub contract: OpenApiDocument,
    pub stubs: Vec<MockStub>,
}

/// Turn a raw traffic log into a contract and a stub set.
pub fn synthesize_from_traffic(
    input: &str,
    settings: &SynthesisSettings,
) -> Result<SynthesisOutput, PipelineError> {
    let interactions = {
        let _span = info_span!("pipeline.stage", stage = PipelineStage::Parse.as_str()).entered();
        parse_str(input).map_err(|e| PipelineError::new(PipelineStage::Parse, e))?
    };

    let _span = info_span!("pipeline.stage", stage = PipelineStage::Synthesis.as_str()).entered();
    let groups = group_by_endpoint(&interactions);
    let contract = synthesize(
        &groups,
        &settings.title,
        &settings.version,
        settings.description.as_deref(),
    )
    .map_err(|e| PipelineError::new(PipelineStage::Synthesis, e))?;
    let stubs = synthesize_stubs(&groups, &settings.stubs);

    info!(
        interactions = interactions.len(),
        groups = groups.len(),
        operations = contract.operation_count(),
        stubs = stubs.len(),
        "Synthesized contract and stubs from traffic"
    );

    Ok(SynthesisOutput {
        interaction_count: interactions.len(),
        groups,
        contract,
        stubs,
    })
}
