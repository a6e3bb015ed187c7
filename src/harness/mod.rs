// src/harness/mod.rs - Test harness hosting the pipeline under test

pub mod pipeline;
pub mod registry;

pub use pipeline::{
    pipeline_fn, ChatPipeline, FnPipeline, Pipeline, PipelineInput, PipelineOutput, TextOutput,
};
pub use registry::{PipelineFactory, PipelineRegistry, SAMPLE_PIPELINE};

use std::sync::Arc;
use std::time::Duration;

use crate::infra::config::{ModuleRef, ProjectConfig};
use crate::infra::errors::LinguaMetricaError;
use crate::provider::Message;
use crate::util::with_timeout;

/// Hosts a pipeline so test cases can inject chat history and input, and
/// always get plain text back.
#[derive(Clone)]
pub struct TestHarness {
    pipeline: Arc<dyn Pipeline>,
    timeout: Option<Duration>,
}

impl TestHarness {
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            pipeline: TextOutput::wrap(pipeline),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a harness for the pipeline registered under `reference`.
    pub fn from_reference(
        reference: &ModuleRef,
        registry: &PipelineRegistry,
        config: &ProjectConfig,
    ) -> Result<Self, LinguaMetricaError> {
        let pipeline = registry.resolve(reference, config)?;
        tracing::info!("Harness bound to pipeline {}", reference);
        Ok(Self::new(pipeline).with_timeout(config.settings.timeout()))
    }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    /// Generate a response for `prompt` given the conversation so far.
    /// No retries; errors and timeouts go back to the caller.
    pub async fn invoke(&self, prompt: &str, history: &[Message]) -> anyhow::Result<String> {
        let input = PipelineInput {
            input: prompt.to_string(),
            history: history.to_vec(),
        };

        let output = with_timeout(
            "pipeline invocation",
            self.timeout,
            self.pipeline.invoke(input),
        )
        .await??;

        Ok(output.into_text())
    }
}
