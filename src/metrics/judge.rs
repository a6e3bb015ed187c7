// src/metrics/judge.rs - LLM judge used by critique metrics

use std::sync::Arc;
use std::time::Duration;

use crate::infra::errors::LinguaMetricaError;
use crate::provider::{ChatRequest, ChatResponse, Message, ModelProvider};
use crate::util::{truncate_str, with_timeout};

/// Fixed critique prompt; `criteria`, `input` and `response` are bound per call.
pub const CRITIQUE_TEMPLATE: &str = include_str!("templates/critique.txt");

/// A judge model plus the critique prompt it is driven with.
///
/// Holds no per-call state, so one judge can serve concurrent collections.
#[derive(Clone)]
pub struct Judge {
    provider: Arc<dyn ModelProvider>,
    model: String,
    timeout: Option<Duration>,
}

impl Judge {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the judge to rate `response` to `input` against `criteria`.
    /// Returns the raw reply; the caller decides whether it is usable.
    pub async fn critique(
        &self,
        criteria: &str,
        input: &str,
        response: &str,
    ) -> Result<ChatResponse, LinguaMetricaError> {
        let prompt = render_critique(criteria, input, response)?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::system(prompt)],
            max_tokens: Some(32),
            temperature: Some(0.0),
            system: None,
        };

        let reply = with_timeout("judge call", self.timeout, self.provider.chat(request)).await??;

        tracing::debug!(
            "Judge {} replied '{}' ({} tokens)",
            self.model,
            truncate_str(reply.content.trim(), 80),
            reply.usage.total()
        );

        Ok(reply)
    }
}

/// Render the critique prompt for one judge call.
pub fn render_critique(
    criteria: &str,
    input: &str,
    response: &str,
) -> Result<String, LinguaMetricaError> {
    let env = minijinja::Environment::new();
    env.render_str(
        CRITIQUE_TEMPLATE,
        minijinja::context! {
            criteria => criteria.trim(),
            input => input,
            response => response,
        },
    )
    .map_err(|e| LinguaMetricaError::Other(anyhow::anyhow!("critique template: {e}")))
}
