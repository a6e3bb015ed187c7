// src/metrics/mod.rs - Metrics collected for every test case
//
// The metric set is closed: every variant is an aspect critique, scored by a
// judge model against the rubric of its aspect.

pub mod judge;
pub mod parser;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

use crate::infra::config::{MetricKind, ProjectConfig};
use crate::infra::errors::LinguaMetricaError;
use crate::provider::resolver::{create_provider, ProviderSettings};
use crate::provider::StopReason;
use crate::util::panic_message;
use judge::Judge;

const HARMFULNESS_RUBRIC: &str = include_str!("templates/harmfulness.txt");
const MALICIOUSNESS_RUBRIC: &str = include_str!("templates/maliciousness.txt");

/// Why a metric produced no score. Only surfaced in logs; `collect` turns it
/// into `None`.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("metric was collected before init()")]
    NotInitialized,

    #[error("judge call failed: {0}")]
    Judge(#[from] LinguaMetricaError),

    #[error("judge panicked: {0}")]
    Panicked(String),

    #[error("judge reply was blocked by the content filter")]
    Filtered,

    #[error("judge reply '{reply}' was cut off at the token limit")]
    Truncated { reply: String },

    #[error("judge reply '{reply}' is not a number")]
    Unparseable { reply: String },

    #[error("judge score {score} is outside [0, 1]")]
    OutOfRange { score: f64 },
}

/// Shared judged-critique protocol. Variants differ only in their rubric.
#[derive(Clone)]
pub struct AspectCritique {
    aspect: MetricKind,
    judge: Option<Judge>,
}

impl AspectCritique {
    fn new(aspect: MetricKind) -> Self {
        Self {
            aspect,
            judge: None,
        }
    }

    pub fn criteria(&self) -> &'static str {
        match self.aspect {
            MetricKind::Harmfulness => HARMFULNESS_RUBRIC,
            MetricKind::Maliciousness => MALICIOUSNESS_RUBRIC,
        }
    }

    /// A failing or panicking judge costs only this metric's score.
    async fn score(&self, prompt: &str, output: &str) -> Result<f64, CollectError> {
        let judge = self.judge.as_ref().ok_or(CollectError::NotInitialized)?;
        let reply = AssertUnwindSafe(judge.critique(self.criteria(), prompt, output))
            .catch_unwind()
            .await
            .map_err(|panic| CollectError::Panicked(panic_message(panic.as_ref())))??;

        match reply.stop_reason {
            StopReason::ContentFilter => Err(CollectError::Filtered),
            StopReason::MaxTokens => Err(CollectError::Truncated {
                reply: reply.content,
            }),
            StopReason::EndTurn | StopReason::Unknown => parser::parse_score(&reply.content),
        }
    }
}

/// A metric that can be collected as part of a test case.
#[derive(Clone)]
pub enum Metric {
    /// How harmful the generated response is.
    Harmfulness(AspectCritique),
    /// How malicious or deceiving the generated response is.
    Maliciousness(AspectCritique),
}

impl Metric {
    pub fn new(kind: MetricKind) -> Self {
        let critique = AspectCritique::new(kind);
        match kind {
            MetricKind::Harmfulness => Metric::Harmfulness(critique),
            MetricKind::Maliciousness => Metric::Maliciousness(critique),
        }
    }

    /// Attach a judge up front. `init` keeps it instead of resolving one
    /// from the environment.
    pub fn with_judge(mut self, judge: Judge) -> Self {
        self.critique_mut().judge = Some(judge);
        self
    }

    fn critique(&self) -> &AspectCritique {
        match self {
            Metric::Harmfulness(c) | Metric::Maliciousness(c) => c,
        }
    }

    fn critique_mut(&mut self) -> &mut AspectCritique {
        match self {
            Metric::Harmfulness(c) | Metric::Maliciousness(c) => c,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.critique().aspect
    }

    /// Stable name, used as the aggregation key.
    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn is_initialized(&self) -> bool {
        self.critique().judge.is_some()
    }

    /// One-time setup: build the judge from the project's provider and the
    /// process environment.
    pub fn init(&mut self, config: &ProjectConfig) -> Result<(), LinguaMetricaError> {
        self.init_with(config, &ProviderSettings::from_env())
    }

    pub fn init_with(
        &mut self,
        config: &ProjectConfig,
        settings: &ProviderSettings,
    ) -> Result<(), LinguaMetricaError> {
        let name = self.name();
        let critique = self.critique_mut();

        if let Some(judge) = &critique.judge {
            tracing::debug!("Metric {} uses pre-configured judge {}", name, judge.model());
            return Ok(());
        }

        let resolved =
            create_provider(config.provider, settings).map_err(|e| LinguaMetricaError::MetricInit {
                metric: name.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Metric {} judged by {} ({})",
            name,
            resolved.provider.name(),
            resolved.model
        );
        critique.judge = Some(
            Judge::new(resolved.provider, resolved.model).with_timeout(config.settings.timeout()),
        );
        Ok(())
    }

    /// Score `output` (the response to `prompt`), reporting why no score was
    /// produced. `context` is accepted for grounding-aware metrics; the
    /// critique variants do not use it.
    pub async fn try_collect(
        &self,
        prompt: &str,
        output: &str,
        context: Option<&str>,
    ) -> Result<f64, CollectError> {
        tracing::trace!(
            "Collecting {} (context: {})",
            self.name(),
            context.is_some()
        );
        self.critique().score(prompt, output).await
    }

    /// Score `output`, or `None` if the judge call or reply parsing failed.
    /// Precondition: `init` has run.
    pub async fn collect(&self, prompt: &str, output: &str, context: Option<&str>) -> Option<f64> {
        match self.try_collect(prompt, output, context).await {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::warn!("Metric {} produced no score: {}", self.name(), e);
                None
            }
        }
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Get the metric with the given name.
pub fn get_metric(name: &str) -> Result<Metric, LinguaMetricaError> {
    Ok(Metric::new(name.parse()?))
}
