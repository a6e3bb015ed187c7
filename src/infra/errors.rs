// src/infra/errors.rs - Error types for LinguaMetrica

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinguaMetricaError {
    // Provider errors
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    // Configuration errors (fatal, before any session work)
    #[error("Could not find LinguaMetricaFile in {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Unsupported metric '{name}'. Supported metrics: harmfulness, maliciousness")]
    UnsupportedMetric { name: String },

    #[error("Invalid module reference '{reference}': {reason}")]
    InvalidModuleRef { reference: String, reason: String },

    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load test case {}: {message}", path.display())]
    TestCaseLoad { path: PathBuf, message: String },

    // Setup and resolution errors (fatal, abort the session)
    #[error("Could not resolve pipeline '{reference}': {message}")]
    HarnessResolution { reference: String, message: String },

    #[error("Failed to initialize metric '{metric}': {message}")]
    MetricInit { metric: String, message: String },

    // Aggregation errors (fatal, after execution)
    #[error("Metric '{metric}' has no collected scores, cannot summarize")]
    EmptyAggregation { metric: String },

    #[error("Session has already been run")]
    SessionReused,

    // Infra
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LinguaMetricaError {
    /// Configuration problems are reported before a session starts.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LinguaMetricaError::ConfigNotFound { .. }
                | LinguaMetricaError::UnsupportedMetric { .. }
                | LinguaMetricaError::InvalidModuleRef { .. }
                | LinguaMetricaError::InvalidOutput(_)
                | LinguaMetricaError::Config(_)
                | LinguaMetricaError::Yaml(_)
        )
    }
}
