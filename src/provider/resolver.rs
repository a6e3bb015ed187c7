// src/provider/resolver.rs - Build a chat provider from environment settings

use std::sync::Arc;

use super::azure::AzureOpenAIProvider;
use super::openai::{OpenAIProvider, DEFAULT_BASE_URL};
use super::ModelProvider;
use crate::infra::config::ProviderKind;
use crate::infra::errors::LinguaMetricaError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Provider credentials and model identifiers, read from the environment.
///
/// Kept as a plain struct so callers (and tests) can construct it without
/// touching process-wide state.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    pub azure_endpoint: Option<String>,
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL"),
            openai_base_url: var("OPENAI_BASE_URL"),
            azure_api_key: var("AZURE_OPENAI_API_KEY"),
            azure_deployment: var("AZURE_OPENAI_MODEL"),
            azure_api_version: var("AZURE_OPENAI_API_VERSION"),
            azure_endpoint: var("AZURE_OPENAI_ENDPOINT"),
        }
    }
}

/// A resolved provider together with the model id to request from it.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn ModelProvider>,
    pub model: String,
}

/// Build the provider selected by the project configuration.
///
/// OpenAI falls back to an empty key (requests then fail per call, not at
/// setup). Azure needs its endpoint, deployment and API version up front.
pub fn create_provider(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<ResolvedProvider, LinguaMetricaError> {
    match kind {
        ProviderKind::OpenAI => {
            let api_key = settings.openai_api_key.clone().unwrap_or_else(|| {
                tracing::warn!("OPENAI_API_KEY is not set; judge calls will be rejected");
                String::new()
            });
            let base_url = settings
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.into());
            let model = settings
                .openai_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into());

            tracing::debug!("Using OpenAI model {} at {}", model, base_url);
            Ok(ResolvedProvider {
                provider: Arc::new(OpenAIProvider::with_base_url(api_key, base_url)),
                model,
            })
        }
        ProviderKind::Azure => {
            let require = |value: &Option<String>, name: &str| {
                value.clone().ok_or_else(|| {
                    LinguaMetricaError::Config(format!(
                        "{name} must be set to use the Azure provider"
                    ))
                })
            };

            let api_key = require(&settings.azure_api_key, "AZURE_OPENAI_API_KEY")?;
            let endpoint = require(&settings.azure_endpoint, "AZURE_OPENAI_ENDPOINT")?;
            let deployment = require(&settings.azure_deployment, "AZURE_OPENAI_MODEL")?;
            let api_version = require(&settings.azure_api_version, "AZURE_OPENAI_API_VERSION")?;

            tracing::debug!("Using Azure deployment {} at {}", deployment, endpoint);
            Ok(ResolvedProvider {
                provider: Arc::new(AzureOpenAIProvider::new(
                    api_key,
                    endpoint,
                    deployment.clone(),
                    api_version,
                )),
                model: deployment,
            })
        }
    }
}
