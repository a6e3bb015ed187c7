// src/provider/azure.rs - Azure OpenAI deployment provider

use async_trait::async_trait;

use super::openai::{build_chat_body, read_chat_response};
use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::LinguaMetricaError;

/// Talks to a single Azure OpenAI deployment. The deployment fixes the model,
/// so `ChatRequest::model` is ignored.
pub struct AzureOpenAIProvider {
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureOpenAIProvider {
    pub fn new(api_key: String, endpoint: String, deployment: String, api_version: String) -> Self {
        Self {
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_version,
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl ModelProvider for AzureOpenAIProvider {
    fn id(&self) -> &str {
        "azure"
    }

    fn name(&self) -> &str {
        "Azure OpenAI"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LinguaMetricaError> {
        let body = build_chat_body(&request, false);

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LinguaMetricaError::Provider {
                provider: "azure".into(),
                message: e.to_string(),
            })?;

        read_chat_response("azure", response).await
    }
}
