// src/provider/openai.rs - OpenAI Chat Completions provider

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, TokenUsage};
use crate::infra::errors::LinguaMetricaError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.into())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LinguaMetricaError> {
        let body = build_chat_body(&request, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LinguaMetricaError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
            })?;

        read_chat_response("openai", response).await
    }
}

/// Build the Chat Completions request body. Azure deployments fix the model
/// in the URL, so the `model` field is optional.
pub(crate) fn build_chat_body(request: &ChatRequest, include_model: bool) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        messages.push(serde_json::json!({
            "role": "system",
            "content": system,
        }));
    }

    for m in &request.messages {
        messages.push(serde_json::json!({
            "role": m.role.as_str(),
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({ "messages": messages });

    if include_model {
        body["model"] = serde_json::json!(request.model);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }

    body
}

/// Turn an HTTP response into a `ChatResponse`. Any non-success status,
/// rate limits included, is a provider error carrying the response body.
pub(crate) async fn read_chat_response(
    provider: &str,
    response: reqwest::Response,
) -> Result<ChatResponse, LinguaMetricaError> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(LinguaMetricaError::Provider {
            provider: provider.into(),
            message: format!("HTTP {}: {}", status, error_body),
        });
    }

    let resp: serde_json::Value =
        response
            .json()
            .await
            .map_err(|e| LinguaMetricaError::Provider {
                provider: provider.into(),
                message: format!("Failed to parse response: {}", e),
            })?;

    parse_chat_completion(provider, &resp)
}

pub(crate) fn parse_chat_completion(
    provider: &str,
    resp: &serde_json::Value,
) -> Result<ChatResponse, LinguaMetricaError> {
    let choice = &resp["choices"][0];
    if choice.is_null() {
        return Err(LinguaMetricaError::Provider {
            provider: provider.into(),
            message: "Response contained no choices".into(),
        });
    }

    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        _ => StopReason::Unknown,
    };

    Ok(ChatResponse {
        content,
        usage,
        stop_reason,
    })
}
