// src/harness/pipeline.rs - Pipeline abstraction and built-in stages

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::provider::{ChatRequest, Message, ModelProvider};

/// The two named input slots every pipeline receives.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub input: String,
    pub history: Vec<Message>,
}

/// Whatever a pipeline produced. The harness reduces it to text.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Text(String),
    Message(Message),
    Json(serde_json::Value),
}

impl PipelineOutput {
    /// Coerce to plain text: message content, bare JSON strings unquoted,
    /// other JSON values in compact form.
    pub fn into_text(self) -> String {
        match self {
            PipelineOutput::Text(text) => text,
            PipelineOutput::Message(message) => message.content,
            PipelineOutput::Json(serde_json::Value::String(s)) => s,
            PipelineOutput::Json(value) => value.to_string(),
        }
    }
}

/// An opaque callable mapping prompt + history to a response.
///
/// Pipelines are shared between concurrently running test cases and must not
/// keep per-call mutable state.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn invoke(&self, input: PipelineInput) -> anyhow::Result<PipelineOutput>;

    /// True when the pipeline already ends in a text-producing stage.
    fn produces_text(&self) -> bool {
        false
    }
}

/// Terminal stage that turns any pipeline output into `PipelineOutput::Text`.
pub struct TextOutput {
    inner: Arc<dyn Pipeline>,
}

impl TextOutput {
    /// Append a text stage unless the pipeline already has one.
    pub fn wrap(pipeline: Arc<dyn Pipeline>) -> Arc<dyn Pipeline> {
        if pipeline.produces_text() {
            pipeline
        } else {
            Arc::new(TextOutput { inner: pipeline })
        }
    }
}

#[async_trait]
impl Pipeline for TextOutput {
    async fn invoke(&self, input: PipelineInput) -> anyhow::Result<PipelineOutput> {
        let output = self.inner.invoke(input).await?;
        Ok(PipelineOutput::Text(output.into_text()))
    }

    fn produces_text(&self) -> bool {
        true
    }
}

/// Adapts an async closure into a [`Pipeline`].
pub struct FnPipeline<F> {
    f: F,
}

/// Build a pipeline from `|input| async move { ... }`.
pub fn pipeline_fn<F, Fut>(f: F) -> FnPipeline<F>
where
    F: Fn(PipelineInput) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<PipelineOutput>> + Send + 'static,
{
    FnPipeline { f }
}

#[async_trait]
impl<F, Fut> Pipeline for FnPipeline<F>
where
    F: Fn(PipelineInput) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<PipelineOutput>> + Send + 'static,
{
    async fn invoke(&self, input: PipelineInput) -> anyhow::Result<PipelineOutput> {
        (self.f)(input).await
    }
}

/// System prompt of the built-in sample assistant.
pub const SAMPLE_SYSTEM_PROMPT: &str =
    "You're a digital assistant, you're here to help me write stuff.";

/// A system prompt, the conversation history and the user input sent to a
/// chat model. Returns the assistant message.
pub struct ChatPipeline {
    provider: Arc<dyn ModelProvider>,
    model: String,
    system_prompt: String,
}

impl ChatPipeline {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    fn build_request(&self, input: PipelineInput) -> ChatRequest {
        let mut messages = input.history;
        messages.push(Message::user(input.input));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: None,
            temperature: None,
            system: Some(self.system_prompt.clone()),
        }
    }
}

#[async_trait]
impl Pipeline for ChatPipeline {
    async fn invoke(&self, input: PipelineInput) -> anyhow::Result<PipelineOutput> {
        let request = self.build_request(input);
        let response = self.provider.chat(request).await?;
        tracing::trace!(
            "{} replied with {} tokens",
            self.provider.name(),
            response.usage.output_tokens
        );
        Ok(PipelineOutput::Message(Message::assistant(response.content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::errors::LinguaMetricaError;
    use crate::provider::{ChatResponse, Role};
    use std::sync::Mutex;

    struct RecordingProvider {
        requests: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ModelProvider for RecordingProvider {
        fn id(&self) -> &str {
            "recording"
        }

        fn name(&self) -> &str {
            "Recording Provider"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LinguaMetricaError> {
            self.requests.lock().unwrap().push(request);
            Ok(ChatResponse {
                content: "Sure, here is a draft.".into(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_into_text() {
        assert_eq!(PipelineOutput::Text("a".into()).into_text(), "a");
        assert_eq!(
            PipelineOutput::Message(Message::assistant("b")).into_text(),
            "b"
        );
        assert_eq!(
            PipelineOutput::Json(serde_json::json!("c")).into_text(),
            "c"
        );
        assert_eq!(
            PipelineOutput::Json(serde_json::json!({"answer": 42})).into_text(),
            r#"{"answer":42}"#
        );
    }

    #[tokio::test]
    async fn test_text_output_coerces_messages() {
        let inner: Arc<dyn Pipeline> = Arc::new(pipeline_fn(|_input| async {
            Ok(PipelineOutput::Message(Message::assistant("Hello there")))
        }));
        let wrapped = TextOutput::wrap(inner);
        assert!(wrapped.produces_text());

        let output = wrapped
            .invoke(PipelineInput {
                input: "Hi".into(),
                history: vec![],
            })
            .await
            .unwrap();
        assert_eq!(output, PipelineOutput::Text("Hello there".into()));
    }

    #[test]
    fn test_text_output_wrap_is_idempotent() {
        let inner: Arc<dyn Pipeline> = Arc::new(pipeline_fn(|input: PipelineInput| async move {
            Ok(PipelineOutput::Text(input.input))
        }));
        let once = TextOutput::wrap(inner);
        let twice = TextOutput::wrap(once.clone());
        assert!(Arc::ptr_eq(&once, &twice));
    }

    #[tokio::test]
    async fn test_chat_pipeline_request_layout() {
        let provider = Arc::new(RecordingProvider {
            requests: Mutex::new(Vec::new()),
        });
        let pipeline = ChatPipeline::new(provider.clone(), "gpt-3.5-turbo", SAMPLE_SYSTEM_PROMPT);

        let output = pipeline
            .invoke(PipelineInput {
                input: "Write a tagline".into(),
                history: vec![Message::user("Hello"), Message::assistant("Hi!")],
            })
            .await
            .unwrap();
        assert_eq!(
            output,
            PipelineOutput::Message(Message::assistant("Sure, here is a draft."))
        );

        let requests = provider.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.system.as_deref(), Some(SAMPLE_SYSTEM_PROMPT));
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.messages[2].content, "Write a tagline");
    }
}
