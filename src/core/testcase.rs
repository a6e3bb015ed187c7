// src/core/testcase.rs - A single fixture run against the pipeline under test

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use crate::harness::TestHarness;
use crate::infra::errors::LinguaMetricaError;
use crate::metrics::Metric;
use crate::provider::Message;
use crate::util::panic_message;

/// The role of a message in a recorded conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Assistant,
    User,
}

/// A message in a recorded conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub content: String,
    pub role: MessageRole,
}

impl MessageData {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: MessageRole::User,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: MessageRole::Assistant,
        }
    }

    /// Map to the harness message representation (user -> human turn).
    pub fn to_message(&self) -> Message {
        match self.role {
            MessageRole::User => Message::user(self.content.clone()),
            MessageRole::Assistant => Message::assistant(self.content.clone()),
        }
    }
}

/// Outcome of one test case: either a set of scores or an error, never both.
///
/// A metric that failed to produce a score is absent from `scores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case: String,
    pub scores: BTreeMap<String, f64>,
    pub error: Option<String>,
}

impl TestResult {
    pub fn scored(test_case: impl Into<String>, scores: BTreeMap<String, f64>) -> Self {
        Self {
            test_case: test_case.into(),
            scores,
            error: None,
        }
    }

    pub fn failed(test_case: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            test_case: test_case.into(),
            scores: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn score(&self, metric: &str) -> Option<f64> {
        self.scores.get(metric).copied()
    }
}

/// A test case to run against a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<MessageData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: None,
            context: None,
            input: input.into(),
            output: None,
        }
    }

    pub fn with_history(mut self, history: Vec<MessageData>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Load a test case from a YAML file.
    pub fn load(path: &Path) -> Result<Self, LinguaMetricaError> {
        let load_error = |message: String| LinguaMetricaError::TestCaseLoad {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let test_case: TestCase =
            serde_yml::from_str(&content).map_err(|e| load_error(e.to_string()))?;

        if test_case.id.trim().is_empty() {
            return Err(load_error("test case id is empty".into()));
        }

        Ok(test_case)
    }

    /// Write the test case as YAML.
    pub fn save(&self, path: &Path) -> Result<(), LinguaMetricaError> {
        let content = serde_yml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn has_history(&self) -> bool {
        self.history.as_ref().is_some_and(|h| !h.is_empty())
    }

    /// History in harness representation, in conversation order.
    pub fn history_messages(&self) -> Vec<Message> {
        match &self.history {
            Some(history) if !history.is_empty() => {
                history.iter().map(MessageData::to_message).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Generate a response for this case and collect every metric on it.
    ///
    /// Never fails: a harness error, timeout or panic becomes a failed
    /// `TestResult` so the rest of the session carries on.
    pub async fn run(&self, metrics: &[Metric], harness: &TestHarness) -> TestResult {
        let outcome = AssertUnwindSafe(self.collect_scores(metrics, harness))
            .catch_unwind()
            .await;

        let cause = match outcome {
            Ok(Ok(scores)) => {
                tracing::debug!("Test case {} scored {:?}", self.id, scores);
                return TestResult::scored(&self.id, scores);
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => format!("pipeline panicked: {}", panic_message(panic.as_ref())),
        };

        tracing::warn!("Test case {} failed: {}", self.id, cause);
        TestResult::failed(&self.id, format!("Error while running the test case: {cause}"))
    }

    async fn collect_scores(
        &self,
        metrics: &[Metric],
        harness: &TestHarness,
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        let history = self.history_messages();
        let response = harness.invoke(&self.input, &history).await?;

        let mut scores = BTreeMap::new();
        for metric in metrics {
            if let Some(score) = metric
                .collect(&self.input, &response, self.context.as_deref())
                .await
            {
                scores.insert(metric.name().to_string(), score);
            }
        }

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{pipeline_fn, PipelineInput, PipelineOutput};
    use crate::infra::config::MetricKind;
    use crate::metrics::judge::Judge;
    use crate::provider::{ChatRequest, ChatResponse, ModelProvider, Role};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct FixedJudge(&'static str);

    #[async_trait]
    impl ModelProvider for FixedJudge {
        fn id(&self) -> &str {
            "fixed"
        }

        fn name(&self) -> &str {
            "Fixed Judge"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LinguaMetricaError> {
            Ok(ChatResponse {
                content: self.0.into(),
                ..Default::default()
            })
        }
    }

    struct PanickingJudge;

    #[async_trait]
    impl ModelProvider for PanickingJudge {
        fn id(&self) -> &str {
            "panicking"
        }

        fn name(&self) -> &str {
            "Panicking Judge"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LinguaMetricaError> {
            panic!("judge client bug")
        }
    }

    fn metric(kind: MetricKind, reply: &'static str) -> Metric {
        Metric::new(kind).with_judge(Judge::new(Arc::new(FixedJudge(reply)), "fixed"))
    }

    /// Harness that records the history it was invoked with.
    fn recording_harness() -> (TestHarness, Arc<Mutex<Vec<Vec<Message>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let harness = TestHarness::new(Arc::new(pipeline_fn(move |input: PipelineInput| {
            recorded.lock().unwrap().push(input.history);
            async { Ok(PipelineOutput::Text("Hello, How are you?".into())) }
        })));
        (harness, calls)
    }

    #[tokio::test]
    async fn test_run_testcase() {
        let (harness, calls) = recording_harness();
        let test_case = TestCase::new("test-1", "Hello, How are you?").with_history(vec![]);

        let result = test_case
            .run(&[metric(MetricKind::Harmfulness, "0.5")], &harness)
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.test_case, "test-1");
        assert_eq!(result.score("harmfulness"), Some(0.5));
        assert_eq!(calls.lock().unwrap()[0], Vec::<Message>::new());
    }

    #[tokio::test]
    async fn test_judge_panic_costs_only_its_metric() {
        let (harness, _calls) = recording_harness();
        let metrics = [
            metric(MetricKind::Harmfulness, "0.3"),
            Metric::new(MetricKind::Maliciousness)
                .with_judge(Judge::new(Arc::new(PanickingJudge), "panicking")),
        ];

        let result = TestCase::new("test-1", "Hello").run(&metrics, &harness).await;

        assert_eq!(result.error, None);
        assert_eq!(result.score("harmfulness"), Some(0.3));
        assert_eq!(result.score("maliciousness"), None);
        assert_eq!(result.scores.len(), 1);
    }

    #[tokio::test]
    async fn test_absent_history_is_empty() {
        let (harness, calls) = recording_harness();
        let test_case = TestCase::new("test-1", "Hi");
        assert!(!test_case.has_history());

        test_case.run(&[], &harness).await;
        assert!(calls.lock().unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn test_run_test_case_with_history() {
        let (harness, calls) = recording_harness();
        let test_case = TestCase::new("test-1", "Hello, How are you?").with_history(vec![
            MessageData::user("Hello"),
            MessageData::assistant("Hello, how can I help you today?"),
            MessageData::user("Tell me about owls"),
        ]);

        let result = test_case
            .run(&[metric(MetricKind::Harmfulness, "0.5")], &harness)
            .await;
        assert!(result.error.is_none());

        let history = &calls.lock().unwrap()[0];
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(history[1].content, "Hello, how can I help you today?");
        assert_eq!(history[2].content, "Tell me about owls");
    }

    #[tokio::test]
    async fn test_harness_failure_is_captured() {
        let harness = TestHarness::new(Arc::new(pipeline_fn(|_input| async {
            Err::<PipelineOutput, _>(anyhow::anyhow!("upstream returned 502"))
        })));
        let test_case = TestCase::new("broken", "Hi");

        let result = test_case
            .run(&[metric(MetricKind::Harmfulness, "0.5")], &harness)
            .await;

        assert!(result.is_failed());
        assert!(result.scores.is_empty());
        let error = result.error.unwrap();
        assert!(error.starts_with("Error while running the test case:"));
        assert!(error.contains("upstream returned 502"));
    }

    #[tokio::test]
    async fn test_pipeline_panic_is_captured() {
        let harness = TestHarness::new(Arc::new(pipeline_fn(|input: PipelineInput| async move {
            if input.history.is_empty() {
                panic!("index out of bounds");
            }
            Ok(PipelineOutput::Text(input.input))
        })));

        let result = TestCase::new("panics", "Hi").run(&[], &harness).await;
        assert!(result.scores.is_empty());
        assert!(result.error.unwrap().contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_failed_metric_is_omitted() {
        let (harness, _) = recording_harness();
        let metrics = [
            metric(MetricKind::Harmfulness, "0.2"),
            metric(MetricKind::Maliciousness, "definitely not a number"),
        ];

        let result = TestCase::new("partial", "Hi").run(&metrics, &harness).await;

        assert!(result.error.is_none());
        assert_eq!(result.scores.len(), 1);
        assert_eq!(result.score("harmfulness"), Some(0.2));
        assert!(!result.scores.contains_key("maliciousness"));
    }

    #[test]
    fn test_load_testcase() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test-case-1.yaml");
        std::fs::write(
            &path,
            "id: test-1\nhistory: []\ninput: Hello, How are you?\n",
        )
        .unwrap();

        let test_case = TestCase::load(&path).unwrap();
        assert_eq!(test_case.id, "test-1");
        assert_eq!(test_case.input, "Hello, How are you?");
        assert_eq!(test_case.history.as_ref().map(Vec::len), Some(0));
        assert!(test_case.context.is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("case.yaml");
        let original = TestCase::new("conv-7", "And in French?")
            .with_history(vec![
                MessageData::user("Translate 'cat' to German"),
                MessageData::assistant("Katze"),
            ])
            .with_context("Glossary: cat = Katze = chat")
            .with_output("chat");

        original.save(&path).unwrap();
        assert_eq!(TestCase::load(&path).unwrap(), original);
    }

    #[test]
    fn test_load_rejects_missing_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "id: no-input\n").unwrap();

        let err = TestCase::load(&path).unwrap_err();
        assert!(matches!(err, LinguaMetricaError::TestCaseLoad { .. }));
    }

    #[test]
    fn test_load_rejects_unknown_role() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad-role.yaml");
        std::fs::write(
            &path,
            "id: x\ninput: hi\nhistory:\n  - role: system\n    content: be nice\n",
        )
        .unwrap();

        assert!(TestCase::load(&path).is_err());
    }
}
