// src/core/session.rs - Evaluation session: setup, execution, aggregation

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::testcase::{TestCase, TestResult};
use crate::harness::{PipelineRegistry, TestHarness};
use crate::infra::config::ProjectConfig;
use crate::infra::errors::LinguaMetricaError;
use crate::metrics::Metric;
use crate::provider::resolver::ProviderSettings;

/// Name of the directory holding one YAML file per test case.
pub const DATA_DIR_NAME: &str = "data";

/// Summary of one metric across all test cases that produced a score for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub name: String,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl MetricSummary {
    /// Summarize `scores`. An empty slice cannot be summarized.
    pub fn from_scores(name: &str, scores: &[f64]) -> Result<Self, LinguaMetricaError> {
        if scores.is_empty() {
            return Err(LinguaMetricaError::EmptyAggregation {
                metric: name.to_string(),
            });
        }

        let sum: f64 = scores.iter().sum();
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            name: name.to_string(),
            mean: sum / scores.len() as f64,
            max,
            min,
        })
    }
}

/// Everything known about a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// One entry per configured metric, in configured order.
    pub metrics: Vec<MetricSummary>,
    /// Wall-clock time of the execution phase (metric setup excluded).
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub test_cases: usize,
    pub failed_cases: usize,
    pub results: Vec<TestResult>,
}

impl SessionSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

/// Durations are reported as (fractional) seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Ready,
    Finished,
}

/// A single run of the evaluation: initialize metrics, run every test case
/// through the harness, then summarize the scores.
pub struct Session {
    project_config: ProjectConfig,
    harness: TestHarness,
    metrics: Vec<Metric>,
    test_cases: Vec<TestCase>,
    test_results: Vec<TestResult>,
    provider_settings: Option<ProviderSettings>,
    state: SessionState,
}

impl Session {
    pub fn new(
        project_config: ProjectConfig,
        harness: TestHarness,
        metrics: Vec<Metric>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            project_config,
            harness,
            metrics,
            test_cases,
            test_results: Vec::new(),
            provider_settings: None,
            state: SessionState::Ready,
        }
    }

    /// Build a session from a project directory using the built-in pipelines.
    pub fn from_directory(project_dir: impl AsRef<Path>) -> Result<Self, LinguaMetricaError> {
        Self::from_directory_with(project_dir, &PipelineRegistry::with_builtins())
    }

    /// Build a session from a project directory, resolving the configured
    /// module reference in `registry`.
    pub fn from_directory_with(
        project_dir: impl AsRef<Path>,
        registry: &PipelineRegistry,
    ) -> Result<Self, LinguaMetricaError> {
        let project_dir = project_dir.as_ref();

        let project_config = ProjectConfig::load(project_dir)?;
        let test_cases = load_project_data(project_dir)?;
        let harness =
            TestHarness::from_reference(&project_config.module, registry, &project_config)?;
        let metrics = load_metrics(&project_config);

        tracing::info!(
            "Loaded project {} ({:?}): {} test case(s), metrics [{}]",
            project_dir.display(),
            project_config.kind,
            test_cases.len(),
            metrics
                .iter()
                .map(Metric::name)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self::new(project_config, harness, metrics, test_cases))
    }

    /// Build judges from `settings` instead of the process environment.
    pub fn with_provider_settings(mut self, settings: ProviderSettings) -> Self {
        self.provider_settings = Some(settings);
        self
    }

    pub fn project_config(&self) -> &ProjectConfig {
        &self.project_config
    }

    pub fn harness(&self) -> &TestHarness {
        &self.harness
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Results of the last run, in test-case order.
    pub fn test_results(&self) -> &[TestResult] {
        &self.test_results
    }

    /// Run the session. A session runs at most once.
    pub async fn run(&mut self) -> Result<SessionSummary, LinguaMetricaError> {
        if self.state == SessionState::Finished {
            return Err(LinguaMetricaError::SessionReused);
        }
        self.state = SessionState::Finished;

        // Setup failures abort the whole session.
        for metric in &mut self.metrics {
            match &self.provider_settings {
                Some(settings) => metric.init_with(&self.project_config, settings)?,
                None => metric.init(&self.project_config)?,
            }
        }

        let started_at = Utc::now();
        let start = Instant::now();
        self.test_results = self.run_test_cases().await;
        let duration = start.elapsed();
        let finished_at = Utc::now();

        let summary = self.build_summary(started_at, finished_at, duration)?;
        tracing::info!(
            "Session {} finished: {} case(s), {} failed, {:.2}s",
            summary.session_id,
            summary.test_cases,
            summary.failed_cases,
            summary.duration.as_secs_f64()
        );
        Ok(summary)
    }

    async fn run_test_cases(&self) -> Vec<TestResult> {
        let concurrency = self.project_config.settings.concurrency.max(1);
        let total = self.test_cases.len();
        let metrics = self.metrics.as_slice();
        let harness = &self.harness;

        // `buffered` yields in input order regardless of completion order.
        futures::stream::iter(self.test_cases.iter().enumerate())
            .map(|(index, test_case)| async move {
                tracing::info!("[{}/{}] Running test case {}", index + 1, total, test_case.id);
                test_case.run(metrics, harness).await
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    fn build_summary(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        duration: Duration,
    ) -> Result<SessionSummary, LinguaMetricaError> {
        let metrics = self
            .project_config
            .metrics
            .iter()
            .map(|kind| {
                let name = kind.as_str();
                let scores: Vec<f64> = self
                    .test_results
                    .iter()
                    .filter_map(|result| result.score(name))
                    .collect();
                MetricSummary::from_scores(name, &scores)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SessionSummary {
            session_id: uuid::Uuid::new_v4().to_string(),
            metrics,
            duration,
            started_at,
            finished_at,
            test_cases: self.test_results.len(),
            failed_cases: self.test_results.iter().filter(|r| r.is_failed()).count(),
            results: self.test_results.clone(),
        })
    }
}

/// Load every test case under `<project>/data`, ordered by file name.
/// Hidden files are skipped.
fn load_project_data(project_dir: &Path) -> Result<Vec<TestCase>, LinguaMetricaError> {
    let data_dir = project_dir.join(DATA_DIR_NAME);
    if !data_dir.is_dir() {
        return Err(LinguaMetricaError::Config(format!(
            "test case directory {} does not exist",
            data_dir.display()
        )));
    }

    let entries = std::fs::read_dir(&data_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, _>>()?;

    // Anything that is not a directory is a case file; one that cannot be
    // read fails the load instead of vanishing from the run.
    let mut files: Vec<PathBuf> = entries
        .into_iter()
        .filter(|path| !path.is_dir())
        .filter(|path| {
            !path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut seen = HashSet::new();
    let mut test_cases = Vec::with_capacity(files.len());
    for file in &files {
        let test_case = TestCase::load(file)?;
        if !seen.insert(test_case.id.clone()) {
            return Err(LinguaMetricaError::Config(format!(
                "duplicate test case id '{}' in {}",
                test_case.id,
                file.display()
            )));
        }
        test_cases.push(test_case);
    }

    tracing::debug!(
        "Loaded {} test case(s) from {}",
        test_cases.len(),
        data_dir.display()
    );
    Ok(test_cases)
}

fn load_metrics(project_config: &ProjectConfig) -> Vec<Metric> {
    project_config
        .metrics
        .iter()
        .map(|kind| Metric::new(*kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_metric_summary_aggregation() {
        let summary = MetricSummary::from_scores("harmfulness", &[0.2, 0.8, 0.5]).unwrap();
        assert_eq!(summary.name, "harmfulness");
        assert!((summary.mean - 0.5).abs() < 1e-9);
        assert_eq!(summary.min, 0.2);
        assert_eq!(summary.max, 0.8);
    }

    #[test]
    fn test_metric_summary_single_score() {
        let summary = MetricSummary::from_scores("maliciousness", &[0.4]).unwrap();
        assert_eq!(summary.mean, 0.4);
        assert_eq!(summary.min, 0.4);
        assert_eq!(summary.max, 0.4);
    }

    #[test]
    fn test_metric_summary_empty_fails() {
        let err = MetricSummary::from_scores("harmfulness", &[]).unwrap_err();
        assert!(matches!(err, LinguaMetricaError::EmptyAggregation { .. }));
    }

    #[test]
    fn test_summary_duration_serializes_as_seconds() {
        let now = Utc::now();
        let summary = SessionSummary {
            session_id: "s-1".into(),
            metrics: vec![MetricSummary {
                name: "test".into(),
                mean: 0.5,
                max: 1.0,
                min: 0.0,
            }],
            duration: Duration::from_millis(15_250),
            started_at: now,
            finished_at: now,
            test_cases: 1,
            failed_cases: 0,
            results: vec![],
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["duration"], 15.25);
        assert!(json["started_at"].as_str().unwrap().contains('T'));

        let parsed: SessionSummary = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn test_load_project_data_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join(DATA_DIR_NAME);
        std::fs::create_dir_all(&data).unwrap();

        for (file, id) in [("b.yaml", "second"), ("a.yml", "first"), ("c.yaml", "third")] {
            TestCase::new(id, "Hello").save(&data.join(file)).unwrap();
        }
        std::fs::write(data.join(".DS_Store"), "garbage").unwrap();
        std::fs::create_dir(data.join("nested")).unwrap();

        let cases = load_project_data(dir.path()).unwrap();
        let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_load_project_data_rejects_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join(DATA_DIR_NAME);
        std::fs::create_dir_all(&data).unwrap();
        TestCase::new("same", "one").save(&data.join("1.yaml")).unwrap();
        TestCase::new("same", "two").save(&data.join("2.yaml")).unwrap();

        assert!(load_project_data(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_load_project_data_reports_unreadable_case() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join(DATA_DIR_NAME);
        std::fs::create_dir_all(&data).unwrap();
        TestCase::new("ok", "Hello").save(&data.join("a.yaml")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.yaml"), data.join("b.yaml")).unwrap();

        match load_project_data(dir.path()) {
            Err(LinguaMetricaError::TestCaseLoad { path, .. }) => {
                assert_eq!(path, data.join("b.yaml"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_load_project_data_requires_data_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_project_data(dir.path()),
            Err(LinguaMetricaError::Config(_))
        ));
    }
}
