// src/infra/config.rs - Project and output configuration (YAML)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::infra::errors::LinguaMetricaError;

/// Name of the project file inside a project directory.
pub const PROJECT_FILE_NAME: &str = "LinguaMetricaFile";

/// The kind of application under evaluation.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationKind {
    ChatApplication,
    LLM,
    KeyValue,
}

/// Which hosted model backs the judge (and the built-in sample pipeline).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Azure,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "OpenAI"),
            ProviderKind::Azure => write!(f, "Azure"),
        }
    }
}

/// The fixed set of metrics a project can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetricKind {
    Harmfulness,
    Maliciousness,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::Harmfulness, MetricKind::Maliciousness];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Harmfulness => "harmfulness",
            MetricKind::Maliciousness => "maliciousness",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = LinguaMetricaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| LinguaMetricaError::UnsupportedMetric { name: s.to_string() })
    }
}

impl TryFrom<String> for MetricKind {
    type Error = LinguaMetricaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MetricKind> for String {
    fn from(kind: MetricKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A `<module>:<binding>` reference naming the pipeline under test.
///
/// The module part is a dotted path of identifiers (`sample.llm`), the binding
/// a single identifier (`pipeline`). The reference is looked up in a
/// [`PipelineRegistry`](crate::harness::PipelineRegistry); nothing is loaded
/// from disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleRef {
    pub module: String,
    pub binding: String,
}

impl ModuleRef {
    pub fn new(module: impl Into<String>, binding: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            binding: binding.into(),
        }
    }

    /// Parse and validate a `<module>:<binding>` string.
    pub fn parse(s: &str) -> Result<Self, LinguaMetricaError> {
        let invalid = |reason: &str| LinguaMetricaError::InvalidModuleRef {
            reference: s.to_string(),
            reason: reason.to_string(),
        };

        let (module, binding) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected the form <module>:<binding>"))?;

        if binding.contains(':') {
            return Err(invalid("more than one ':' separator"));
        }
        if module.is_empty() {
            return Err(invalid("module name is empty"));
        }
        if binding.is_empty() {
            return Err(invalid("binding name is empty"));
        }
        if !module.split('.').all(is_identifier) {
            return Err(invalid("module must be a dotted path of identifiers"));
        }
        if !is_identifier(binding) {
            return Err(invalid("binding must be an identifier"));
        }

        Ok(Self::new(module, binding))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.binding)
    }
}

impl TryFrom<String> for ModuleRef {
    type Error = LinguaMetricaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ModuleRef::parse(&value)
    }
}

impl From<ModuleRef> for String {
    fn from(r: ModuleRef) -> Self {
        r.to_string()
    }
}

/// Execution knobs for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    /// Maximum number of test cases evaluated at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-call limit for harness and judge invocations.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_concurrency() -> usize {
    1
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_seconds: None,
        }
    }
}

impl EvaluationSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// The validated contents of a `LinguaMetricaFile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProjectConfig")]
pub struct ProjectConfig {
    pub kind: ApplicationKind,
    pub module: ModuleRef,
    pub metrics: Vec<MetricKind>,
    pub provider: ProviderKind,
    pub settings: EvaluationSettings,
}

/// Unvalidated project file, as written by the user.
#[derive(Debug, Clone, Deserialize)]
struct RawProjectConfig {
    kind: ApplicationKind,
    module: String,
    metrics: Vec<String>,
    #[serde(default)]
    provider: Option<ProviderKind>,
    #[serde(default)]
    settings: Option<EvaluationSettings>,
}

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = LinguaMetricaError;

    fn try_from(raw: RawProjectConfig) -> Result<Self, Self::Error> {
        if raw.metrics.is_empty() {
            return Err(LinguaMetricaError::Config(
                "at least one metric must be configured".into(),
            ));
        }

        let mut metrics = Vec::with_capacity(raw.metrics.len());
        for name in &raw.metrics {
            let kind: MetricKind = name.parse()?;
            if metrics.contains(&kind) {
                return Err(LinguaMetricaError::Config(format!(
                    "metric '{kind}' is listed more than once"
                )));
            }
            metrics.push(kind);
        }

        let module = ModuleRef::parse(&raw.module)?;

        let settings = raw.settings.unwrap_or_default();
        if settings.concurrency == 0 {
            return Err(LinguaMetricaError::Config(
                "settings.concurrency must be at least 1".into(),
            ));
        }
        if settings.timeout_seconds == Some(0) {
            return Err(LinguaMetricaError::Config(
                "settings.timeout_seconds must be at least 1".into(),
            ));
        }

        Ok(Self {
            kind: raw.kind,
            module,
            metrics,
            provider: raw.provider.unwrap_or_default(),
            settings,
        })
    }
}

impl ProjectConfig {
    pub fn new(kind: ApplicationKind, module: ModuleRef, metrics: Vec<MetricKind>) -> Self {
        Self {
            kind,
            module,
            metrics,
            provider: ProviderKind::default(),
            settings: EvaluationSettings::default(),
        }
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_settings(mut self, settings: EvaluationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Load the `LinguaMetricaFile` from a project directory.
    pub fn load(project_dir: &Path) -> Result<Self, LinguaMetricaError> {
        let project_file = project_dir.join(PROJECT_FILE_NAME);
        if !project_file.is_file() {
            return Err(LinguaMetricaError::ConfigNotFound {
                path: project_dir.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(&project_file)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate project YAML. Validation errors keep their own
    /// variants instead of being folded into a YAML error.
    pub fn from_yaml(content: &str) -> Result<Self, LinguaMetricaError> {
        let raw: RawProjectConfig = serde_yml::from_str(content)?;
        Self::try_from(raw)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), LinguaMetricaError> {
        let content = serde_yml::to_string(self)?;
        std::fs::write(project_dir.join(PROJECT_FILE_NAME), content)?;
        Ok(())
    }
}

/// Report format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl FromStr for OutputFormat {
    type Err = LinguaMetricaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" | "console" => Ok(OutputFormat::Terminal),
            "json" => Ok(OutputFormat::Json),
            other => Err(LinguaMetricaError::InvalidOutput(format!(
                "unsupported format '{other}'. Options: terminal, json"
            ))),
        }
    }
}

/// Where and how the session report is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub output_path: Option<PathBuf>,
    pub output_format: OutputFormat,
}

impl OutputConfig {
    /// Build and validate an output configuration.
    ///
    /// File-based formats need a non-blank path that is not a directory and
    /// whose parent directory exists and is writable.
    pub fn new(
        output_path: Option<PathBuf>,
        output_format: OutputFormat,
    ) -> Result<Self, LinguaMetricaError> {
        let config = Self {
            output_path,
            output_format,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn terminal() -> Self {
        Self {
            output_path: None,
            output_format: OutputFormat::Terminal,
        }
    }

    pub fn validate(&self) -> Result<(), LinguaMetricaError> {
        if self.output_format == OutputFormat::Terminal {
            return Ok(());
        }

        let path = match &self.output_path {
            Some(p) if !p.as_os_str().to_string_lossy().trim().is_empty() => p,
            _ => {
                return Err(LinguaMetricaError::InvalidOutput(
                    "an output path is required for file-based reports".into(),
                ))
            }
        };

        if path.is_dir() {
            return Err(LinguaMetricaError::InvalidOutput(format!(
                "{} is a directory, expected a file path",
                path.display()
            )));
        }

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let metadata = std::fs::metadata(&parent).map_err(|_| {
            LinguaMetricaError::InvalidOutput(format!(
                "directory {} does not exist",
                parent.display()
            ))
        })?;

        if !metadata.is_dir() {
            return Err(LinguaMetricaError::InvalidOutput(format!(
                "{} is not a directory",
                parent.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(LinguaMetricaError::InvalidOutput(format!(
                "directory {} is not writable",
                parent.display()
            )));
        }

        Ok(())
    }
}
