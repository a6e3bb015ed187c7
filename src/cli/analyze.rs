// src/cli/analyze.rs - `linguametrica analyze`
//
// Output settings are validated before any session work so a bad report path
// fails fast instead of after every test case has run.

use std::path::{Path, PathBuf};

use crate::core::session::Session;
use crate::harness::PipelineRegistry;
use crate::infra::config::{OutputConfig, OutputFormat};
use crate::reporter::get_reporter;

/// Analyze the project at `path` with the built-in pipelines.
pub async fn run_analyze(path: &str, output: Option<&str>, format: &str) -> anyhow::Result<()> {
    run_analyze_with(
        Path::new(path),
        output,
        format,
        &PipelineRegistry::with_builtins(),
    )
    .await
}

pub async fn run_analyze_with(
    project_dir: &Path,
    output: Option<&str>,
    format: &str,
    registry: &PipelineRegistry,
) -> anyhow::Result<()> {
    let output_format: OutputFormat = format.parse()?;
    let output_config = OutputConfig::new(output.map(PathBuf::from), output_format)?;

    load_project_env(project_dir)?;

    let mut session = Session::from_directory_with(project_dir, registry)?;
    let summary = session.run().await?;

    get_reporter(&output_config)?.generate_report(&summary)?;
    Ok(())
}

/// Load `<project>/.env` if present. Variables already set in the process
/// environment win.
pub fn load_project_env(project_dir: &Path) -> anyhow::Result<()> {
    let env_file = project_dir.join(".env");
    if env_file.is_file() {
        dotenvy::from_path(&env_file)?;
        tracing::debug!("Loaded environment from {}", env_file.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::errors::LinguaMetricaError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bad_output_fails_before_loading_project() {
        let dir = TempDir::new().unwrap();
        let missing_project = dir.path().join("no-project-here");

        let err = run_analyze_with(&missing_project, None, "json", &PipelineRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LinguaMetricaError>(),
            Some(LinguaMetricaError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_format_rejected() {
        let dir = TempDir::new().unwrap();
        let err = run_analyze_with(dir.path(), None, "xml", &PipelineRegistry::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn test_project_env_is_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "LINGUAMETRICA_PROJECT_ENV_MARKER=from-project\n",
        )
        .unwrap();

        load_project_env(dir.path()).unwrap();
        assert_eq!(
            std::env::var("LINGUAMETRICA_PROJECT_ENV_MARKER").unwrap(),
            "from-project"
        );
    }

    #[test]
    fn test_project_env_is_optional() {
        let dir = TempDir::new().unwrap();
        assert!(load_project_env(dir.path()).is_ok());
    }

    #[tokio::test]
    async fn test_missing_project_file_reported() {
        let dir = TempDir::new().unwrap();
        let err = run_analyze_with(dir.path(), None, "terminal", &PipelineRegistry::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Could not find LinguaMetricaFile"));
    }
}
