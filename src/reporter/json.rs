// src/reporter/json.rs - Pretty JSON report file

use std::path::{Path, PathBuf};

use super::Reporter;
use crate::core::session::SessionSummary;

pub struct JsonReporter {
    output_path: PathBuf,
}

impl JsonReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Reporter for JsonReporter {
    fn generate_report(&self, summary: &SessionSummary) -> anyhow::Result<()> {
        let mut document = serde_json::to_value(summary)?;
        if let Some(object) = document.as_object_mut() {
            object.insert(
                "version".into(),
                serde_json::json!(env!("CARGO_PKG_VERSION")),
            );
        }

        std::fs::write(&self.output_path, serde_json::to_string_pretty(&document)?)?;
        tracing::info!("Report written to {}", self.output_path.display());
        Ok(())
    }
}
