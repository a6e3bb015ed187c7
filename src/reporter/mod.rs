// src/reporter/mod.rs - Session report output

pub mod json;
pub mod terminal;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;

use crate::core::session::SessionSummary;
use crate::infra::config::{OutputConfig, OutputFormat};

/// Writes a finished session somewhere a human or a tool can read it.
pub trait Reporter {
    fn generate_report(&self, summary: &SessionSummary) -> anyhow::Result<()>;
}

/// Pick the reporter for a validated output configuration.
pub fn get_reporter(config: &OutputConfig) -> anyhow::Result<Box<dyn Reporter>> {
    match config.output_format {
        OutputFormat::Terminal => Ok(Box::new(TerminalReporter::new())),
        OutputFormat::Json => {
            let path = config
                .output_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("JSON output requires an output path"))?;
            Ok(Box::new(JsonReporter::new(path)))
        }
    }
}
