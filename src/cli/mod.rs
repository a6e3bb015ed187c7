// src/cli/mod.rs - CLI definition (clap derive)

pub mod analyze;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "linguametrica",
    about = "Evaluate LLM pipelines against recorded test cases",
    version
)]
pub struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every test case of a project and report the metric summary
    Analyze {
        /// Project directory containing the LinguaMetricaFile
        #[arg(long, default_value = ".")]
        path: String,
        /// Report file (required for json output)
        #[arg(short, long)]
        output: Option<String>,
        /// Report format: terminal or json
        #[arg(short, long, default_value = "terminal")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_defaults() {
        let cli = Cli::parse_from(["linguametrica", "analyze"]);
        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Commands::Analyze {
                path,
                output,
                format,
            } => {
                assert_eq!(path, ".");
                assert!(output.is_none());
                assert_eq!(format, "terminal");
            }
        }
    }

    #[test]
    fn test_parse_analyze_json() {
        let cli = Cli::parse_from([
            "linguametrica",
            "analyze",
            "--path",
            "sample",
            "--output",
            "report.json",
            "--format",
            "json",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_level, "debug");
        let Commands::Analyze {
            path,
            output,
            format,
        } = cli.command;
        assert_eq!(path, "sample");
        assert_eq!(output.as_deref(), Some("report.json"));
        assert_eq!(format, "json");
    }

    #[test]
    fn test_analyze_is_required() {
        assert!(Cli::try_parse_from(["linguametrica"]).is_err());
    }
}
