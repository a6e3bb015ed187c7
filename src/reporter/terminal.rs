// src/reporter/terminal.rs - Human-readable report on stdout

use super::Reporter;
use crate::core::session::SessionSummary;
use crate::util::truncate_str;

#[derive(Debug, Default)]
pub struct TerminalReporter;

impl TerminalReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, summary: &SessionSummary) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "linguametrica v{}  session {}\n\n",
            env!("CARGO_PKG_VERSION"),
            summary.session_id
        ));
        out.push_str(&format!(
            "  Test cases: {} ({} failed)\n",
            summary.test_cases, summary.failed_cases
        ));
        out.push_str(&format!(
            "  Duration:   {:.2}s\n",
            summary.duration.as_secs_f64()
        ));
        out.push_str(&format!(
            "  Started:    {}\n\n",
            summary.started_at.to_rfc3339()
        ));

        out.push_str(&format!(
            "  {:<16} {:>8} {:>8} {:>8}\n",
            "Metric", "Mean", "Min", "Max"
        ));
        out.push_str(&format!("  {}\n", "-".repeat(43)));
        for metric in &summary.metrics {
            out.push_str(&format!(
                "  {:<16} {:>8.3} {:>8.3} {:>8.3}\n",
                metric.name, metric.mean, metric.min, metric.max
            ));
        }

        let failures: Vec<_> = summary.results.iter().filter(|r| r.is_failed()).collect();
        if !failures.is_empty() {
            out.push_str("\n  Failed:\n");
            for result in failures {
                let error = result.error.as_deref().unwrap_or_default();
                out.push_str(&format!(
                    "    {}: {}\n",
                    result.test_case,
                    truncate_str(error, 100)
                ));
            }
        }

        out
    }
}

impl Reporter for TerminalReporter {
    fn generate_report(&self, summary: &SessionSummary) -> anyhow::Result<()> {
        print!("{}", self.render(summary));
        Ok(())
    }
}
