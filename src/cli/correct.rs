use super::{CommandContext, OutputFormat};
use anyhow::Result;
use std::path::PathBuf;

use epgsync::CorrectionReport;
use epgsync::pipeline::correct_playlist;

pub struct CorrectCommand {
    pub playlist: PathBuf,
    pub dry_run: bool,
    pub format: OutputFormat,
}

impl CorrectCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let fetcher = context.fetcher()?;

        eprintln!("Correcting {}...", self.playlist.display());
        let report = correct_playlist(&context.config, &fetcher, &self.playlist, self.dry_run).await?;

        // Dry run: the playlist goes to stdout, the report to stderr
        if let Some(output) = &report.output {
            print!("{}", output);
            Self::print_text(&report, true);
            return Ok(());
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => Self::print_text(&report, false),
        }

        Ok(())
    }

    fn print_text(report: &CorrectionReport, to_stderr: bool) {
        let mut lines = Vec::new();

        lines.push(format!(
            "EPG sources: {} used, {} failed",
            report.epg_sources.len().saturating_sub(report.failures.len()),
            report.failures.len()
        ));
        for failure in &report.failures {
            lines.push(format!("  ✗ {} ({})", failure.url, failure.reason));
        }

        match &report.summary {
            Some(summary) => {
                lines.push(format!(
                    "Channels: {} total, {} corrected, {} already valid, {} unmatched",
                    summary.total(), summary.corrected, summary.valid, summary.unmatched
                ));
                if summary.skipped_no_anchor > 0 {
                    lines.push(format!(
                        "  {} matched channel(s) had no tvg-id or tvg-name attribute to update",
                        summary.skipped_no_anchor
                    ));
                }
                if report.output.is_none() {
                    lines.push(format!("Playlist updated: {}", report.playlist.display()));
                }
            }
            None => {
                lines.push("No usable EPG data, playlist left unchanged".to_string());
            }
        }

        for line in lines {
            if to_stderr {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        }
    }
}
