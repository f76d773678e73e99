use super::{CommandContext, OutputFormat, format_rate};
use anyhow::Result;
use chrono::Local;

use epgsync::ConsolidationReport;
use epgsync::pipeline::consolidate;

pub struct ConsolidateCommand {
    pub format: OutputFormat,
}

impl ConsolidateCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let fetcher = context.fetcher()?;

        eprintln!(
            "Consolidating {} playlist(s)...",
            context.config.playlists.len()
        );
        let report = consolidate(&context.config, &fetcher).await?;

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => Self::print_text(&report),
        }

        Ok(())
    }

    fn print_text(report: &ConsolidationReport) {
        println!(
            "Run started {}, took {}s",
            report.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            (report.finished_at - report.started_at).num_seconds()
        );

        let playlists = &report.playlists;
        println!("\nPlaylists:");
        for url in &playlists.succeeded {
            println!("  ✓ {}", url);
        }
        for failure in &playlists.failed {
            println!("  ✗ {} ({})", failure.url, failure.reason);
        }
        match &playlists.output {
            Some(path) => println!("  {} channels written to {}", playlists.channels, path.display()),
            None => println!("  No playlist written"),
        }

        if !report.rejected_sources.is_empty() {
            println!("\nSkipped EPG sources:");
            for rejected in &report.rejected_sources {
                println!("  - {} ({})", rejected.url, rejected.reason);
            }
        }

        let epg = &report.epg;
        println!("\nEPG sources:");
        if epg.attempted() == 0 {
            println!("  No valid EPG sources found");
            return;
        }
        for url in &epg.succeeded {
            println!("  ✓ {}", url);
        }
        for failure in &epg.failed {
            println!("  ✗ {} ({})", failure.url, failure.reason);
        }

        println!("\nSummary:");
        println!("  Unique channels:  {}", epg.channels);
        println!("  Programmes:       {}", epg.programmes);
        println!(
            "  Downloaded:       {}/{}",
            epg.downloaded(),
            epg.attempted()
        );
        println!(
            "  Success rate:     {} ({}/{} downloaded)",
            format_rate(epg.success_rate()),
            epg.succeeded.len(),
            epg.downloaded()
        );
        match &report.epg_output {
            Some(path) => println!("  Written to:       {}", path.display()),
            None => println!("  No EPG file written"),
        }
    }
}
