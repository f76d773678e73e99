use super::{CommandContext, OutputFormat};
use anyhow::Result;
use serde_json::json;

use epgsync::SourceFilter;
use epgsync::pipeline::load_playlist;
use epgsync::playlist::parse;

pub struct SourcesCommand {
    /// Playlist path or URL
    pub playlist: String,
    pub format: OutputFormat,
}

impl SourcesCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let fetcher = context.fetcher()?;
        let temp_dir = context.config.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let text = load_playlist(&fetcher, &self.playlist, &temp_dir).await?;
        let parsed = parse(&text);

        let filter = SourceFilter::from_config(&context.config.epg)?;
        let sources = filter.normalize(
            parsed
                .epg_urls
                .iter()
                .chain(context.config.epg.extra_sources.iter())
                .map(String::as_str),
        );

        match self.format {
            OutputFormat::Json => {
                let output = json!({
                    "playlist": self.playlist,
                    "channels": parsed.channels.len(),
                    "sources": sources.accepted,
                    "rejected": sources.rejected,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                if sources.accepted.is_empty() {
                    println!("No EPG sources found in {}", self.playlist);
                } else {
                    for url in &sources.accepted {
                        println!("{}", url);
                    }
                }
                for rejected in &sources.rejected {
                    eprintln!("skipped: {} ({})", rejected.url, rejected.reason);
                }
            }
        }

        Ok(())
    }
}
