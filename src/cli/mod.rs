use anyhow::Result;
use std::path::PathBuf;

use epgsync::{Config, HttpFetcher};

pub mod config;
pub mod consolidate;
pub mod correct;
pub mod sources;

pub use config::ConfigCommand;
pub use consolidate::ConsolidateCommand;
pub use correct::CorrectCommand;
pub use sources::SourcesCommand;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid format: {}. Use 'text' or 'json'", s),
        }
    }
}

/// Context shared by every command
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(config: Config, config_path: PathBuf, quiet: bool) -> Self {
        Self {
            config,
            config_path,
            quiet,
        }
    }

    pub fn fetcher(&self) -> Result<HttpFetcher> {
        let fetcher = HttpFetcher::new(&self.config.http)?;
        Ok(if self.quiet { fetcher.quiet() } else { fetcher })
    }
}

/// Percentage with one decimal, or "n/a" when there is nothing to rate.
pub fn format_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.1}%", r))
        .unwrap_or_else(|| "n/a".to_string())
}
