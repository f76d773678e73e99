// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use epgsync::Config;

mod cli;
use cli::{
    CommandContext, ConfigCommand, ConsolidateCommand, CorrectCommand, OutputFormat,
    SourcesCommand,
};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "epgsync")]
#[command(about = "Reconcile M3U playlists with their XMLTV guides")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (epgsync_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    /// Hide download progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "EPGSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fix missing or unknown tvg-ids in a playlist using its EPG sources
    Correct {
        /// Playlist file to correct in place
        playlist: PathBuf,
        /// Print the corrected playlist instead of writing it
        #[arg(long)]
        dry_run: bool,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Merge the configured playlists and their EPG sources into single files
    Consolidate {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the EPG sources a playlist declares
    Sources {
        /// Playlist path or URL
        playlist: String,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigSubCommand),
}

#[derive(Subcommand)]
enum ConfigSubCommand {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("epgsync_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("epgsync=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else {
        // Per-source warnings stay visible without any flags
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter(
                EnvFilter::new("warn").add_directive("hyper_util=error".parse()?),
            )
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    // init must work even when the existing file no longer parses
    let config = match &cli.command {
        Commands::Config(ConfigSubCommand::Init { .. }) => Config::default(),
        _ => Config::load_or_default(&config_path)?,
    };
    tracing::debug!("Using config: {}", config_path.display());

    let context = CommandContext::new(config, config_path, cli.quiet);

    match cli.command {
        Commands::Correct {
            playlist,
            dry_run,
            format,
        } => {
            let cmd = CorrectCommand {
                playlist,
                dry_run,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::Consolidate { format } => {
            let cmd = ConsolidateCommand {
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::Sources { playlist, format } => {
            let cmd = SourcesCommand {
                playlist,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::Config(config_cmd) => {
            let cmd = match config_cmd {
                ConfigSubCommand::Init { force } => ConfigCommand::Init { force },
                ConfigSubCommand::Show { format } => ConfigCommand::Show {
                    format: OutputFormat::from_str(&format)?,
                },
            };
            cmd.execute(context).await?;
        }
    }

    Ok(())
}
