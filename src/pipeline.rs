// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! The two end-to-end runs: correcting one playlist's tvg-ids in place, and
//! consolidating several playlists and their guides into single outputs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::decompress::decode_text;
use crate::epg::{BatchReport, EpgFetcher, EpgMerger, SourceFailure, download_to_temp};
use crate::error::EpgResult;
use crate::fsutil::write_atomic;
use crate::http::Fetch;
use crate::playlist::{self, ChannelIdCorrector, CorrectionSummary};
use crate::sources::{NormalizedSources, RejectedSource, SourceFilter};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionReport {
    pub playlist: PathBuf,
    pub channels: usize,
    pub epg_sources: Vec<String>,
    pub rejected_sources: Vec<RejectedSource>,
    pub failures: Vec<SourceFailure>,
    /// Distinct display names available for matching.
    pub indexed_names: usize,
    /// `None` when no usable guide data was found and the playlist was left
    /// alone.
    pub summary: Option<CorrectionSummary>,
    /// Rewritten playlist text, kept only for dry runs.
    #[serde(skip)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaylistBatch {
    pub succeeded: Vec<String>,
    pub failed: Vec<SourceFailure>,
    pub channels: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub playlists: PlaylistBatch,
    pub rejected_sources: Vec<RejectedSource>,
    pub epg: BatchReport,
    pub epg_output: Option<PathBuf>,
}

fn epg_sources<'a, I>(config: &'a Config, declared: I) -> Result<NormalizedSources>
where
    I: IntoIterator<Item = &'a str>,
{
    let filter = SourceFilter::from_config(&config.epg)?;
    Ok(filter.normalize(
        declared
            .into_iter()
            .chain(config.epg.extra_sources.iter().map(String::as_str)),
    ))
}

fn staging_dir(config: &Config) -> Result<PathBuf> {
    let dir = config.temp_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create temp directory: {}", dir.display()))?;
    Ok(dir)
}

fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Read a playlist from a URL or a local path.
pub async fn load_playlist<F: Fetch>(fetcher: &F, source: &str, temp_dir: &Path) -> EpgResult<String> {
    if is_remote(source) {
        let download = download_to_temp(fetcher, source, temp_dir, ".m3u").await?;
        let bytes = tokio::fs::read(download.path()).await?;
        Ok(decode_text(&bytes))
    } else {
        playlist::read_playlist(source).await
    }
}

/// Correct the tvg-ids of the playlist at `path` against the guides it
/// declares, then rewrite it in place (or only render it when `dry_run`).
pub async fn correct_playlist<F: Fetch>(
    config: &Config,
    fetcher: &F,
    path: &Path,
    dry_run: bool,
) -> Result<CorrectionReport> {
    let text = playlist::read_playlist(path).await?;
    let parsed = playlist::parse(&text);
    let mut channels = parsed.channels;

    let sources = epg_sources(config, parsed.epg_urls.iter().map(String::as_str))?;
    let mut report = CorrectionReport {
        playlist: path.to_path_buf(),
        channels: channels.len(),
        epg_sources: sources.accepted.clone(),
        rejected_sources: sources.rejected,
        ..CorrectionReport::default()
    };

    if sources.accepted.is_empty() {
        warn!("No EPG sources found for {}; nothing to correct", path.display());
        return Ok(report);
    }

    let temp_dir = staging_dir(config)?;
    let results = EpgFetcher::new(fetcher, temp_dir)
        .with_concurrency(config.http.concurrency)
        .fetch_all(&sources.accepted)
        .await;
    report.failures = results.failures.clone();

    let index = results.name_index();
    report.indexed_names = index.len();
    if index.is_empty() {
        warn!("No usable EPG data for {}; playlist left unchanged", path.display());
        return Ok(report);
    }

    let summary = ChannelIdCorrector::new(&index).correct(&mut channels);
    info!(
        "{} of {} channel(s) corrected in {}",
        summary.corrected,
        channels.len(),
        path.display()
    );

    if dry_run {
        report.output = Some(playlist::rewrite(&text, &channels));
    } else {
        playlist::rewrite_file(path, &text, &channels)?;
    }
    report.summary = Some(summary);

    Ok(report)
}

/// Merge every configured playlist into `output.playlist` and every guide
/// they reference into `output.epg`.
pub async fn consolidate<F: Fetch>(config: &Config, fetcher: &F) -> Result<ConsolidationReport> {
    if config.playlists.is_empty() && config.epg.extra_sources.is_empty() {
        anyhow::bail!("No playlists or EPG sources configured");
    }

    let temp_dir = staging_dir(config)?;
    let mut report = ConsolidationReport {
        started_at: Utc::now(),
        ..ConsolidationReport::default()
    };

    let mut texts = Vec::new();
    for (i, source) in config.playlists.iter().enumerate() {
        info!("[{}/{}] Loading playlist: {}", i + 1, config.playlists.len(), source);
        match load_playlist(fetcher, source, &temp_dir).await {
            Ok(text) => {
                report.playlists.succeeded.push(source.clone());
                texts.push(text);
            }
            Err(e) => {
                warn!("Playlist source failed: {}: {}", source, e);
                report.playlists.failed.push(SourceFailure::new(source, &e));
            }
        }
    }

    let merged = playlist::concatenate(texts.iter().map(String::as_str));
    report.playlists.channels = merged.channel_count;

    if !texts.is_empty() {
        let path = &config.output.playlist;
        write_atomic(path, |f| f.write_all(merged.text.as_bytes()))
            .with_context(|| format!("Failed to write playlist: {}", path.display()))?;
        info!(
            "Playlist written to {}: {} channels",
            path.display(),
            merged.channel_count
        );
        report.playlists.output = Some(path.clone());
    }

    let sources = epg_sources(config, merged.epg_urls.iter().map(String::as_str))?;
    report.rejected_sources = sources.rejected;

    if sources.accepted.is_empty() {
        warn!("No valid EPG sources found; EPG output not written");
        report.finished_at = Utc::now();
        return Ok(report);
    }

    let results = EpgFetcher::new(fetcher, temp_dir)
        .with_concurrency(config.http.concurrency)
        .fetch_all(&sources.accepted)
        .await;

    let mut merger = EpgMerger::new();
    merger.add_results(results);

    if merger.is_empty() {
        warn!("Every EPG source failed; EPG output not written");
    } else {
        merger.write_gzip(&config.output.epg)?;
        report.epg_output = Some(config.output.epg.clone());
    }
    report.epg = merger.report();
    report.finished_at = Utc::now();

    Ok(report)
}
