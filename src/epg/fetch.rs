// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::index::NameIndex;
use super::xmltv::XmltvDocument;
use crate::decompress::{Encoding, decompress};
use crate::error::{EpgError, EpgResult};
use crate::http::Fetch;

/// A source that could not be used, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub url: String,
    pub kind: &'static str,
    pub reason: String,
}

impl SourceFailure {
    pub fn new(url: &str, error: &EpgError) -> Self {
        Self {
            url: url.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    /// The source never produced a body (network or HTTP failure).
    pub fn is_download_failure(&self) -> bool {
        self.kind == "unavailable"
    }
}

#[derive(Debug, Clone)]
pub struct FetchedEpg {
    pub url: String,
    pub document: XmltvDocument,
}

/// Outcome of a batch, in the order the sources were given.
#[derive(Debug, Clone, Default)]
pub struct FetchResults {
    pub documents: Vec<FetchedEpg>,
    pub failures: Vec<SourceFailure>,
}

impl FetchResults {
    pub fn get(&self, url: &str) -> Option<&XmltvDocument> {
        self.documents
            .iter()
            .find(|fetched| fetched.url == url)
            .map(|fetched| &fetched.document)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Name index over all documents; later sources win on collisions.
    pub fn name_index(&self) -> NameIndex {
        NameIndex::build(self.documents.iter().map(|fetched| &fetched.document))
    }
}

/// Download `url` into a fresh temporary file under `temp_dir`. The file is
/// deleted when the returned handle is dropped.
pub async fn download_to_temp<F: Fetch>(
    fetcher: &F,
    url: &str,
    temp_dir: &Path,
    suffix: &str,
) -> EpgResult<NamedTempFile> {
    let download = tempfile::Builder::new()
        .prefix("epgsync-")
        .suffix(suffix)
        .tempfile_in(temp_dir)?;

    let mut sink = tokio::fs::File::from_std(download.reopen()?);
    let size = fetcher.fetch(url, &mut sink).await?;
    sink.flush().await?;

    debug!("Downloaded {} bytes from {} to {}", size, url, download.path().display());
    Ok(download)
}

/// Retrieves, decompresses and parses EPG sources.
pub struct EpgFetcher<'a, F: Fetch> {
    fetcher: &'a F,
    temp_dir: PathBuf,
    concurrency: usize,
}

impl<'a, F: Fetch> EpgFetcher<'a, F> {
    pub fn new(fetcher: &'a F, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            temp_dir: temp_dir.into(),
            concurrency: 1,
        }
    }

    /// Number of downloads allowed in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn fetch_one(&self, url: &str) -> EpgResult<XmltvDocument> {
        let encoding = Encoding::from_name(url);
        let download = download_to_temp(self.fetcher, url, &self.temp_dir, encoding.suffix()).await?;

        let bytes = tokio::fs::read(download.path()).await?;
        let text = decompress(&bytes, url)?;
        drop(bytes);

        let document = XmltvDocument::parse(&text)?;
        debug!(
            "Parsed {}: {} channels, {} programmes",
            url,
            document.channels.len(),
            document.programme_count()
        );
        Ok(document)
    }

    /// Fetch every source. A failing source is recorded and never stops
    /// the others; the call returns once all of them have settled.
    pub async fn fetch_all(&self, urls: &[String]) -> FetchResults {
        let total = urls.len();
        let outcomes: Vec<(&String, EpgResult<XmltvDocument>)> = stream::iter(urls.iter().enumerate())
            .map(|(i, url)| async move {
                info!("[{}/{}] Fetching EPG: {}", i + 1, total, url);
                (url, self.fetch_one(url).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut results = FetchResults::default();
        for (url, outcome) in outcomes {
            match outcome {
                Ok(document) => results.documents.push(FetchedEpg {
                    url: url.clone(),
                    document,
                }),
                Err(e) => {
                    warn!("EPG source failed: {}: {}", url, e);
                    results.failures.push(SourceFailure::new(url, &e));
                }
            }
        }

        info!(
            "EPG batch finished: {} succeeded, {} failed",
            results.documents.len(),
            results.failures.len()
        );
        results
    }
}
