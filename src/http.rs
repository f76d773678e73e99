// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{EpgError, EpgResult};

/// Retrieves the body of a URL.
pub trait Fetch: Sync {
    /// Stream the body of `url` into `sink`, returning the number of bytes
    /// written.
    fn fetch(&self, url: &str, sink: &mut File) -> impl Future<Output = EpgResult<u64>> + Send;
}

/// `Fetch` over HTTP(S), with a progress bar per download.
pub struct HttpFetcher {
    client: Client,
    progress: MultiProgress,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .user_agent(config.user_agent.clone())
                .build()?,
            progress: MultiProgress::new(),
        })
    }

    /// Suppress progress output.
    pub fn quiet(self) -> Self {
        self.progress.set_draw_target(ProgressDrawTarget::hidden());
        self
    }

    fn progress_bar(&self, url: &str, length: Option<u64>) -> ProgressBar {
        let pb = match length {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg:40!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg:40!} [{elapsed_precise}] {bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            }
        };
        pb.set_message(short_name(url).to_string());
        self.progress.add(pb)
    }

    async fn stream_to(&self, url: &str, sink: &mut File) -> EpgResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| EpgError::unavailable(url, e))?;

        let pb = self.progress_bar(url, response.content_length().filter(|len| *len > 0));
        let mut stream = response.bytes_stream();

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(EpgError::unavailable(url, e));
                }
            };
            if let Err(e) = sink.write_all(&chunk).await {
                pb.finish_and_clear();
                return Err(e.into());
            }
            written += chunk.len() as u64;
            pb.set_position(written);
        }
        pb.finish_and_clear();
        sink.flush().await?;

        Ok(written)
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, sink: &mut File) -> EpgResult<u64> {
        let size = self.stream_to(url, sink).await?;
        debug!("Fetched {} ({} bytes)", url, size);
        Ok(size)
    }
}

/// Last path segment of a URL, for progress labels.
fn short_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => url,
    }
}

/// `Fetch` backed by a map of URL to body. Unknown URLs fail as
/// unavailable.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }
}

impl Fetch for MemoryFetcher {
    async fn fetch(&self, url: &str, sink: &mut File) -> EpgResult<u64> {
        let body = self
            .bodies
            .get(url)
            .ok_or_else(|| EpgError::unavailable(url, "HTTP status 404 Not Found"))?;
        sink.write_all(body).await?;
        sink.flush().await?;
        Ok(body.len() as u64)
    }
}
