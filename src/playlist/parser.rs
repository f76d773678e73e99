// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use crate::decompress::decode_text;
use crate::error::{EpgError, EpgResult};

pub const HEADER_MARKER: &str = "#EXTM3U";
pub const ENTRY_MARKER: &str = "#EXTINF";

static EPG_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:url-tvg|x-tvg-url)="([^"]*)""#).unwrap());
pub(crate) static TVG_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tvg-id="([^"]*)""#).unwrap());
static TVG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tvg-name="([^"]*)""#).unwrap());

/// One `#EXTINF` entry and the line that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    /// Entry line as it should be written back; kept in sync with `tvg_id`.
    pub original_line: String,
    pub tvg_id: String,
    pub tvg_name: String,
    /// Label after the last comma of the entry line.
    pub name: String,
    /// The line directly after the entry line, verbatim.
    pub stream_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    /// EPG sources declared in header lines, unique, in first-seen order.
    pub epg_urls: Vec<String>,
    pub channels: Vec<ChannelRecord>,
}

/// Split on `\n`, `\r\n`, or bare `\r` line endings.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    if !text.contains('\n') && text.contains('\r') {
        return text.split_terminator('\r').collect();
    }
    text.lines().collect()
}

/// The line terminator `text` uses, `\n` when it has none.
pub(crate) fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else if text.contains('\r') {
        "\r"
    } else {
        "\n"
    }
}

/// EPG URLs carried by the `url-tvg` / `x-tvg-url` attributes of a header
/// line, in attribute order. Values are comma separated.
pub fn header_epg_urls(line: &str) -> Vec<String> {
    EPG_ATTR_RE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .flat_map(|m| m.as_str().split(','))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn attribute(re: &Regex, line: &str) -> String {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn entry_label(line: &str) -> String {
    line.rsplit_once(',')
        .map(|(_, label)| label.trim().to_string())
        .unwrap_or_default()
}

impl ChannelRecord {
    pub fn from_entry(line: &str, stream_url: &str) -> Self {
        Self {
            original_line: line.to_string(),
            tvg_id: attribute(&TVG_ID_RE, line),
            tvg_name: attribute(&TVG_NAME_RE, line),
            name: entry_label(line),
            stream_url: stream_url.to_string(),
        }
    }
}

/// Parse playlist text in a single pass.
///
/// Every `#EXTINF` line yields a record whose stream URL is the next line,
/// whatever that line holds. An entry on the last line gets an empty URL.
pub fn parse(text: &str) -> ParsedPlaylist {
    let lines = split_lines(text);
    let mut parsed = ParsedPlaylist::default();

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with(HEADER_MARKER) {
            for url in header_epg_urls(line) {
                if !parsed.epg_urls.contains(&url) {
                    parsed.epg_urls.push(url);
                }
            }
        } else if line.starts_with(ENTRY_MARKER) {
            let stream_url = lines.get(i + 1).copied().unwrap_or_default();
            parsed
                .channels
                .push(ChannelRecord::from_entry(line, stream_url));
        }
    }

    debug!(
        "Parsed playlist: {} channels, {} EPG sources",
        parsed.channels.len(),
        parsed.epg_urls.len()
    );

    parsed
}

/// Read a playlist from disk with permissive decoding.
pub async fn read_playlist<P: AsRef<Path>>(path: P) -> EpgResult<String> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| EpgError::PlaylistUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(decode_text(&bytes))
}
