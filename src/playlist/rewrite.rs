// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

use super::parser::{ChannelRecord, ENTRY_MARKER, line_ending, split_lines};
use crate::fsutil::write_atomic;

static URL_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap());

/// Rebuild playlist text from the original and its (corrected) channels.
///
/// Lines are walked in order. Each entry line is replaced by the next
/// channel's `original_line` and `stream_url`; any other line is copied,
/// except lines starting with a URL scheme, which were already written
/// alongside their entry. Should the channels run out, remaining entry
/// lines are copied unchanged. Lines are joined with the original's line
/// terminator and the result ends with exactly one.
pub fn rewrite(original: &str, channels: &[ChannelRecord]) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut cursor = 0;

    for line in split_lines(original) {
        if line.starts_with(ENTRY_MARKER) {
            match channels.get(cursor) {
                Some(channel) => {
                    out.push(&channel.original_line);
                    // an empty URL means the entry had no following line
                    if !channel.stream_url.is_empty() {
                        out.push(&channel.stream_url);
                    }
                    cursor += 1;
                }
                None => out.push(line),
            }
        } else if !URL_SCHEME_RE.is_match(line) {
            out.push(line);
        }
    }

    if cursor < channels.len() {
        warn!(
            "{} channel(s) had no matching entry line in the playlist",
            channels.len() - cursor
        );
    }

    let eol = line_ending(original);
    let mut text = out.join(eol);
    text.push_str(eol);
    text
}

/// Rewrite the playlist at `path` in place.
pub fn rewrite_file(path: &Path, original: &str, channels: &[ChannelRecord]) -> Result<()> {
    let text = rewrite(original, channels);

    write_atomic(path, |f| f.write_all(text.as_bytes()))
        .with_context(|| format!("Failed to write playlist: {}", path.display()))?;

    info!("Playlist updated: {}", path.display());
    Ok(())
}
