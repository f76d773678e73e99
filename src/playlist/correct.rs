// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use regex::NoExpand;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::parser::{ChannelRecord, TVG_ID_RE};
use crate::epg::NameIndex;

/// Identifiers that playlists use to mean "no guide id".
pub const PLACEHOLDER_IDS: [&str; 2] = ["n/a", "undefined"];

const TVG_NAME_ATTR: &str = "tvg-name=";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionSummary {
    pub corrected: usize,
    /// Channels whose id already resolves against the guide.
    pub valid: usize,
    /// Channels needing a new id but whose name is not in the guide.
    pub unmatched: usize,
    /// Matched channels whose entry line has neither `tvg-id=` nor
    /// `tvg-name=` to anchor the new attribute; left untouched.
    pub skipped_no_anchor: usize,
}

impl CorrectionSummary {
    /// Channels looked at; every channel lands in exactly one bucket.
    pub fn total(&self) -> usize {
        self.corrected + self.valid + self.unmatched + self.skipped_no_anchor
    }
}

/// Replace the `tvg-id` value of an entry line, or insert one right before
/// `tvg-name=`. Returns `None` when the line has neither attribute.
pub fn rewrite_tvg_id(line: &str, id: &str) -> Option<String> {
    let attr = format!("tvg-id=\"{}\"", id);

    if TVG_ID_RE.is_match(line) {
        return Some(TVG_ID_RE.replace(line, NoExpand(&attr)).into_owned());
    }

    let pos = line.find(TVG_NAME_ATTR)?;
    let mut rewritten = String::with_capacity(line.len() + attr.len() + 1);
    rewritten.push_str(&line[..pos]);
    rewritten.push_str(&attr);
    rewritten.push(' ');
    rewritten.push_str(&line[pos..]);
    Some(rewritten)
}

pub struct ChannelIdCorrector<'a> {
    index: &'a NameIndex,
    known_ids: HashSet<&'a str>,
}

impl<'a> ChannelIdCorrector<'a> {
    pub fn new(index: &'a NameIndex) -> Self {
        Self {
            index,
            known_ids: index.ids(),
        }
    }

    /// Empty ids, placeholder ids and ids the guide does not know all need
    /// replacing.
    pub fn needs_correction(&self, tvg_id: &str) -> bool {
        tvg_id.is_empty()
            || PLACEHOLDER_IDS
                .iter()
                .any(|placeholder| tvg_id.eq_ignore_ascii_case(placeholder))
            || !self.known_ids.contains(tvg_id)
    }

    /// Correct ids in place. Stream URLs are never touched and a channel
    /// whose name has no match is left as it is.
    pub fn correct(&self, channels: &mut [ChannelRecord]) -> CorrectionSummary {
        let mut summary = CorrectionSummary::default();

        for channel in channels.iter_mut() {
            if !self.needs_correction(&channel.tvg_id) {
                summary.valid += 1;
                continue;
            }

            let Some(new_id) = self.index.get(&channel.name) else {
                summary.unmatched += 1;
                continue;
            };

            match rewrite_tvg_id(&channel.original_line, new_id) {
                Some(line) => {
                    debug!(
                        "Correcting '{}': tvg-id '{}' -> '{}'",
                        channel.name, channel.tvg_id, new_id
                    );
                    channel.original_line = line;
                    channel.tvg_id = new_id.to_string();
                    summary.corrected += 1;
                }
                None => {
                    debug!(
                        "No tvg-id or tvg-name attribute on '{}', leaving it unchanged",
                        channel.name
                    );
                    summary.skipped_no_anchor += 1;
                }
            }
        }

        summary
    }
}
