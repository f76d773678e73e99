// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::parser::{HEADER_MARKER, parse};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcatenatedPlaylist {
    pub text: String,
    /// EPG sources declared by any of the input playlists, first-seen order.
    pub epg_urls: Vec<String>,
    pub channel_count: usize,
}

/// Join several playlists into one. The first playlist keeps its header
/// line; a header on the first line of any later playlist is dropped, but
/// the EPG sources it declares are still collected.
pub fn concatenate<'a, I>(playlists: I) -> ConcatenatedPlaylist
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = ConcatenatedPlaylist::default();

    for (i, text) in playlists.into_iter().enumerate() {
        let parsed = parse(text);
        for url in parsed.epg_urls {
            if !merged.epg_urls.contains(&url) {
                merged.epg_urls.push(url);
            }
        }
        merged.channel_count += parsed.channels.len();

        let body = if i > 0 && text.starts_with(HEADER_MARKER) {
            text.split_once('\n').map(|(_, rest)| rest).unwrap_or_default()
        } else {
            text
        };

        merged.text.push_str(body);
        if !merged.text.ends_with('\n') {
            merged.text.push('\n');
        }
    }

    merged
}
