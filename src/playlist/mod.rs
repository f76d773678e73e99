// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! M3U playlist handling: parsing, tvg-id correction and rewriting.

pub mod correct;
pub mod merge;
pub mod parser;
pub mod rewrite;

pub use correct::{ChannelIdCorrector, CorrectionSummary};
pub use merge::{ConcatenatedPlaylist, concatenate};
pub use parser::{ChannelRecord, ParsedPlaylist, parse, read_playlist};
pub use rewrite::{rewrite, rewrite_file};
