// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! XMLTV guides: fetching, parsing, indexing and merging.

pub mod fetch;
pub mod index;
pub mod merge;
pub mod xmltv;

pub use fetch::{EpgFetcher, FetchResults, FetchedEpg, SourceFailure, download_to_temp};
pub use index::NameIndex;
pub use merge::{BatchReport, EpgMerger, MergeStats};
pub use xmltv::{XmltvChannel, XmltvDocument};
