// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod config;
pub mod decompress;
pub mod epg;
pub mod error;
pub mod fsutil;
pub mod http;
pub mod pipeline;
pub mod playlist;
pub mod sources;

pub use config::Config;
pub use error::{EpgError, EpgResult};
pub use http::{Fetch, HttpFetcher, MemoryFetcher};
pub use pipeline::{ConsolidationReport, CorrectionReport, consolidate, correct_playlist};
pub use sources::SourceFilter;
