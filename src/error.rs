// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use std::path::PathBuf;
use thiserror::Error;

use crate::decompress::Encoding;

/// Errors raised while handling a single playlist or EPG source.
///
/// Everything except `PlaylistUnreadable` is scoped to one source: the
/// fetcher records it against the source URL and moves on.
#[derive(Debug, Error)]
pub enum EpgError {
    #[error("source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("{encoding} decompression failed: {reason}")]
    Decompression { encoding: Encoding, reason: String },

    #[error("malformed XMLTV document: {reason}")]
    MalformedDocument { reason: String },

    #[error("cannot read playlist {}: {source}", path.display())]
    PlaylistUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EpgError {
    pub fn unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(reason: impl ToString) -> Self {
        Self::MalformedDocument {
            reason: reason.to_string(),
        }
    }

    /// Short label used in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "unavailable",
            Self::Decompression { .. } => "decompression",
            Self::MalformedDocument { .. } => "malformed",
            Self::PlaylistUnreadable { .. } => "playlist",
            Self::Io(_) => "io",
        }
    }
}

pub type EpgResult<T> = std::result::Result<T, EpgError>;
