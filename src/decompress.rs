// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Suffix-driven decompression of downloaded guide data.

use flate2::read::MultiGzDecoder;
use std::fmt;
use std::io::Read;
use xz2::read::XzDecoder;
use xz2::stream::{CONCATENATED, Stream};

use crate::error::{EpgError, EpgResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const XZ_MAGIC: [u8; 6] = [0xfd, b'7', b'z', b'X', b'Z', 0x00];
// Legacy .lzma streams have no magic number; the properties byte is 0x5d
// for every encoder setting seen in practice.
const LZMA_ALONE_PROPS: u8 = 0x5d;

/// Compression declared by a file name or URL suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Gzip,
    Xz,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
        };
        write!(f, "{}", name)
    }
}

impl Encoding {
    /// Detect the encoding from a URL or file name. Query strings and
    /// fragments are ignored, matching is case-insensitive.
    pub fn from_name(name: &str) -> Self {
        let path = name.split(['?', '#']).next().unwrap_or_default();
        let path = path.to_ascii_lowercase();

        if path.ends_with(".gz") || path.ends_with(".gzip") {
            Self::Gzip
        } else if path.ends_with(".xz") || path.ends_with(".lzma") {
            Self::Xz
        } else {
            Self::Plain
        }
    }

    /// File name suffix used for temporary artifacts of this encoding.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Plain => ".xml",
            Self::Gzip => ".xml.gz",
            Self::Xz => ".xml.xz",
        }
    }

    fn check_magic(&self, bytes: &[u8]) -> EpgResult<()> {
        let ok = match self {
            Self::Plain => true,
            Self::Gzip => bytes.starts_with(&GZIP_MAGIC),
            Self::Xz => bytes.starts_with(&XZ_MAGIC) || bytes.first() == Some(&LZMA_ALONE_PROPS),
        };

        if ok {
            Ok(())
        } else {
            let head: Vec<String> = bytes.iter().take(6).map(|b| format!("{:02x}", b)).collect();
            Err(EpgError::Decompression {
                encoding: *self,
                reason: format!("unexpected magic bytes [{}]", head.join(" ")),
            })
        }
    }
}

/// Decode raw bytes to text, decompressing first when `name` carries a
/// gzip or xz suffix.
pub fn decompress(bytes: &[u8], name: &str) -> EpgResult<String> {
    let encoding = Encoding::from_name(name);
    encoding.check_magic(bytes)?;

    let raw = match encoding {
        Encoding::Plain => return Ok(decode_text(bytes)),
        Encoding::Gzip => {
            let mut out = Vec::new();
            MultiGzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|e| EpgError::Decompression {
                    encoding,
                    reason: e.to_string(),
                })?;
            out
        }
        Encoding::Xz => {
            let stream = Stream::new_auto_decoder(u64::MAX, CONCATENATED).map_err(|e| {
                EpgError::Decompression {
                    encoding,
                    reason: e.to_string(),
                }
            })?;
            let mut out = Vec::new();
            XzDecoder::new_stream(bytes, stream)
                .read_to_end(&mut out)
                .map_err(|e| EpgError::Decompression {
                    encoding,
                    reason: e.to_string(),
                })?;
            out
        }
    };

    Ok(decode_text(&raw))
}

/// UTF-8 when valid, otherwise Latin-1, which maps every byte and so
/// cannot fail. A leading byte order mark is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
