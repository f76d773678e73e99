// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! EPG source URL cleanup and filtering.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use url::{Host, Url};

use crate::config::EpgConfig;

const TRAILING_JUNK: &[char] = &[',', ';', '"', '\''];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    Invalid,
    UnsupportedScheme,
    IgnoredExtension,
    Denied,
    NotAllowed,
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "not a valid URL",
            Self::UnsupportedScheme => "not http or https",
            Self::IgnoredExtension => "ignored extension",
            Self::Denied => "matches a deny pattern",
            Self::NotAllowed => "matches no allow pattern",
            Self::Duplicate => "duplicate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedSource {
    pub url: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedSources {
    /// Usable sources, unique, in first-seen order.
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedSource>,
}

/// Decides which raw EPG URLs are worth fetching.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
    ignored_extensions: Vec<String>,
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            deny: Vec::new(),
            ignored_extensions: EpgConfig::default().ignored_extensions,
        }
    }
}

fn compile(patterns: &[String], list: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).with_context(|| format!("Invalid epg.{} pattern: {}", list, p))
        })
        .collect()
}

impl SourceFilter {
    pub fn from_config(config: &EpgConfig) -> Result<Self> {
        Ok(Self {
            allow: compile(&config.allow, "allow")?,
            deny: compile(&config.deny, "deny")?,
            ignored_extensions: config
                .ignored_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
        })
    }

    /// Trim whitespace and trailing separators left over from attribute
    /// lists.
    pub fn clean(raw: &str) -> &str {
        raw.trim().trim_end_matches(TRAILING_JUNK).trim_end()
    }

    /// Check a cleaned URL against every rule except deduplication.
    pub fn check(&self, url: &str) -> Result<(), RejectReason> {
        let parsed = Url::parse(url).map_err(|_| RejectReason::Invalid)?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RejectReason::UnsupportedScheme);
        }
        match parsed.host() {
            Some(Host::Domain(domain)) if domain.contains('.') => {}
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {}
            _ => return Err(RejectReason::Invalid),
        }

        let path = parsed.path().to_lowercase();
        if self
            .ignored_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return Err(RejectReason::IgnoredExtension);
        }

        if self.deny.iter().any(|re| re.is_match(url)) {
            return Err(RejectReason::Denied);
        }
        if !self.allow.is_empty() && !self.allow.iter().any(|re| re.is_match(url)) {
            return Err(RejectReason::NotAllowed);
        }

        Ok(())
    }

    pub fn normalize<'a, I>(&self, raw: I) -> NormalizedSources
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sources = NormalizedSources::default();

        for candidate in raw {
            let url = Self::clean(candidate);
            if url.is_empty() {
                continue;
            }

            let verdict = if sources.accepted.iter().any(|seen| seen == url) {
                Err(RejectReason::Duplicate)
            } else {
                self.check(url)
            };

            match verdict {
                Ok(()) => sources.accepted.push(url.to_string()),
                Err(reason) => {
                    debug!("Skipping EPG source {}: {}", url, reason);
                    sources.rejected.push(RejectedSource {
                        url: url.to_string(),
                        reason,
                    });
                }
            }
        }

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(allow: &[&str], deny: &[&str]) -> SourceFilter {
        SourceFilter::from_config(&EpgConfig {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
            ..EpgConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_clean_trailing_junk() {
        assert_eq!(
            SourceFilter::clean("  http://epg.example.org/guide.xml.gz\";, "),
            "http://epg.example.org/guide.xml.gz"
        );
    }

    #[test]
    fn test_normalize_keeps_first_seen_order() {
        let sources = SourceFilter::default().normalize([
            "http://b.example.org/2.xml",
            "http://a.example.org/1.xml.gz,",
            "http://b.example.org/2.xml",
        ]);

        assert_eq!(
            sources.accepted,
            vec!["http://b.example.org/2.xml", "http://a.example.org/1.xml.gz"]
        );
        assert_eq!(sources.rejected[0].reason, RejectReason::Duplicate);
    }

    #[test]
    fn test_rejections() {
        let f = SourceFilter::default();
        assert_eq!(f.check("not a url"), Err(RejectReason::Invalid));
        assert_eq!(f.check("ftp://epg.example.org/a.xml"), Err(RejectReason::UnsupportedScheme));
        assert_eq!(f.check("http://localhost/a.xml"), Err(RejectReason::Invalid));
        assert_eq!(f.check("http://img.example.org/logo.PNG"), Err(RejectReason::IgnoredExtension));
        assert_eq!(f.check("http://127.0.0.1:8080/epg.xml"), Ok(()));
    }

    #[test]
    fn test_allow_and_deny() {
        let f = filter(&["\\.xml(\\.gz)?$"], &["blocked\\.example"]);
        assert_eq!(f.check("http://epg.example.org/a.xml.gz"), Ok(()));
        assert_eq!(f.check("http://epg.example.org/a.json"), Err(RejectReason::NotAllowed));
        assert_eq!(f.check("http://blocked.example/a.xml"), Err(RejectReason::Denied));
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let err = SourceFilter::from_config(&EpgConfig {
            deny: vec!["(".to_string()],
            ..EpgConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("epg.deny"));
    }
}
