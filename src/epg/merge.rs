// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, warn};

use super::fetch::{FetchResults, SourceFailure};
use super::xmltv::XmltvDocument;
use crate::error::EpgError;
use crate::fsutil::write_atomic;

const GENERATOR_NAME: &str = env!("CARGO_PKG_NAME");

/// Per-source outcome of a consolidation batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<SourceFailure>,
    pub channels: usize,
    pub programmes: usize,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Sources whose body was retrieved, whether or not it was usable.
    pub fn downloaded(&self) -> usize {
        self.succeeded.len()
            + self
                .failed
                .iter()
                .filter(|failure| !failure.is_download_failure())
                .count()
    }

    /// Percentage of downloaded sources that decoded, parsed and made it
    /// into the output. Download failures are not counted.
    pub fn success_rate(&self) -> Option<f64> {
        match self.downloaded() {
            0 => None,
            n => Some(self.succeeded.len() as f64 / n as f64 * 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub new_channels: usize,
    pub programmes: usize,
}

/// Accumulates channels and programmes from several XMLTV documents.
///
/// A channel is kept only the first time its id is seen; every programme
/// is kept.
#[derive(Debug, Default)]
pub struct EpgMerger {
    seen_ids: HashSet<String>,
    channels: Vec<String>,
    programmes: Vec<String>,
    succeeded: Vec<String>,
    failed: Vec<SourceFailure>,
}

impl EpgMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the channels and programmes of `doc`. The document is consumed
    /// so its strings move into the merged output without copying.
    pub fn add_document(&mut self, source: &str, doc: XmltvDocument) -> MergeStats {
        let mut stats = MergeStats {
            programmes: doc.programmes.len(),
            ..MergeStats::default()
        };

        for channel in doc.channels {
            if channel.id.is_empty() || self.seen_ids.contains(&channel.id) {
                continue;
            }
            self.seen_ids.insert(channel.id);
            self.channels.push(channel.raw);
            stats.new_channels += 1;
        }

        self.programmes.extend(doc.programmes);

        info!(
            "Merged {}: {} new channels, {} programmes",
            source, stats.new_channels, stats.programmes
        );
        self.succeeded.push(source.to_string());
        stats
    }

    /// Parse and merge raw XMLTV text. A document that fails to parse is
    /// recorded against `source` and contributes nothing.
    pub fn add_xml(&mut self, source: &str, xml: &str) -> Option<MergeStats> {
        match XmltvDocument::parse(xml) {
            Ok(doc) => Some(self.add_document(source, doc)),
            Err(e) => {
                self.record_failure(source, &e);
                None
            }
        }
    }

    pub fn record_failure(&mut self, source: &str, error: &EpgError) {
        warn!("EPG source failed: {}: {}", source, error);
        if !self.failed.iter().any(|f| f.url == source) {
            self.failed.push(SourceFailure::new(source, error));
        }
    }

    /// Fold a whole fetch batch in, keeping its order. Each document is
    /// dropped as soon as it has been merged.
    pub fn add_results(&mut self, results: FetchResults) {
        for fetched in results.documents {
            self.add_document(&fetched.url, fetched.document);
        }
        for failure in results.failures {
            if !self.failed.iter().any(|f| f.url == failure.url) {
                self.failed.push(failure);
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn programme_count(&self) -> usize {
        self.programmes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty()
    }

    pub fn write_xml<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        writeln!(w, r#"<tv generator-info-name="{}">"#, GENERATOR_NAME)?;
        for channel in &self.channels {
            writeln!(w, "\t{}", channel)?;
        }
        for programme in &self.programmes {
            writeln!(w, "\t{}", programme)?;
        }
        writeln!(w, "</tv>")?;
        Ok(())
    }

    pub fn to_xml(&self) -> String {
        let mut buf = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.write_xml(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Write the merged document gzip-compressed, replacing `path`
    /// atomically.
    pub fn write_gzip(&self, path: &Path) -> Result<()> {
        write_atomic(path, |f| {
            let mut encoder = GzEncoder::new(f, Compression::default());
            self.write_xml(&mut encoder)?;
            encoder.finish()?;
            Ok(())
        })
        .with_context(|| format!("Failed to write EPG file: {}", path.display()))?;

        info!(
            "EPG written to {}: {} channels, {} programmes",
            path.display(),
            self.channel_count(),
            self.programme_count()
        );
        Ok(())
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            succeeded: self
                .succeeded
                .iter()
                .filter(|url| !self.failed.iter().any(|f| &f.url == *url))
                .cloned()
                .collect(),
            failed: self.failed.clone(),
            channels: self.channel_count(),
            programmes: self.programme_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epg::fetch::FetchedEpg;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const FIRST: &str = r#"<tv>
  <channel id="5"><display-name>Five</display-name></channel>
  <channel id="6"><display-name>Six</display-name></channel>
  <programme channel="5" start="1"><title>A</title></programme>
  <programme channel="6" start="1"><title>B</title></programme>
</tv>"#;

    const SECOND: &str = r#"<tv>
  <channel id="5"><display-name>Channel 5</display-name></channel>
  <programme channel="5" start="1"><title>A</title></programme>
  <programme channel="5" start="2"><title>C</title></programme>
  <programme channel="5" start="3"><title>D</title></programme>
</tv>"#;

    #[test]
    fn test_first_channel_wins_programmes_add_up() {
        let mut merger = EpgMerger::new();
        merger.add_xml("http://a/1.xml", FIRST).unwrap();
        let stats = merger.add_xml("http://b/2.xml", SECOND).unwrap();

        assert_eq!(stats.new_channels, 0);
        assert_eq!(merger.channel_count(), 2);
        assert_eq!(merger.programme_count(), 5);

        let xml = merger.to_xml();
        assert_eq!(xml.matches("<channel id=\"5\">").count(), 1);
        assert!(xml.contains("<display-name>Five</display-name>"));
        assert!(!xml.contains("Channel 5"));
    }

    #[test]
    fn test_merged_output_parses() {
        let mut merger = EpgMerger::new();
        merger.add_xml("a", FIRST);
        merger.add_xml("b", SECOND);

        let doc = XmltvDocument::parse(&merger.to_xml()).unwrap();
        assert_eq!(doc.channels.len(), 2);
        assert_eq!(doc.programme_count(), 5);
    }

    #[test]
    fn test_malformed_source_recorded() {
        let mut merger = EpgMerger::new();
        merger.add_xml("http://a/1.xml", FIRST);
        assert!(merger.add_xml("http://bad/2.xml", "<tv><channel></tv>").is_none());
        merger.add_xml("http://c/3.xml", SECOND);

        let report = merger.report();
        assert_eq!(report.succeeded, vec!["http://a/1.xml", "http://c/3.xml"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].url, "http://bad/2.xml");
        assert_eq!(report.programmes, 5);
        assert_eq!(report.success_rate().map(|r| r.round()), Some(67.0));
    }

    #[test]
    fn test_download_failures_do_not_lower_success_rate() {
        let mut merger = EpgMerger::new();
        merger.add_xml("http://a/1.xml", FIRST);
        merger.record_failure(
            "http://down/2.xml",
            &EpgError::unavailable("http://down/2.xml", "HTTP status 404 Not Found"),
        );
        merger.add_xml("http://bad/3.xml", "<tv><channel></tv>");

        let report = merger.report();
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.downloaded(), 2);
        assert_eq!(report.success_rate(), Some(50.0));
    }

    #[test]
    fn test_only_download_failures_has_no_rate() {
        let mut merger = EpgMerger::new();
        merger.record_failure("http://down/1.xml", &EpgError::unavailable("http://down/1.xml", "timeout"));

        let report = merger.report();
        assert_eq!(report.attempted(), 1);
        assert_eq!(report.success_rate(), None);
    }

    #[test]
    fn test_add_results_takes_documents() {
        let results = FetchResults {
            documents: vec![
                FetchedEpg {
                    url: "http://a/1.xml".to_string(),
                    document: XmltvDocument::parse(FIRST).unwrap(),
                },
                FetchedEpg {
                    url: "http://c/3.xml".to_string(),
                    document: XmltvDocument::parse(SECOND).unwrap(),
                },
            ],
            failures: vec![SourceFailure::new(
                "http://down/2.xml",
                &EpgError::unavailable("http://down/2.xml", "timeout"),
            )],
        };

        let mut merger = EpgMerger::new();
        merger.add_results(results);

        let report = merger.report();
        assert_eq!(report.succeeded, vec!["http://a/1.xml", "http://c/3.xml"]);
        assert_eq!(report.failed[0].url, "http://down/2.xml");
        assert_eq!((report.channels, report.programmes), (2, 5));
        assert_eq!(report.success_rate(), Some(100.0));
        assert!(merger.to_xml().contains("<display-name>Six</display-name>"));
    }

    #[test]
    fn test_write_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EPG.xml.gz");

        let mut merger = EpgMerger::new();
        merger.add_xml("a", FIRST);
        merger.write_gzip(&path).unwrap();

        let mut xml = String::new();
        GzDecoder::new(std::fs::File::open(&path).unwrap())
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.trim_end().ends_with("</tv>"));
        assert_eq!(xml.matches("<programme").count(), 2);
    }
}
