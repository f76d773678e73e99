// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Minimal XMLTV document model.
//!
//! Only what the pipeline needs is extracted: each channel's id and first
//! display name, plus the verbatim markup of every top-level `<channel>`
//! and `<programme>` so documents can be merged without re-serializing.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{EpgError, EpgResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmltvChannel {
    pub id: String,
    /// Text of the first `<display-name>` child, if it had any.
    pub display_name: Option<String>,
    /// The element exactly as it appeared in the source document.
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmltvDocument {
    pub channels: Vec<XmltvChannel>,
    /// Verbatim `<programme>` elements in document order.
    pub programmes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Channel,
    Programme,
}

struct Capture {
    kind: Kind,
    start: usize,
    id: String,
    display_name: Option<String>,
    seen_display_name: bool,
    in_display_name: bool,
    text: String,
}

impl Capture {
    fn new(kind: Kind, start: usize, e: &BytesStart) -> Self {
        Self {
            kind,
            start,
            id: get_attribute(e, b"id").unwrap_or_default(),
            display_name: None,
            seen_display_name: false,
            in_display_name: false,
            text: String::new(),
        }
    }
}

fn element_kind(name: &[u8]) -> Option<Kind> {
    match name {
        b"channel" => Some(Kind::Channel),
        b"programme" => Some(Kind::Programme),
        _ => None,
    }
}

/// Get an attribute value with entities resolved.
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = std::str::from_utf8(&attr.value).ok()?;
            return quick_xml::escape::unescape(raw)
                .map(|v| v.into_owned())
                .ok()
                .or_else(|| Some(raw.to_string()));
        }
    }
    None
}

fn resolve_entity(name: &str) -> String {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        if let Some(c) = value.and_then(char::from_u32) {
            return c.to_string();
        }
    } else if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        return resolved.to_string();
    }
    format!("&{};", name)
}

/// Slice the markup of an element out of the source, dropping whatever
/// whitespace the reader consumed before its opening `<`.
fn element_markup(xml: &str, start: usize, end: usize) -> String {
    let slice = xml.get(start..end).unwrap_or_default();
    match slice.find('<') {
        Some(offset) => slice[offset..].trim_end().to_string(),
        None => slice.trim().to_string(),
    }
}

impl XmltvDocument {
    /// Parse an XMLTV document. Any well-formedness problem, a missing or
    /// foreign root element, or content that is not XML at all fails the
    /// whole document.
    pub fn parse(xml: &str) -> EpgResult<Self> {
        if !xml.trim_start().starts_with('<') {
            return Err(EpgError::malformed("content does not look like XML"));
        }

        // No text trimming: entity references split text into several
        // events and trimming each would eat the spaces around them.
        let mut reader = Reader::from_str(xml);

        let mut doc = XmltvDocument::default();
        let mut depth = 0usize;
        let mut seen_root = false;
        let mut closed_root = false;
        let mut capture: Option<Capture> = None;

        loop {
            let position = reader.buffer_position() as usize;
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    let name = e.name();
                    match depth {
                        1 => {
                            if seen_root {
                                return Err(EpgError::malformed("multiple root elements"));
                            }
                            if name.as_ref() != b"tv" {
                                return Err(EpgError::malformed(format!(
                                    "root element is <{}>, expected <tv>",
                                    String::from_utf8_lossy(name.as_ref())
                                )));
                            }
                            seen_root = true;
                        }
                        2 => {
                            capture = element_kind(name.as_ref())
                                .map(|kind| Capture::new(kind, position, e));
                        }
                        3 => {
                            if let Some(cap) = capture.as_mut()
                                && cap.kind == Kind::Channel
                                && name.as_ref() == b"display-name"
                                && !cap.seen_display_name
                            {
                                cap.seen_display_name = true;
                                cap.in_display_name = true;
                                cap.text.clear();
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => match depth {
                    0 => {
                        if seen_root || e.name().as_ref() != b"tv" {
                            return Err(EpgError::malformed("unexpected root element"));
                        }
                        seen_root = true;
                        closed_root = true;
                    }
                    1 => {
                        if let Some(kind) = element_kind(e.name().as_ref()) {
                            let end = reader.buffer_position() as usize;
                            let raw = element_markup(xml, position, end);
                            match kind {
                                Kind::Channel => doc.channels.push(XmltvChannel {
                                    id: get_attribute(e, b"id").unwrap_or_default(),
                                    display_name: None,
                                    raw,
                                }),
                                Kind::Programme => doc.programmes.push(raw),
                            }
                        }
                    }
                    _ => {
                        if let Some(cap) = capture.as_mut()
                            && cap.kind == Kind::Channel
                            && e.name().as_ref() == b"display-name"
                        {
                            // an empty <display-name/> still counts as the first one
                            cap.seen_display_name = true;
                        }
                    }
                },
                Ok(Event::End(_)) => {
                    match depth {
                        1 => closed_root = true,
                        2 => {
                            if let Some(cap) = capture.take() {
                                let raw =
                                    element_markup(xml, cap.start, reader.buffer_position() as usize);
                                match cap.kind {
                                    Kind::Channel => doc.channels.push(XmltvChannel {
                                        id: cap.id,
                                        display_name: cap.display_name,
                                        raw,
                                    }),
                                    Kind::Programme => doc.programmes.push(raw),
                                }
                            }
                        }
                        3 => {
                            if let Some(cap) = capture.as_mut()
                                && cap.in_display_name
                            {
                                let text = cap.text.trim();
                                if !text.is_empty() {
                                    cap.display_name = Some(text.to_string());
                                }
                                cap.in_display_name = false;
                            }
                        }
                        _ => {}
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Text(ref t)) => {
                    if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) {
                        return Err(EpgError::malformed("text outside the root element"));
                    }
                    if let Some(cap) = capture.as_mut()
                        && cap.in_display_name
                    {
                        cap.text.push_str(&String::from_utf8_lossy(t));
                    }
                }
                Ok(Event::CData(ref t)) => {
                    if let Some(cap) = capture.as_mut()
                        && cap.in_display_name
                    {
                        cap.text.push_str(&String::from_utf8_lossy(t));
                    }
                }
                Ok(Event::GeneralRef(ref r)) => {
                    if let Some(cap) = capture.as_mut()
                        && cap.in_display_name
                    {
                        cap.text.push_str(&resolve_entity(&String::from_utf8_lossy(r)));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(EpgError::malformed(format!(
                        "XML error at byte {}: {}",
                        reader.error_position(),
                        e
                    )));
                }
                _ => {}
            }
        }

        if !seen_root {
            return Err(EpgError::malformed("missing <tv> root element"));
        }
        if !closed_root {
            return Err(EpgError::malformed("unterminated <tv> root element"));
        }

        Ok(doc)
    }

    pub fn programme_count(&self) -> usize {
        self.programmes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="test">
  <channel id="bbc1.uk">
    <display-name>BBC One</display-name>
    <display-name>BBC 1</display-name>
    <icon src="http://example.com/bbc1.png"/>
  </channel>
  <channel id="ch4.uk"><display-name>Channel &amp; Four</display-name></channel>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="bbc1.uk">
    <title>News at Noon</title>
  </programme>
  <programme start="20240115130000 +0000" channel="ch4.uk"/>
</tv>"#;

    #[test]
    fn test_parse_channels_and_programmes() {
        let doc = XmltvDocument::parse(SAMPLE).unwrap();

        assert_eq!(doc.channels.len(), 2);
        assert_eq!(doc.channels[0].id, "bbc1.uk");
        assert_eq!(doc.channels[0].display_name.as_deref(), Some("BBC One"));
        assert_eq!(doc.channels[1].display_name.as_deref(), Some("Channel & Four"));
        assert_eq!(doc.programme_count(), 2);
    }

    #[test]
    fn test_raw_markup_is_verbatim() {
        let doc = XmltvDocument::parse(SAMPLE).unwrap();

        assert!(doc.channels[0].raw.starts_with("<channel id=\"bbc1.uk\">"));
        assert!(doc.channels[0].raw.ends_with("</channel>"));
        assert!(doc.channels[0].raw.contains("<icon src=\"http://example.com/bbc1.png\"/>"));
        assert_eq!(
            doc.channels[1].raw,
            "<channel id=\"ch4.uk\"><display-name>Channel &amp; Four</display-name></channel>"
        );
        assert!(doc.programmes[0].starts_with("<programme start="));
        assert!(doc.programmes[0].ends_with("</programme>"));
        assert_eq!(
            doc.programmes[1],
            "<programme start=\"20240115130000 +0000\" channel=\"ch4.uk\"/>"
        );
    }

    #[test]
    fn test_channel_without_display_name() {
        let doc = XmltvDocument::parse(r#"<tv><channel id="x"><icon src="a"/></channel></tv>"#)
            .unwrap();
        assert_eq!(doc.channels[0].display_name, None);
    }

    #[test]
    fn test_empty_first_display_name_wins() {
        let doc = XmltvDocument::parse(
            r#"<tv><channel id="x"><display-name/><display-name>Second</display-name></channel></tv>"#,
        )
        .unwrap();
        assert_eq!(doc.channels[0].display_name, None);
    }

    #[test]
    fn test_numeric_entity_in_display_name() {
        let doc = XmltvDocument::parse(
            r#"<tv><channel id="x"><display-name>Caf&#233; TV</display-name></channel></tv>"#,
        )
        .unwrap();
        assert_eq!(doc.channels[0].display_name.as_deref(), Some("Caf\u{e9} TV"));
    }

    #[test]
    fn test_empty_tv_root() {
        let doc = XmltvDocument::parse("<tv/>").unwrap();
        assert!(doc.channels.is_empty());
    }

    #[test]
    fn test_rejects_non_xml() {
        assert!(XmltvDocument::parse("404 Not Found").is_err());
    }

    #[test]
    fn test_rejects_mismatched_tags() {
        let err = XmltvDocument::parse("<tv><channel id=\"a\"></programme></tv>").unwrap_err();
        assert!(matches!(err, EpgError::MalformedDocument { .. }));
    }

    #[test]
    fn test_rejects_truncated_document() {
        assert!(XmltvDocument::parse("<tv><channel id=\"a\"><display-name>A").is_err());
    }

    #[test]
    fn test_rejects_foreign_root() {
        assert!(XmltvDocument::parse("<html><body/></html>").is_err());
    }
}
