//! Shared strings table (`xl/sharedStrings.xml`) handling.
//!
//! Existing `<si>` items are kept as raw XML and written back verbatim, so a
//! rewrite triggered by appending new strings never disturbs rich-text runs
//! or phonetic data the template may carry. Only plain (single `<t>`) items
//! participate in dedup lookups.

use std::collections::HashMap;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::XlsxError;

#[derive(Debug, Clone)]
struct SharedStringItem {
    /// Inner XML of the `<si>` element, written back unchanged.
    raw_xml: Vec<u8>,
    /// Flattened text content (all `<t>` runs concatenated).
    plain: String,
    /// True when the item is a single plain `<t>` with no runs.
    is_plain: bool,
}

/// In-memory shared strings table.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    items: Vec<SharedStringItem>,
    plain_index: HashMap<String, u32>,
    dirty: bool,
}

impl SharedStrings {
    /// Parse `xl/sharedStrings.xml`.
    pub fn parse(bytes: &[u8]) -> Result<Self, XlsxError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();

        let mut items = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"si" => {
                    items.push(read_si_item(&mut reader)?);
                }
                Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                    items.push(SharedStringItem {
                        raw_xml: Vec::new(),
                        plain: String::new(),
                        is_plain: true,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let mut plain_index = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            if item.is_plain {
                plain_index.entry(item.plain.clone()).or_insert(idx as u32);
            }
        }

        Ok(Self {
            items,
            plain_index,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flattened text of item `idx` (rich items flatten to their plain runs).
    pub fn get(&self, idx: u32) -> Option<&str> {
        self.items.get(idx as usize).map(|i| i.plain.as_str())
    }

    /// Index of `text`, appending a plain item if the table lacks one.
    pub fn get_or_insert_plain(&mut self, text: &str) -> u32 {
        if let Some(idx) = self.plain_index.get(text).copied() {
            return idx;
        }
        let idx = self.items.len() as u32;
        self.items.push(SharedStringItem {
            raw_xml: plain_si_inner(text),
            plain: text.to_string(),
            is_plain: true,
        });
        self.plain_index.insert(text.to_string(), idx);
        self.dirty = true;
        idx
    }

    /// Serialized part bytes, or `None` when nothing was appended.
    pub fn write_if_dirty(&self) -> Option<Vec<u8>> {
        if !self.dirty {
            return None;
        }
        let mut out = Vec::new();
        out.extend_from_slice(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.extend_from_slice(
            format!(
                r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">"#,
                n = self.items.len()
            )
            .as_bytes(),
        );
        for item in &self.items {
            if item.raw_xml.is_empty() {
                out.extend_from_slice(b"<si/>");
            } else {
                out.extend_from_slice(b"<si>");
                out.extend_from_slice(&item.raw_xml);
                out.extend_from_slice(b"</si>");
            }
        }
        out.extend_from_slice(b"</sst>");
        Some(out)
    }
}

/// Consume events up to the matching `</si>`, capturing raw inner XML and
/// flattened `<t>` text.
fn read_si_item<R: std::io::BufRead>(
    reader: &mut Reader<R>,
) -> Result<SharedStringItem, XlsxError> {
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_t = false;
    let mut plain = String::new();
    let mut is_plain = true;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if depth == 0 && e.local_name().as_ref() != b"t" {
                    is_plain = false;
                }
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
                depth += 1;
                writer.write_event(Event::Start(e.into_owned()))?;
            }
            Event::Empty(e) => {
                if depth == 0 && e.local_name().as_ref() != b"t" {
                    is_plain = false;
                }
                writer.write_event(Event::Empty(e.into_owned()))?;
            }
            Event::End(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() == b"si" {
                        break;
                    }
                    return Err(XlsxError::Invalid(
                        "mismatched element nesting in sharedStrings.xml".to_string(),
                    ));
                }
                depth -= 1;
                if e.local_name().as_ref() == b"t" {
                    in_t = false;
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Text(t) => {
                if in_t {
                    plain.push_str(&t.unescape()?);
                }
                writer.write_event(Event::Text(t.into_owned()))?;
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF inside <si> in sharedStrings.xml".to_string(),
                ))
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(SharedStringItem {
        raw_xml: writer.into_inner(),
        plain,
        is_plain,
    })
}

fn plain_si_inner(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        out.extend_from_slice(br#" xml:space="preserve""#);
    }
    out.push(b'>');
    out.extend_from_slice(crate::xml::escape_text(text).as_bytes());
    out.extend_from_slice(b"</t>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SST: &[u8] = br#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>Span (m):</t></si>
  <si><r><rPr><b/></rPr><t>DECK </t></r><r><t>LEVEL</t></r></si>
  <si><t xml:space="preserve"> padded </t></si>
</sst>"#;

    #[test]
    fn parse_flattens_and_indexes() {
        let sst = SharedStrings::parse(SST).unwrap();
        assert_eq!(sst.len(), 3);
        assert_eq!(sst.get(0), Some("Span (m):"));
        assert_eq!(sst.get(1), Some("DECK LEVEL"));
        assert_eq!(sst.get(2), Some(" padded "));
    }

    #[test]
    fn lookup_hits_existing_plain_items_only() {
        let mut sst = SharedStrings::parse(SST).unwrap();
        assert_eq!(sst.get_or_insert_plain("Span (m):"), 0);
        assert!(sst.write_if_dirty().is_none());

        // The rich item's flattened text is not a dedup target.
        assert_eq!(sst.get_or_insert_plain("DECK LEVEL"), 3);
        let rewritten = sst.write_if_dirty().expect("table grew");
        let xml = String::from_utf8(rewritten).unwrap();
        // Existing rich markup is preserved verbatim in the rewrite.
        assert!(xml.contains("<r><rPr><b/></rPr><t>DECK </t></r>"));
        assert!(xml.contains(r#"uniqueCount="4""#));
    }

    #[test]
    fn appended_strings_escape_and_preserve_space() {
        let mut sst = SharedStrings::default();
        sst.get_or_insert_plain("a < b & c");
        sst.get_or_insert_plain(" lead");
        let xml = String::from_utf8(sst.write_if_dirty().unwrap()).unwrap();
        assert!(xml.contains("<t>a &lt; b &amp; c</t>"));
        assert!(xml.contains(r#"<t xml:space="preserve"> lead</t>"#));
    }
}
