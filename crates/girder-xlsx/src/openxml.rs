//! Open Packaging Convention relationship resolution.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{XlsxError, XlsxPackage};

/// Resolve a relationship id declared by `source_part` to an absolute part
/// name within the package.
///
/// Returns `Ok(None)` when the rels part or the id is absent, or when the
/// relationship is external (`TargetMode="External"`).
pub fn resolve_relationship_target(
    pkg: &XlsxPackage,
    source_part: &str,
    rel_id: &str,
) -> Result<Option<String>, XlsxError> {
    let rels_part = rels_part_name(source_part);
    let Some(bytes) = pkg.part(&rels_part) else {
        return Ok(None);
    };

    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(attr.unescape_value()?.into_owned()),
                        b"Target" => target = Some(attr.unescape_value()?.into_owned()),
                        b"TargetMode" => {
                            external = attr.unescape_value()?.as_ref() == "External";
                        }
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rel_id) {
                    if external {
                        return Ok(None);
                    }
                    return Ok(target.map(|t| resolve_target(source_part, &t)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

/// The `_rels` part that declares relationships for `source_part`.
fn rels_part_name(source_part: &str) -> String {
    match source_part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{source_part}.rels"),
    }
}

/// Resolve a relationship target against the source part's directory,
/// normalizing `.`/`..` segments. Package-absolute targets start with `/`.
fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_part_names() {
        assert_eq!(
            rels_part_name("xl/workbook.xml"),
            "xl/_rels/workbook.xml.rels"
        );
        assert_eq!(rels_part_name("top.xml"), "_rels/top.xml.rels");
    }

    #[test]
    fn target_resolution() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../sharedStrings.xml"),
            "xl/sharedStrings.xml"
        );
    }
}
