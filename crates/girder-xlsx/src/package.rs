use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum allowed *inflated* bytes for a single ZIP entry in an XLSX package.
///
/// Safety limit against ZIP bombs when materializing a whole package in
/// memory for preservation/repacking.
pub const MAX_PACKAGE_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Maximum allowed *inflated* bytes across all ZIP entries in an XLSX package.
pub const MAX_PACKAGE_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

/// Size limits enforced by [`XlsxPackage::from_bytes_limited`].
#[derive(Debug, Clone, Copy)]
pub struct XlsxPackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for XlsxPackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_PACKAGE_PART_BYTES,
            max_total_bytes: MAX_PACKAGE_TOTAL_BYTES,
        }
    }
}

/// Errors raised by the package layer.
#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("workbook has no sheet named {0:?}")]
    SheetNotFound(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error("xlsx part is too large to load safely: {part} is {size} bytes (max {max} bytes)")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("xlsx package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

/// One `<sheet>` entry from `xl/workbook.xml`: tab name plus the relationship
/// id that points at the worksheet part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookSheetInfo {
    pub name: String,
    pub rel_id: String,
}

/// An XLSX package inflated into memory, part name -> bytes.
///
/// Every part the caller does not touch round-trips byte-identical through
/// load → edit → [`XlsxPackage::write_to_bytes`]; repacking re-deflates the
/// container but never rewrites untouched part payloads.
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl XlsxPackage {
    /// Inflate a package from raw `.xlsx` bytes using the default size limits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    /// Inflate a package, enforcing the given per-part and total size caps.
    pub fn from_bytes_limited(
        bytes: &[u8],
        limits: XlsxPackageLimits,
    ) -> Result<Self, XlsxError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let size = entry.size();
            if size > limits.max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size,
                    max: limits.max_part_bytes,
                });
            }
            total = total.saturating_add(size);
            if total > limits.max_total_bytes {
                return Err(XlsxError::PackageTooLarge {
                    total,
                    max: limits.max_total_bytes,
                });
            }
            let mut data = Vec::with_capacity(size as usize);
            entry.read_to_end(&mut data)?;
            parts.insert(name, data);
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name)
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().map(|(n, b)| (n.as_str(), b.as_slice()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Repack the package. Parts are written in `BTreeMap` order so output is
    /// deterministic for identical part contents.
    pub fn write_to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    pub fn write_to<W: Write + std::io::Seek>(&self, w: W) -> Result<(), XlsxError> {
        let mut zip = zip::ZipWriter::new(w);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        zip.finish()?;
        Ok(())
    }

    /// The `<sheet>` table from `xl/workbook.xml`, in tab order.
    pub fn workbook_sheets(&self) -> Result<Vec<WorkbookSheetInfo>, XlsxError> {
        let bytes = self
            .part("xl/workbook.xml")
            .ok_or_else(|| XlsxError::MissingPart("xl/workbook.xml".to_string()))?;
        parse_workbook_sheets(bytes)
    }

    /// Resolve a worksheet part path (e.g. `xl/worksheets/sheet3.xml`) from a
    /// tab name, via the workbook relationships part.
    pub fn worksheet_part(&self, sheet_name: &str) -> Result<String, XlsxError> {
        let sheets = self.workbook_sheets()?;
        let sheet = sheets
            .iter()
            .find(|s| s.name == sheet_name)
            .ok_or_else(|| XlsxError::SheetNotFound(sheet_name.to_string()))?;
        crate::openxml::resolve_relationship_target(self, "xl/workbook.xml", &sheet.rel_id)?
            .ok_or_else(|| {
                XlsxError::Invalid(format!(
                    "missing worksheet relationship {} for sheet {:?}",
                    sheet.rel_id, sheet.name
                ))
            })
    }
}

fn parse_workbook_sheets(bytes: &[u8]) -> Result<Vec<WorkbookSheetInfo>, XlsxError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rel_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"name" => name = Some(attr.unescape_value()?.into_owned()),
                        b"id" => rel_id = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                let name = name.ok_or_else(|| {
                    XlsxError::Invalid("workbook sheet entry without name".to_string())
                })?;
                let rel_id = rel_id.ok_or_else(|| {
                    XlsxError::Invalid(format!("workbook sheet {name:?} without r:id"))
                })?;
                sheets.push(WorkbookSheetInfo { name, rel_id });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sheet_table() {
        let xml = br#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="INSERT- HYDRAULICS" sheetId="1" r:id="rId1"/>
    <sheet name="STABILITY CHECK FOR PIER" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;
        let sheets = parse_workbook_sheets(xml).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "INSERT- HYDRAULICS");
        assert_eq!(sheets[0].rel_id, "rId1");
        assert_eq!(sheets[1].rel_id, "rId2");
    }

    #[test]
    fn missing_rel_id_is_invalid() {
        let xml = br#"<workbook><sheets><sheet name="X" sheetId="1"/></sheets></workbook>"#;
        assert!(matches!(
            parse_workbook_sheets(xml),
            Err(XlsxError::Invalid(_))
        ));
    }
}
