//! Minimal XLSX serializer for fixtures.
//!
//! Writes a small multi-sheet workbook from literal cell/merge specs. This is
//! *not* a full-fidelity exporter; it exists so tests can build template-like
//! packages (INSERT sheets, formula cells with or without cached results,
//! merged label blocks) without shipping binary fixtures.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use girder_model::{Cell, CellRef, CellValue, Range};

use crate::xml::{escape_attr, escape_text, needs_space_preserve};
use crate::XlsxError;

/// One worksheet in a fixture workbook.
#[derive(Debug, Clone, Default)]
pub struct FixtureSheet {
    pub name: String,
    cells: Vec<(CellRef, Cell)>,
    merges: Vec<Range>,
    dimension: Option<Range>,
}

impl FixtureSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a cell at an A1 address. Panics on a malformed address; fixture
    /// specs are compile-time constants in tests.
    pub fn cell(mut self, a1: &str, cell: Cell) -> Self {
        let at = CellRef::from_a1(a1).expect("fixture cell address");
        self.cells.push((at, cell));
        self
    }

    pub fn merge(mut self, a1: &str) -> Self {
        self.merges
            .push(Range::from_a1(a1).expect("fixture merge range"));
        self
    }

    /// Declare an explicit `<dimension>`; otherwise it is computed from the
    /// populated cells.
    pub fn dimension(mut self, a1: &str) -> Self {
        self.dimension = Some(Range::from_a1(a1).expect("fixture dimension range"));
        self
    }
}

/// Serialize a fixture workbook with inline strings.
pub fn write_fixture_xlsx(sheets: &[FixtureSheet]) -> Result<Vec<u8>, XlsxError> {
    write_fixture(sheets, false)
}

/// Serialize a fixture workbook that stores strings in a shared strings
/// table, exercising the `t="s"` read/patch paths.
pub fn write_fixture_xlsx_shared_strings(sheets: &[FixtureSheet]) -> Result<Vec<u8>, XlsxError> {
    write_fixture(sheets, true)
}

fn write_fixture(sheets: &[FixtureSheet], shared_strings: bool) -> Result<Vec<u8>, XlsxError> {
    let mut sst: Vec<String> = Vec::new();
    let mut sst_index: BTreeMap<String, u32> = BTreeMap::new();

    let mut sheet_parts = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        let sst_ref = shared_strings.then_some((&mut sst, &mut sst_index));
        sheet_parts.push(worksheet_xml(sheet, sst_ref));
    }

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(content_types_xml(sheets.len(), shared_strings && !sst.is_empty()).as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(workbook_xml(sheets).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(workbook_rels_xml(sheets.len(), shared_strings && !sst.is_empty()).as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(STYLES.as_bytes())?;

        if shared_strings && !sst.is_empty() {
            zip.start_file("xl/sharedStrings.xml", options)?;
            zip.write_all(shared_strings_xml(&sst).as_bytes())?;
        }

        for (idx, xml) in sheet_parts.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
            zip.write_all(xml.as_bytes())?;
        }

        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>
"#;

// Four cell XFs so fixtures can reference small style indices.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="2"><font/><font><b/></font></fonts>
  <fills count="1"><fill><patternFill patternType="none"/></fill></fills>
  <borders count="1"><border/></borders>
  <cellStyleXfs count="1"><xf/></cellStyleXfs>
  <cellXfs count="4">
    <xf numFmtId="0" fontId="0"/>
    <xf numFmtId="0" fontId="1" applyFont="1"/>
    <xf numFmtId="2" fontId="0" applyNumberFormat="1"/>
    <xf numFmtId="2" fontId="1" applyNumberFormat="1" applyFont="1"/>
  </cellXfs>
</styleSheet>
"#;

fn content_types_xml(sheet_count: usize, with_sst: bool) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
"#,
    );
    for idx in 1..=sheet_count {
        out.push_str(&format!(
            "  <Override PartName=\"/xl/worksheets/sheet{idx}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n"
        ));
    }
    if with_sst {
        out.push_str("  <Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>\n");
    }
    out.push_str("</Types>\n");
    out
}

fn workbook_xml(sheets: &[FixtureSheet]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
"#,
    );
    for (idx, sheet) in sheets.iter().enumerate() {
        out.push_str(&format!(
            "    <sheet name=\"{}\" sheetId=\"{id}\" r:id=\"rId{id}\"/>\n",
            escape_attr(&sheet.name),
            id = idx + 1
        ));
    }
    out.push_str("  </sheets>\n</workbook>\n");
    out
}

fn workbook_rels_xml(sheet_count: usize, with_sst: bool) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
    );
    for idx in 1..=sheet_count {
        out.push_str(&format!(
            "  <Relationship Id=\"rId{idx}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{idx}.xml\"/>\n"
        ));
    }
    let mut next = sheet_count + 1;
    out.push_str(&format!(
        "  <Relationship Id=\"rId{next}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\n"
    ));
    next += 1;
    if with_sst {
        out.push_str(&format!(
            "  <Relationship Id=\"rId{next}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" Target=\"sharedStrings.xml\"/>\n"
        ));
    }
    out.push_str("</Relationships>\n");
    out
}

fn shared_strings_xml(items: &[String]) -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">"#,
        n = items.len()
    );
    for item in items {
        out.push_str("<si><t");
        if needs_space_preserve(item) {
            out.push_str(r#" xml:space="preserve""#);
        }
        out.push('>');
        out.push_str(&escape_text(item));
        out.push_str("</t></si>");
    }
    out.push_str("</sst>\n");
    out
}

type SstState<'a> = (&'a mut Vec<String>, &'a mut BTreeMap<String, u32>);

fn worksheet_xml(sheet: &FixtureSheet, mut sst: Option<SstState<'_>>) -> String {
    let mut rows: BTreeMap<u32, BTreeMap<u32, &Cell>> = BTreeMap::new();
    for (at, cell) in &sheet.cells {
        rows.entry(at.row).or_default().insert(at.col, cell);
    }

    let mut bounds = sheet.dimension;
    if bounds.is_none() {
        for (at, _) in &sheet.cells {
            let cell = Range::single(*at);
            bounds = Some(match bounds {
                Some(b) => b.union(&cell),
                None => cell,
            });
        }
    }

    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
"#,
    );
    if let Some(bounds) = bounds {
        out.push_str(&format!("  <dimension ref=\"{bounds}\"/>\n"));
    }
    out.push_str("  <sheetData>\n");
    for (&row, cells) in &rows {
        out.push_str(&format!("    <row r=\"{}\">", row + 1));
        for (&col, &cell) in cells {
            write_fixture_cell(&mut out, CellRef::new(row, col), cell, &mut sst);
        }
        out.push_str("</row>\n");
    }
    out.push_str("  </sheetData>\n");
    if !sheet.merges.is_empty() {
        out.push_str(&format!(
            "  <mergeCells count=\"{}\">",
            sheet.merges.len()
        ));
        for merge in &sheet.merges {
            out.push_str(&format!("<mergeCell ref=\"{merge}\"/>"));
        }
        out.push_str("</mergeCells>\n");
    }
    out.push_str("</worksheet>\n");
    out
}

fn write_fixture_cell(out: &mut String, at: CellRef, cell: &Cell, sst: &mut Option<SstState<'_>>) {
    out.push_str(&format!("<c r=\"{}\"", at.to_a1()));
    if let Some(s) = cell.style_index.filter(|s| *s != 0) {
        out.push_str(&format!(" s=\"{s}\""));
    }

    let mut body = String::new();
    if let Some(formula) = &cell.formula {
        body.push_str("<f>");
        body.push_str(&escape_text(formula));
        body.push_str("</f>");
    }

    let mut ty = None;
    match &cell.value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            body.push_str(&format!("<v>{n}</v>"));
        }
        CellValue::Boolean(b) => {
            ty = Some("b");
            body.push_str(if *b { "<v>1</v>" } else { "<v>0</v>" });
        }
        CellValue::String(s) => {
            if cell.formula.is_some() {
                // A string-producing formula caches its result as t="str".
                ty = Some("str");
                body.push_str(&format!("<v>{}</v>", escape_text(s)));
            } else if let Some((items, index)) = sst.as_mut() {
                let idx = *index.entry(s.clone()).or_insert_with(|| {
                    items.push(s.clone());
                    (items.len() - 1) as u32
                });
                ty = Some("s");
                body.push_str(&format!("<v>{idx}</v>"));
            } else {
                ty = Some("inlineStr");
                body.push_str("<is><t");
                if needs_space_preserve(s) {
                    body.push_str(r#" xml:space="preserve""#);
                }
                body.push('>');
                body.push_str(&escape_text(s));
                body.push_str("</t></is>");
            }
        }
    }

    if let Some(t) = ty {
        out.push_str(&format!(" t=\"{t}\""));
    }
    if body.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&body);
        out.push_str("</c>");
    }
}
