//! Part-preserving cell edits.
//!
//! [`WorkbookCellPatches`] collects literal cell writes keyed by worksheet
//! (tab) name, then by cell coordinate. Application streams each affected
//! worksheet part through `quick-xml`, rewriting only matched `<row>`/`<c>`
//! elements; styles, formulas in untouched cells, merged ranges, and every
//! unrelated package part are copied through byte-for-byte.
//!
//! Writing a literal over a formula cell drops the `<f>` element. INSERT-style
//! template sheets are pure input areas, so the overwrite is intentional; the
//! stale `xl/calcChain.xml` is removed and the workbook is flagged for a full
//! recalculation on load so Excel never sees an inconsistent chain.

use std::collections::BTreeMap;

use girder_model::{CellRef, CellValue, Range};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::shared_strings::SharedStrings;
use crate::xml::{escape_attr, escape_text, needs_space_preserve};
use crate::{XlsxError, XlsxPackage};

/// Literal cell writes for a whole workbook, keyed by worksheet name.
#[derive(Debug, Clone, Default)]
pub struct WorkbookCellPatches {
    sheets: BTreeMap<String, WorksheetCellPatches>,
}

impl WorkbookCellPatches {
    pub fn is_empty(&self) -> bool {
        self.sheets.values().all(WorksheetCellPatches::is_empty)
    }

    /// Get (or create) the patch set for a worksheet by name.
    pub fn sheet_mut(&mut self, sheet_name: impl Into<String>) -> &mut WorksheetCellPatches {
        self.sheets.entry(sheet_name.into()).or_default()
    }

    /// Insert/replace the value written at a single cell.
    pub fn set_cell(
        &mut self,
        sheet_name: impl Into<String>,
        cell: CellRef,
        value: impl Into<CellValue>,
    ) {
        self.sheet_mut(sheet_name).set_cell(cell, value);
    }

    pub fn sheets(&self) -> impl Iterator<Item = (&str, &WorksheetCellPatches)> {
        self.sheets.iter().map(|(name, p)| (name.as_str(), p))
    }
}

/// Literal cell writes within a single worksheet.
///
/// Cells are keyed `(row, col)` so application order is row-major and
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct WorksheetCellPatches {
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl WorksheetCellPatches {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn set_cell(&mut self, cell: CellRef, value: impl Into<CellValue>) {
        self.cells.insert((cell.row, cell.col), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellRef, &CellValue)> {
        self.cells
            .iter()
            .map(|(&(row, col), v)| (CellRef::new(row, col), v))
    }

    /// Bounding box of the patched coordinates.
    pub fn bounds(&self) -> Option<Range> {
        let mut bounds: Option<Range> = None;
        for &(row, col) in self.cells.keys() {
            let cell = Range::single(CellRef::new(row, col));
            bounds = Some(match bounds {
                Some(b) => b.union(&cell),
                None => cell,
            });
        }
        bounds
    }

    /// Patches grouped by 1-based row number, columns ascending.
    fn by_row(&self) -> BTreeMap<u32, Vec<(u32, &CellValue)>> {
        let mut out: BTreeMap<u32, Vec<(u32, &CellValue)>> = BTreeMap::new();
        for (&(row0, col0), value) in &self.cells {
            out.entry(row0 + 1).or_default().push((col0, value));
        }
        out
    }
}

impl XlsxPackage {
    /// Apply a batch of literal cell writes, preserving every untouched part.
    ///
    /// Each touched worksheet's declared `<dimension>` is grown to cover the
    /// written cells; readers that trust the declared range would otherwise
    /// silently ignore appends outside it.
    pub fn apply_cell_patches(&mut self, patches: &WorkbookCellPatches) -> Result<(), XlsxError> {
        if patches.is_empty() {
            return Ok(());
        }

        let mut shared = self
            .part("xl/sharedStrings.xml")
            .map(SharedStrings::parse)
            .transpose()?;

        let mut any_formula_removed = false;

        for (sheet_name, sheet_patches) in patches.sheets() {
            if sheet_patches.is_empty() {
                continue;
            }

            let part = self.worksheet_part(sheet_name)?;
            let original = self
                .part(&part)
                .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;

            let (updated, formula_removed) =
                patch_worksheet_xml(original, sheet_patches, shared.as_mut())?;
            any_formula_removed |= formula_removed;

            let updated = match sheet_patches.bounds() {
                Some(bounds) => grow_dimension_in_worksheet_xml(&updated, bounds)?,
                None => updated,
            };

            self.set_part(part, updated);
        }

        if let Some(sst) = shared.as_ref() {
            if let Some(updated) = sst.write_if_dirty() {
                self.set_part("xl/sharedStrings.xml", updated);
            }
        }

        if any_formula_removed {
            // A calc chain mentioning a cell that no longer holds a formula
            // makes Excel show "repaired records" dialogs. Remove it and force
            // a full recalculation on load instead.
            self.remove_part("xl/calcChain.xml");
            ensure_workbook_full_calc_on_load(self)?;
        }

        Ok(())
    }
}

fn patch_worksheet_xml(
    original: &[u8],
    patches: &WorksheetCellPatches,
    mut shared: Option<&mut SharedStrings>,
) -> Result<(Vec<u8>, bool), XlsxError> {
    let row_patches = patches.by_row();
    let pending_rows: Vec<u32> = row_patches.keys().copied().collect();
    let mut next_pending = 0usize;

    let mut reader = Reader::from_reader(original);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(original.len() + patches.cells.len() * 48));

    let mut buf = Vec::new();
    let mut saw_sheet_data = false;
    let mut formula_removed = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                writer.write_event(Event::Start(e.into_owned()))?;
                let removed = patch_sheet_data(
                    &mut reader,
                    &mut writer,
                    &row_patches,
                    &pending_rows,
                    &mut next_pending,
                    &mut shared,
                )?;
                formula_removed |= removed;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                if row_patches.is_empty() {
                    writer.write_event(Event::Empty(e.into_owned()))?;
                } else {
                    // Convert `<sheetData/>` into `<sheetData>...</sheetData>`.
                    writer.write_event(Event::Start(e.into_owned()))?;
                    flush_pending_rows(
                        &mut writer,
                        &row_patches,
                        &pending_rows,
                        &mut next_pending,
                        u32::MAX,
                        &mut shared,
                    )?;
                    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"worksheet" => {
                if !saw_sheet_data && !row_patches.is_empty() {
                    // Insert the missing <sheetData> just before </worksheet>.
                    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
                    flush_pending_rows(
                        &mut writer,
                        &row_patches,
                        &pending_rows,
                        &mut next_pending,
                        u32::MAX,
                        &mut shared,
                    )?;
                    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok((writer.into_inner(), formula_removed))
}

/// Write every pending patch row strictly below `before_row`.
fn flush_pending_rows(
    writer: &mut Writer<Vec<u8>>,
    row_patches: &BTreeMap<u32, Vec<(u32, &CellValue)>>,
    pending_rows: &[u32],
    next_pending: &mut usize,
    before_row: u32,
    shared: &mut Option<&mut SharedStrings>,
) -> Result<(), XlsxError> {
    while *next_pending < pending_rows.len() && pending_rows[*next_pending] < before_row {
        let row = pending_rows[*next_pending];
        let cells = row_patches.get(&row).map(Vec::as_slice).unwrap_or_default();
        write_new_row(writer, row, cells, shared)?;
        *next_pending += 1;
    }
    Ok(())
}

fn patch_sheet_data<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    row_patches: &BTreeMap<u32, Vec<(u32, &CellValue)>>,
    pending_rows: &[u32],
    next_pending: &mut usize,
    shared: &mut Option<&mut SharedStrings>,
) -> Result<bool, XlsxError> {
    let mut buf = Vec::new();
    let mut formula_removed = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let row_start = e.into_owned();
                let Some(row_num) = parse_row_number(&row_start)? else {
                    // Rows without `r` cannot be matched; preserved unchanged.
                    writer.write_event(Event::Start(row_start))?;
                    continue;
                };

                flush_pending_rows(writer, row_patches, pending_rows, next_pending, row_num, shared)?;

                if let Some(cells) = row_patches.get(&row_num) {
                    if *next_pending < pending_rows.len() && pending_rows[*next_pending] == row_num {
                        *next_pending += 1;
                    }
                    writer.write_event(Event::Start(row_start))?;
                    // patch_row also writes the </row>.
                    formula_removed |= patch_row(reader, writer, row_num, cells, shared)?;
                } else {
                    writer.write_event(Event::Start(row_start))?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row_empty = e.into_owned();
                let Some(row_num) = parse_row_number(&row_empty)? else {
                    writer.write_event(Event::Empty(row_empty))?;
                    continue;
                };

                flush_pending_rows(writer, row_patches, pending_rows, next_pending, row_num, shared)?;

                if let Some(cells) = row_patches.get(&row_num) {
                    if *next_pending < pending_rows.len() && pending_rows[*next_pending] == row_num {
                        *next_pending += 1;
                    }
                    // Convert `<row/>` into `<row>...</row>`.
                    writer.write_event(Event::Start(row_empty))?;
                    for &(col, value) in cells {
                        write_patched_cell(writer, row_num, col, value, None, None, shared)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("row")))?;
                } else {
                    writer.write_event(Event::Empty(row_empty))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                flush_pending_rows(writer, row_patches, pending_rows, next_pending, u32::MAX, shared)?;
                writer.write_event(Event::End(e.into_owned()))?;
                break;
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while patching sheetData".to_string(),
                ))
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(formula_removed)
}

fn patch_row<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    patches: &[(u32, &CellValue)],
    shared: &mut Option<&mut SharedStrings>,
) -> Result<bool, XlsxError> {
    let mut buf = Vec::new();
    let mut patch_idx = 0usize;
    let mut formula_removed = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let cell_start = e.into_owned();
                let Some((at, existing_t, existing_s)) = parse_cell_attrs(&cell_start)? else {
                    writer.write_event(Event::Start(cell_start))?;
                    continue;
                };
                if at.row + 1 != row_num {
                    // Mismatched cell refs are preserved unchanged.
                    writer.write_event(Event::Start(cell_start))?;
                    continue;
                }

                while patch_idx < patches.len() && patches[patch_idx].0 < at.col {
                    let (col, value) = patches[patch_idx];
                    write_patched_cell(writer, row_num, col, value, None, None, shared)?;
                    patch_idx += 1;
                }

                if patch_idx < patches.len() && patches[patch_idx].0 == at.col {
                    let value = patches[patch_idx].1;
                    patch_idx += 1;
                    let had_formula = skip_cell_detecting_formula(reader)?;
                    formula_removed |= had_formula;
                    write_patched_cell(
                        writer,
                        row_num,
                        at.col,
                        value,
                        existing_t.as_deref(),
                        existing_s.as_deref(),
                        shared,
                    )?;
                } else {
                    writer.write_event(Event::Start(cell_start))?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let cell_empty = e.into_owned();
                let Some((at, existing_t, existing_s)) = parse_cell_attrs(&cell_empty)? else {
                    writer.write_event(Event::Empty(cell_empty))?;
                    continue;
                };
                if at.row + 1 != row_num {
                    writer.write_event(Event::Empty(cell_empty))?;
                    continue;
                }

                while patch_idx < patches.len() && patches[patch_idx].0 < at.col {
                    let (col, value) = patches[patch_idx];
                    write_patched_cell(writer, row_num, col, value, None, None, shared)?;
                    patch_idx += 1;
                }

                if patch_idx < patches.len() && patches[patch_idx].0 == at.col {
                    let value = patches[patch_idx].1;
                    patch_idx += 1;
                    write_patched_cell(
                        writer,
                        row_num,
                        at.col,
                        value,
                        existing_t.as_deref(),
                        existing_s.as_deref(),
                        shared,
                    )?;
                } else {
                    writer.write_event(Event::Empty(cell_empty))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                while patch_idx < patches.len() {
                    let (col, value) = patches[patch_idx];
                    write_patched_cell(writer, row_num, col, value, None, None, shared)?;
                    patch_idx += 1;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                break;
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while patching row".to_string(),
                ))
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(formula_removed)
}

/// Consume events up to the matching `</c>`, reporting whether the cell held
/// a formula.
fn skip_cell_detecting_formula<R: std::io::BufRead>(
    reader: &mut Reader<R>,
) -> Result<bool, XlsxError> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut had_formula = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if depth == 0 && e.local_name().as_ref() == b"f" {
                    had_formula = true;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 && e.local_name().as_ref() == b"f" {
                    had_formula = true;
                }
            }
            Event::End(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() == b"c" {
                        break;
                    }
                    return Err(XlsxError::Invalid(
                        "mismatched element nesting in patched cell".to_string(),
                    ));
                }
                depth -= 1;
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while skipping patched cell".to_string(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(had_formula)
}

fn write_new_row(
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    cells: &[(u32, &CellValue)],
    shared: &mut Option<&mut SharedStrings>,
) -> Result<(), XlsxError> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_num.to_string().as_str()));
    writer.write_event(Event::Start(row))?;
    for &(col, value) in cells {
        write_patched_cell(writer, row_num, col, value, None, None, shared)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn write_patched_cell(
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    col: u32,
    value: &CellValue,
    existing_t: Option<&str>,
    existing_s: Option<&str>,
    shared: &mut Option<&mut SharedStrings>,
) -> Result<(), XlsxError> {
    let a1 = CellRef::new(row_num - 1, col).to_a1();

    let mut cell = String::new();
    cell.push_str(r#"<c r=""#);
    cell.push_str(&a1);
    cell.push('"');

    // Formatting on the patched cell is preserved via the existing XF index.
    if let Some(s) = existing_s.and_then(|s| s.parse::<u32>().ok()).filter(|s| *s != 0) {
        cell.push_str(&format!(r#" s="{s}""#));
    }

    let mut ty: Option<&'static str> = None;
    let mut body = String::new();

    match value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            body.push_str("<v>");
            body.push_str(&n.to_string());
            body.push_str("</v>");
        }
        CellValue::Boolean(b) => {
            ty = Some("b");
            body.push_str("<v>");
            body.push_str(if *b { "1" } else { "0" });
            body.push_str("</v>");
        }
        CellValue::String(s) => {
            // Preserve the cell's existing string storage form when it has
            // one; otherwise prefer the shared strings table when the package
            // already carries one.
            let prefer_shared = shared.is_some() && existing_t != Some("inlineStr");
            match (existing_t, prefer_shared) {
                (Some("str"), _) => {
                    ty = Some("str");
                    body.push_str("<v>");
                    body.push_str(&escape_text(s));
                    body.push_str("</v>");
                }
                (_, true) => {
                    let idx = shared
                        .as_deref_mut()
                        .map(|sst| sst.get_or_insert_plain(s))
                        .unwrap_or(0);
                    ty = Some("s");
                    body.push_str("<v>");
                    body.push_str(&idx.to_string());
                    body.push_str("</v>");
                }
                _ => {
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
    }

    if let Some(t) = ty {
        cell.push_str(&format!(r#" t="{t}""#));
    }

    if body.is_empty() {
        cell.push_str("/>");
    } else {
        cell.push('>');
        cell.push_str(&body);
        cell.push_str("</c>");
    }

    writer.get_mut().extend_from_slice(cell.as_bytes());
    Ok(())
}

fn parse_row_number(row: &BytesStart<'_>) -> Result<Option<u32>, XlsxError> {
    for attr in row.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"r" {
            return Ok(attr.unescape_value()?.parse::<u32>().ok());
        }
    }
    Ok(None)
}

fn parse_cell_attrs(
    cell: &BytesStart<'_>,
) -> Result<Option<(CellRef, Option<String>, Option<String>)>, XlsxError> {
    let mut r = None;
    let mut t = None;
    let mut s = None;
    for attr in cell.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"r" => r = Some(value),
            b"t" => t = Some(value),
            b"s" => s = Some(value),
            _ => {}
        }
    }
    let Some(r) = r else { return Ok(None) };
    Ok(CellRef::from_a1(&r).ok().map(|at| (at, t, s)))
}

/// Rewrite (or insert) the worksheet `<dimension>` so the declared rectangle
/// covers `add` as well as whatever it covered before. Growth only; the
/// declared range is never shrunk.
fn grow_dimension_in_worksheet_xml(bytes: &[u8], add: Range) -> Result<Vec<u8>, XlsxError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(bytes.len() + 32));
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut emitted = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"dimension" => {
                if !emitted {
                    write_dimension(&mut writer, existing_dimension(&e)?, add)?;
                    emitted = true;
                }
                skip_to_end(&mut reader, b"dimension")?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                // A stale duplicate after insertion is dropped.
                if !emitted {
                    write_dimension(&mut writer, existing_dimension(&e)?, add)?;
                    emitted = true;
                }
            }
            Event::Start(e) => {
                // `<dimension>` must precede every worksheet child except
                // `<sheetPr>`; insert it before the first such sibling.
                if depth == 1 && !emitted && e.local_name().as_ref() != b"sheetPr" {
                    write_dimension(&mut writer, None, add)?;
                    emitted = true;
                }
                depth += 1;
                writer.write_event(Event::Start(e.into_owned()))?;
            }
            Event::Empty(e) => {
                if depth == 1 && !emitted && e.local_name().as_ref() != b"sheetPr" {
                    write_dimension(&mut writer, None, add)?;
                    emitted = true;
                }
                writer.write_event(Event::Empty(e.into_owned()))?;
            }
            Event::End(e) => {
                if depth == 1 && !emitted {
                    write_dimension(&mut writer, None, add)?;
                    emitted = true;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn existing_dimension(e: &BytesStart<'_>) -> Result<Option<Range>, XlsxError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"ref" {
            // Unparseable declared ranges are treated as undeclared.
            return Ok(Range::from_a1(&attr.unescape_value()?).ok());
        }
    }
    Ok(None)
}

fn write_dimension(
    writer: &mut Writer<Vec<u8>>,
    existing: Option<Range>,
    add: Range,
) -> Result<(), XlsxError> {
    let combined = match existing {
        Some(r) => r.union(&add),
        None => add,
    };
    let mut dim = BytesStart::new("dimension");
    dim.push_attribute(("ref", combined.to_string().as_str()));
    writer.write_event(Event::Empty(dim))?;
    Ok(())
}

fn skip_to_end<R: std::io::BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<(), XlsxError> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                if depth == 0 && e.local_name().as_ref() == name {
                    return Ok(());
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(format!(
                    "unexpected EOF while skipping element {}",
                    String::from_utf8_lossy(name)
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Make sure `xl/workbook.xml` requests a full recalculation on load.
fn ensure_workbook_full_calc_on_load(pkg: &mut XlsxPackage) -> Result<(), XlsxError> {
    let part = "xl/workbook.xml";
    let Some(bytes) = pkg.part(part) else {
        return Ok(());
    };
    if workbook_has_full_calc_on_load(bytes)? {
        return Ok(());
    }

    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(bytes.len() + 32));
    let mut buf = Vec::new();
    let mut saw_calc_pr = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"calcPr" => {
                saw_calc_pr = true;
                writer
                    .get_mut()
                    .extend_from_slice(&calc_pr_with_full_calc(&e)?);
                skip_to_end(&mut reader, b"calcPr")?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"calcPr" => {
                saw_calc_pr = true;
                writer
                    .get_mut()
                    .extend_from_slice(&calc_pr_with_full_calc(&e)?);
            }
            Event::End(e) if e.local_name().as_ref() == b"workbook" => {
                if !saw_calc_pr {
                    writer
                        .get_mut()
                        .extend_from_slice(br#"<calcPr fullCalcOnLoad="1"/>"#);
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    pkg.set_part(part, writer.into_inner());
    Ok(())
}

fn workbook_has_full_calc_on_load(bytes: &[u8]) -> Result<bool, XlsxError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"calcPr" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"fullCalcOnLoad" {
                        let v = attr.unescape_value()?;
                        return Ok(v.as_ref() == "1" || v.eq_ignore_ascii_case("true"));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(false)
}

fn calc_pr_with_full_calc(start: &BytesStart<'_>) -> Result<Vec<u8>, XlsxError> {
    let mut out = String::from("<calcPr");
    let mut has_flag = false;
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        if attr.key.local_name().as_ref() == b"fullCalcOnLoad" {
            has_flag = true;
            out.push_str(r#" fullCalcOnLoad="1""#);
            continue;
        }
        let value = attr.unescape_value()?;
        out.push(' ');
        out.push_str(&key);
        out.push_str(r#"=""#);
        out.push_str(&escape_attr(&value));
        out.push('"');
    }
    if !has_flag {
        out.push_str(r#" fullCalcOnLoad="1""#);
    }
    out.push_str("/>");
    Ok(out.into_bytes())
}
