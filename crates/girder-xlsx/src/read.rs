//! Worksheet part reader.
//!
//! Parses a worksheet XML part into a model [`Worksheet`]: the declared
//! `<dimension>`, merged regions, and every `<c>` cell including cached
//! formula results. A `<c>` carrying `<f>` but no `<v>` becomes an
//! *unevaluated* formula cell ([`girder_model::Cell::literal`] returns
//! `None` for it); spreadsheet files only hold cached results, so a raw
//! read can never evaluate anything itself.

use girder_model::{Cell, CellRef, CellValue, Range, Workbook, Worksheet};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::shared_strings::SharedStrings;
use crate::{XlsxError, XlsxPackage};

/// Read one worksheet (by tab name) out of a package.
pub fn read_worksheet(pkg: &XlsxPackage, sheet_name: &str) -> Result<Worksheet, XlsxError> {
    let part = pkg.worksheet_part(sheet_name)?;
    let bytes = pkg
        .part(&part)
        .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;

    let shared = match pkg.part("xl/sharedStrings.xml") {
        Some(sst) => Some(SharedStrings::parse(sst)?),
        None => None,
    };

    parse_worksheet_xml(sheet_name, bytes, shared.as_ref())
}

/// Read every worksheet into a model [`Workbook`], in tab order.
pub fn read_workbook(pkg: &XlsxPackage) -> Result<Workbook, XlsxError> {
    let shared = match pkg.part("xl/sharedStrings.xml") {
        Some(sst) => Some(SharedStrings::parse(sst)?),
        None => None,
    };

    let mut wb = Workbook::new();
    for info in pkg.workbook_sheets()? {
        let part = pkg.worksheet_part(&info.name)?;
        let bytes = pkg
            .part(&part)
            .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;
        let ws = parse_worksheet_xml(&info.name, bytes, shared.as_ref())?;
        wb.push_sheet(ws)
            .map_err(|e| XlsxError::Invalid(format!("workbook sheet table: {e}")))?;
    }
    Ok(wb)
}

pub(crate) fn parse_worksheet_xml(
    sheet_name: &str,
    bytes: &[u8],
    shared: Option<&SharedStrings>,
) -> Result<Worksheet, XlsxError> {
    let mut ws = Worksheet::new(sheet_name);
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"dimension" => {
                if let Some(ref_attr) = attr_value(&e, b"ref")? {
                    // Templates occasionally declare garbage here; an
                    // unparseable rectangle is treated as undeclared.
                    if let Ok(range) = Range::from_a1(&ref_attr) {
                        ws.dimension = Some(range);
                    }
                }
            }
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"mergeCell" => {
                if let Some(ref_attr) = attr_value(&e, b"ref")? {
                    let range = Range::from_a1(&ref_attr).map_err(|_| {
                        XlsxError::Invalid(format!("invalid mergeCell ref: {ref_attr}"))
                    })?;
                    ws.merges.insert(range).map_err(|e| {
                        XlsxError::Invalid(format!("bad merged region in {sheet_name:?}: {e}"))
                    })?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let attrs = CellAttrs::parse(&e)?;
                if let Some(at) = attrs.at {
                    ws.set_cell_raw(at, attrs.into_cell(CellBody::default(), shared)?);
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let attrs = CellAttrs::parse(&e)?;
                let body = read_cell_body(&mut reader)?;
                if let Some(at) = attrs.at {
                    ws.set_cell_raw(at, attrs.into_cell(body, shared)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ws)
}

#[derive(Debug, Default)]
struct CellAttrs {
    at: Option<CellRef>,
    ty: Option<String>,
    style: Option<u32>,
}

impl CellAttrs {
    fn parse(e: &BytesStart<'_>) -> Result<Self, XlsxError> {
        let mut out = Self::default();
        for attr in e.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?;
            match attr.key.local_name().as_ref() {
                b"r" => out.at = CellRef::from_a1(&value).ok(),
                b"t" => out.ty = Some(value.into_owned()),
                b"s" => out.style = value.parse().ok(),
                _ => {}
            }
        }
        Ok(out)
    }

    fn into_cell(self, body: CellBody, shared: Option<&SharedStrings>) -> Result<Cell, XlsxError> {
        let value = match (self.ty.as_deref(), &body.value) {
            (_, None) => match &body.inline_text {
                Some(text) => CellValue::String(text.clone()),
                None => CellValue::Empty,
            },
            (Some("s"), Some(v)) => {
                let idx: u32 = v.trim().parse().map_err(|_| {
                    XlsxError::Invalid(format!("invalid shared string index: {v}"))
                })?;
                let text = shared
                    .and_then(|sst| sst.get(idx))
                    .ok_or_else(|| {
                        XlsxError::Invalid(format!("shared string index out of range: {idx}"))
                    })?;
                CellValue::String(text.to_string())
            }
            (Some("str"), Some(v)) => CellValue::String(v.clone()),
            (Some("inlineStr"), _) => CellValue::String(body.inline_text.unwrap_or_default()),
            (Some("b"), Some(v)) => CellValue::Boolean(v.trim() == "1" || v.trim() == "true"),
            // Error results (`t="e"`) surface as their display text; the
            // audit layer reports them as non-numeric rather than hiding them.
            (Some("e"), Some(v)) => CellValue::String(v.clone()),
            (_, Some(v)) => {
                let n: f64 = v.trim().parse().map_err(|_| {
                    XlsxError::Invalid(format!("invalid numeric cell value: {v}"))
                })?;
                CellValue::Number(n)
            }
        };

        Ok(Cell {
            value,
            formula: body.formula,
            style_index: self.style,
        })
    }
}

#[derive(Debug, Default)]
struct CellBody {
    value: Option<String>,
    formula: Option<String>,
    inline_text: Option<String>,
}

/// Consume events up to the matching `</c>`.
fn read_cell_body<R: std::io::BufRead>(reader: &mut Reader<R>) -> Result<CellBody, XlsxError> {
    let mut body = CellBody::default();
    let mut buf = Vec::new();
    // Which leaf we are collecting text for.
    enum Collecting {
        None,
        Value,
        Formula,
        InlineText,
    }
    let mut collecting = Collecting::None;
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                match (depth, e.local_name().as_ref()) {
                    (0, b"v") => {
                        body.value.get_or_insert_with(String::new);
                        collecting = Collecting::Value;
                    }
                    (0, b"f") => {
                        body.formula.get_or_insert_with(String::new);
                        collecting = Collecting::Formula;
                    }
                    (_, b"t") => {
                        body.inline_text.get_or_insert_with(String::new);
                        collecting = Collecting::InlineText;
                    }
                    _ => {}
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 && e.local_name().as_ref() == b"f" {
                    body.formula.get_or_insert_with(String::new);
                }
            }
            Event::End(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() == b"c" {
                        break;
                    }
                    return Err(XlsxError::Invalid(
                        "mismatched element nesting in worksheet cell".to_string(),
                    ));
                }
                depth -= 1;
                collecting = Collecting::None;
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                match collecting {
                    Collecting::Value => body.value.as_mut().expect("set at <v>").push_str(&text),
                    Collecting::Formula => {
                        body.formula.as_mut().expect("set at <f>").push_str(&text)
                    }
                    Collecting::InlineText => body
                        .inline_text
                        .as_mut()
                        .expect("set at <t>")
                        .push_str(&text),
                    Collecting::None => {}
                }
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF inside worksheet cell".to_string(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(body)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &[u8] = br#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1:M84"/>
  <sheetData>
    <row r="21"><c r="E21" s="3"><f>M84+0.925+0.075</f><v>102.5</v></c></row>
    <row r="24"><c r="B24" t="inlineStr"><is><t>The soffit of the deck is at HFL</t></is></c></row>
    <row r="84">
      <c r="L84" t="s"><v>0</v></c>
      <c r="M84"><v>101.925</v></c>
      <c r="N84"><f>E21-0.575</f></c>
    </row>
  </sheetData>
  <mergeCells count="1"><mergeCell ref="L84:N85"/></mergeCells>
</worksheet>"#;

    fn sst() -> SharedStrings {
        let mut sst = SharedStrings::default();
        sst.get_or_insert_plain("DECK LEVEL");
        sst
    }

    fn at(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    #[test]
    fn reads_cached_formula_values() {
        let ws = parse_worksheet_xml("STABILITY CHECK FOR PIER", SHEET, Some(&sst())).unwrap();

        let deck = ws.cell(at("E21")).unwrap();
        assert_eq!(deck.formula.as_deref(), Some("M84+0.925+0.075"));
        assert_eq!(deck.literal(), Some(&CellValue::Number(102.5)));
        assert_eq!(deck.style_index, Some(3));

        let soffit = ws.cell(at("M84")).unwrap();
        assert!(!soffit.is_formula());
        assert_eq!(soffit.literal(), Some(&CellValue::Number(101.925)));
    }

    #[test]
    fn formula_without_cached_value_is_unevaluated() {
        let ws = parse_worksheet_xml("S", SHEET, Some(&sst())).unwrap();
        let cell = ws.cell(at("N84")).unwrap();
        assert!(cell.is_unevaluated());
        assert_eq!(cell.literal(), None);
    }

    #[test]
    fn resolves_shared_and_inline_strings() {
        let ws = parse_worksheet_xml("S", SHEET, Some(&sst())).unwrap();
        assert_eq!(
            ws.cell(at("L84")).unwrap().literal(),
            Some(&CellValue::String("DECK LEVEL".to_string()))
        );
        assert_eq!(
            ws.cell(at("B24")).unwrap().literal(),
            Some(&CellValue::String(
                "The soffit of the deck is at HFL".to_string()
            ))
        );
    }

    #[test]
    fn reads_dimension_and_merges() {
        let ws = parse_worksheet_xml("S", SHEET, Some(&sst())).unwrap();
        assert_eq!(ws.dimension.unwrap().to_string(), "A1:M84");
        assert_eq!(ws.merges.len(), 1);
        assert!(ws.merges.region_containing(at("N85")).is_some());
    }

    #[test]
    fn shared_index_out_of_range_is_invalid() {
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>7</v></c></row>
        </sheetData></worksheet>"#;
        assert!(matches!(
            parse_worksheet_xml("S", xml, Some(&sst())),
            Err(XlsxError::Invalid(_))
        ));
    }
}
