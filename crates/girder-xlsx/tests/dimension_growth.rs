use girder_model::{Cell, CellRef, Range};
use pretty_assertions::assert_eq;

use girder_xlsx::minimal::{write_fixture_xlsx, FixtureSheet};
use girder_xlsx::{read_worksheet, WorkbookCellPatches, XlsxPackage};

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

fn range(a1: &str) -> Range {
    Range::from_a1(a1).unwrap()
}

fn sheet_with_dimension(dim: &str) -> XlsxPackage {
    let bytes = write_fixture_xlsx(&[FixtureSheet::new("INSERT- HYDRAULICS")
        .dimension(dim)
        .cell("A1", Cell::literal_value("BRIDGE DESIGN"))])
    .unwrap();
    XlsxPackage::from_bytes(&bytes).unwrap()
}

#[test]
fn declared_range_grows_to_cover_appended_cells() {
    let mut pkg = sheet_with_dimension("A1:B5");

    let mut patches = WorkbookCellPatches::default();
    patches.set_cell("INSERT- HYDRAULICS", at("B25"), 45.0);
    patches.set_cell("INSERT- HYDRAULICS", at("B12"), 10.0);
    pkg.apply_cell_patches(&patches).unwrap();

    let ws = read_worksheet(&pkg, "INSERT- HYDRAULICS").unwrap();
    assert_eq!(ws.dimension, Some(range("A1:B25")));
}

#[test]
fn declared_range_never_shrinks() {
    // Writes entirely inside the declared rectangle keep it as-is: the range
    // after population is always a superset of the range before.
    let mut pkg = sheet_with_dimension("A1:D30");

    let mut patches = WorkbookCellPatches::default();
    patches.set_cell("INSERT- HYDRAULICS", at("B12"), 10.0);
    pkg.apply_cell_patches(&patches).unwrap();

    let ws = read_worksheet(&pkg, "INSERT- HYDRAULICS").unwrap();
    assert_eq!(ws.dimension, Some(range("A1:D30")));
}

#[test]
fn missing_dimension_element_is_inserted() {
    // A worksheet part with no <dimension> at all (the template's empty
    // INSERT sheets ship this way) gains one covering the written cells.
    let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData/>
</worksheet>
"#;
    let bytes = write_fixture_xlsx(&[FixtureSheet::new("INSERT- HYDRAULICS")
        .cell("A1", Cell::literal_value("x"))])
    .unwrap();
    let mut pkg = XlsxPackage::from_bytes(&bytes).unwrap();
    pkg.set_part("xl/worksheets/sheet1.xml", xml.to_vec());

    let mut patches = WorkbookCellPatches::default();
    patches.set_cell("INSERT- HYDRAULICS", at("B12"), 10.0);
    patches.set_cell("INSERT- HYDRAULICS", at("A12"), "Span (m):");
    pkg.apply_cell_patches(&patches).unwrap();

    let ws = read_worksheet(&pkg, "INSERT- HYDRAULICS").unwrap();
    assert_eq!(ws.dimension, Some(range("A12:B12")));
    let part = std::str::from_utf8(pkg.part("xl/worksheets/sheet1.xml").unwrap()).unwrap();
    assert!(
        part.find("<dimension").unwrap() < part.find("<sheetData").unwrap(),
        "dimension must precede sheetData: {part}"
    );
}
