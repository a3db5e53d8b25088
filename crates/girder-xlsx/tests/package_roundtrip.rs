use girder_model::Cell;
use pretty_assertions::assert_eq;

use girder_xlsx::minimal::{write_fixture_xlsx, FixtureSheet};
use girder_xlsx::{XlsxPackage, XlsxPackageLimits};

fn fixture() -> Vec<u8> {
    write_fixture_xlsx(&[
        FixtureSheet::new("INSERT- HYDRAULICS").cell("A1", Cell::literal_value("x")),
        FixtureSheet::new("INSERT C1-ABUT").cell("A1", Cell::literal_value("y")),
    ])
    .unwrap()
}

#[test]
fn untouched_packages_round_trip_part_for_part() {
    let bytes = fixture();
    let pkg = XlsxPackage::from_bytes(&bytes).unwrap();
    let repacked = XlsxPackage::from_bytes(&pkg.write_to_bytes().unwrap()).unwrap();

    let before: Vec<(&str, &[u8])> = pkg.parts().collect();
    let after: Vec<(&str, &[u8])> = repacked.parts().collect();
    assert_eq!(before, after);
}

#[test]
fn sheet_table_preserves_tab_order() {
    let pkg = XlsxPackage::from_bytes(&fixture()).unwrap();
    let names: Vec<String> = pkg
        .workbook_sheets()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["INSERT- HYDRAULICS", "INSERT C1-ABUT"]);

    assert_eq!(
        pkg.worksheet_part("INSERT C1-ABUT").unwrap(),
        "xl/worksheets/sheet2.xml"
    );
    assert!(matches!(
        pkg.worksheet_part("INSERT ESTIMATE"),
        Err(girder_xlsx::XlsxError::SheetNotFound(name)) if name == "INSERT ESTIMATE"
    ));
}

#[test]
fn whole_workbook_read_preserves_tab_order() {
    let pkg = XlsxPackage::from_bytes(&fixture()).unwrap();
    let wb = girder_xlsx::read_workbook(&pkg).unwrap();
    let names: Vec<&str> = wb.sheet_names().collect();
    assert_eq!(names, ["INSERT- HYDRAULICS", "INSERT C1-ABUT"]);
    assert_eq!(wb.sheet_by_name("INSERT C1-ABUT").unwrap().cell_count(), 1);
}

#[test]
fn inflate_limits_guard_against_zip_bombs() {
    let bytes = fixture();
    let err = XlsxPackage::from_bytes_limited(
        &bytes,
        XlsxPackageLimits {
            max_part_bytes: 16,
            max_total_bytes: 1024 * 1024,
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        girder_xlsx::XlsxError::PartTooLarge { .. }
    ));

    let err = XlsxPackage::from_bytes_limited(
        &bytes,
        XlsxPackageLimits {
            max_part_bytes: 1024 * 1024,
            max_total_bytes: 64,
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        girder_xlsx::XlsxError::PackageTooLarge { .. }
    ));
}
