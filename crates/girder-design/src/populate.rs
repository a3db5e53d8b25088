//! Template population: write design records into a template package.

use girder_model::CellRef;
use girder_xlsx::{WorkbookCellPatches, XlsxError, XlsxPackage};
use thiserror::Error;

use crate::map::{CellAddressMap, Field};
use crate::records::{DesignInput, DesignOutput};

/// Errors raised by [`populate`]. All are precondition violations: a
/// malformed template or incomplete records is a programming/configuration
/// error, not a transient condition, so there is no retry path.
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("template workbook has no sheet named {sheet:?}")]
    SheetNotFound { sheet: String },
    #[error("records carry no value for {field} (mapped to {sheet:?}!{cell})")]
    FieldMissing {
        field: Field,
        sheet: String,
        cell: CellRef,
    },
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
}

/// Write every mapped value into the template package.
///
/// The whole batch is validated before the first cell is touched: every
/// sheet the map references must exist in the template and every field must
/// resolve against the records. On any violation the package is returned
/// unmodified, since a half-populated workbook must never reach
/// serialization.
///
/// Cells the map does not name keep their value, formula, style, and merged
/// regions untouched; each touched sheet's declared used-range is grown to
/// cover the written cells. Where a mapped coordinate held a formula, the
/// literal replaces it: INSERT sheets are pure input areas and a formula
/// found there is template debris, not something to preserve.
pub fn populate(
    pkg: &mut XlsxPackage,
    input: &DesignInput,
    output: &DesignOutput,
    map: &CellAddressMap,
) -> Result<(), PopulateError> {
    let sheet_names: Vec<String> = pkg
        .workbook_sheets()?
        .into_iter()
        .map(|s| s.name)
        .collect();

    for sheet in map.sheet_names() {
        if !sheet_names.iter().any(|n| n == sheet) {
            return Err(PopulateError::SheetNotFound {
                sheet: sheet.to_string(),
            });
        }
    }

    let mut patches = WorkbookCellPatches::default();
    for binding in map.bindings() {
        let value =
            binding
                .field
                .resolve(input, output)
                .ok_or_else(|| PopulateError::FieldMissing {
                    field: binding.field.clone(),
                    sheet: binding.sheet.clone(),
                    cell: binding.cell,
                })?;
        patches.set_cell(binding.sheet.clone(), binding.cell, value);
    }

    // Patch a scratch copy and swap on success, so a template with a broken
    // worksheet part can never leave the caller holding a half-populated
    // package.
    let mut patched = pkg.clone();
    patched.apply_cell_patches(&patches)?;
    *pkg = patched;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CellBinding, InputField};
    use crate::records::fixtures::{sample_input, sample_output};
    use girder_model::{Cell, CellValue};
    use girder_xlsx::minimal::{write_fixture_xlsx, FixtureSheet};
    use girder_xlsx::read_worksheet;

    fn template() -> XlsxPackage {
        let bytes = write_fixture_xlsx(&[
            FixtureSheet::new("INSERT- HYDRAULICS").cell("A1", Cell::literal_value("BRIDGE DESIGN")),
            FixtureSheet::new("INSERT C1-ABUT").cell("A1", Cell::literal_value("BRIDGE DESIGN")),
            FixtureSheet::new("INSERT ESTIMATE").cell("A1", Cell::literal_value("BRIDGE DESIGN")),
        ])
        .unwrap();
        XlsxPackage::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn populates_mapped_cells() {
        let mut pkg = template();
        populate(
            &mut pkg,
            &sample_input(),
            &sample_output(),
            &CellAddressMap::bridge_template(),
        )
        .unwrap();

        let ws = read_worksheet(&pkg, "INSERT- HYDRAULICS").unwrap();
        let span = ws.cell(CellRef::from_a1("B12").unwrap()).unwrap();
        assert_eq!(span.literal(), Some(&CellValue::Number(10.0)));

        let est = read_worksheet(&pkg, "INSERT ESTIMATE").unwrap();
        assert_eq!(
            est.cell(CellRef::from_a1("B10").unwrap()).unwrap().literal(),
            Some(&CellValue::Number(38.5))
        );
    }

    #[test]
    fn missing_sheet_aborts_without_mutation() {
        let bytes = write_fixture_xlsx(&[
            FixtureSheet::new("INSERT- HYDRAULICS").cell("A1", Cell::literal_value("x")),
            FixtureSheet::new("INSERT C1-ABUT").cell("A1", Cell::literal_value("x")),
        ])
        .unwrap();
        let mut pkg = XlsxPackage::from_bytes(&bytes).unwrap();
        let before: Vec<Vec<u8>> = pkg.parts().map(|(_, b)| b.to_vec()).collect();

        let err = populate(
            &mut pkg,
            &sample_input(),
            &sample_output(),
            &CellAddressMap::bridge_template(),
        )
        .unwrap_err();

        assert!(
            err.to_string().contains("INSERT ESTIMATE"),
            "error must name the missing sheet: {err}"
        );
        let after: Vec<Vec<u8>> = pkg.parts().map(|(_, b)| b.to_vec()).collect();
        assert_eq!(before, after, "failed populate must not touch the package");
    }

    #[test]
    fn missing_field_aborts_without_mutation() {
        let mut pkg = template();
        let before: Vec<Vec<u8>> = pkg.parts().map(|(_, b)| b.to_vec()).collect();

        let mut input = sample_input();
        input.bed_level = None;
        let err = populate(
            &mut pkg,
            &input,
            &sample_output(),
            &CellAddressMap::bridge_template(),
        )
        .unwrap_err();

        assert!(matches!(err, PopulateError::FieldMissing { .. }));
        assert!(err.to_string().contains("input.bed_level"));
        let after: Vec<Vec<u8>> = pkg.parts().map(|(_, b)| b.to_vec()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn custom_map_population() {
        let bytes = write_fixture_xlsx(&[
            FixtureSheet::new("Sheet1").cell("A1", Cell::literal_value("x"))
        ])
        .unwrap();
        let mut pkg = XlsxPackage::from_bytes(&bytes).unwrap();
        let map = CellAddressMap::new(vec![
            CellBinding::new("Sheet1", Field::Input(InputField::FloodLevel), "C4").unwrap(),
        ])
        .unwrap();

        populate(&mut pkg, &sample_input(), &sample_output(), &map).unwrap();
        let ws = read_worksheet(&pkg, "Sheet1").unwrap();
        assert_eq!(
            ws.cell(CellRef::from_a1("C4").unwrap()).unwrap().literal(),
            Some(&CellValue::Number(100.6))
        );
    }
}
