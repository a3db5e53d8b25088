//! Consistency auditing of a populated workbook.
//!
//! Each [`IdentitySpec`] names an "actual" cell and a list of operand cells;
//! the identity holds when `|actual - sum(operands)| <= tolerance`. Values
//! are the *cached* results stored in the file: spreadsheet files carry no
//! evaluator, so a workbook that has not been round-tripped through a
//! formula-evaluating application reports its formula cells as unresolved
//! rather than silently reading zero.

use std::collections::BTreeMap;

use girder_model::{CellRef, CellValue, Worksheet};
use girder_xlsx::{read_worksheet, XlsxPackage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::a1;

/// Default audit tolerance in length units (meters).
///
/// Matches the loose tolerance the template's own check sheets use. Levels
/// sit near a ~100 m datum, so comparisons are absolute, not relative. This
/// is a reporting convention, not a law of physics; individual identities
/// can carry a tighter bound.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// A fully qualified cell address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCoord {
    pub sheet: String,
    #[serde(with = "a1")]
    pub cell: CellRef,
}

impl CellCoord {
    pub fn new(sheet: impl Into<String>, a1_ref: &str) -> Self {
        Self {
            sheet: sheet.into(),
            cell: CellRef::from_a1(a1_ref).expect("well-formed identity cell address"),
        }
    }
}

impl core::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}!{}", self.sheet, self.cell)
    }
}

/// One engineering identity to check: `actual == sum(operands)` within
/// `tolerance`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub label: String,
    pub actual: CellCoord,
    pub operands: Vec<CellCoord>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl IdentitySpec {
    pub fn new(
        label: impl Into<String>,
        actual: CellCoord,
        operands: Vec<CellCoord>,
    ) -> Self {
        Self {
            label: label.into(),
            actual,
            operands,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The built-in deck-level identity against the master template's
    /// stability sheet:
    ///
    /// `deck level (E21) = structural soffit level (M84)
    ///                   + slab thickness (H26) + wearing coat (H27)`
    ///
    /// M84 is the *structural* soffit (underside of slab). The template also
    /// carries an HFL-defined hydraulic soffit on the anchorage sheet; that
    /// is a different quantity and deliberately not an operand here.
    pub fn deck_level() -> Self {
        const SHEET: &str = "STABILITY CHECK FOR PIER";
        Self::new(
            "deck level = structural soffit + slab + wearing coat",
            CellCoord::new(SHEET, "E21"),
            vec![
                CellCoord::new(SHEET, "M84"),
                CellCoord::new(SHEET, "H26"),
                CellCoord::new(SHEET, "H27"),
            ],
        )
    }
}

/// Why a single identity could not be evaluated.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyError {
    #[error("workbook has no sheet named {sheet:?}")]
    SheetNotFound { sheet: String },
    #[error("failed to read sheet {sheet:?}: {message}")]
    SheetUnreadable { sheet: String, message: String },
    #[error("cell {coord} is empty")]
    CellEmpty { coord: String },
    #[error(
        "cell {coord} holds a formula with no cached value; \
         open and save the workbook in a spreadsheet application first"
    )]
    UnresolvedFormula { coord: String },
    #[error("cell {coord} holds {found:?}, expected a number")]
    NotNumeric { coord: String, found: String },
}

/// Outcome of one identity check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass {
        actual: f64,
        expected: f64,
        residual: f64,
    },
    Fail {
        actual: f64,
        expected: f64,
        residual: f64,
    },
    Error {
        #[serde(flatten)]
        error: VerifyError,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub label: String,
    pub tolerance: f64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Pass { .. })
    }
}

/// Check every identity against the workbook.
///
/// Failures are isolated per identity: an unreadable cell in one spec turns
/// that result into [`Outcome::Error`] while the rest of the batch is still
/// evaluated. Each referenced sheet is parsed once and shared across specs.
pub fn verify(pkg: &XlsxPackage, specs: &[IdentitySpec]) -> Vec<VerificationResult> {
    let mut sheets: BTreeMap<String, Result<Worksheet, VerifyError>> = BTreeMap::new();

    specs
        .iter()
        .map(|spec| {
            let outcome = match check_identity(pkg, spec, &mut sheets) {
                Ok(outcome) => outcome,
                Err(error) => Outcome::Error { error },
            };
            VerificationResult {
                label: spec.label.clone(),
                tolerance: spec.tolerance,
                outcome,
            }
        })
        .collect()
}

fn check_identity(
    pkg: &XlsxPackage,
    spec: &IdentitySpec,
    sheets: &mut BTreeMap<String, Result<Worksheet, VerifyError>>,
) -> Result<Outcome, VerifyError> {
    let actual = read_numeric(pkg, &spec.actual, sheets)?;
    let mut expected = 0.0;
    for operand in &spec.operands {
        expected += read_numeric(pkg, operand, sheets)?;
    }

    let residual = (actual - expected).abs();
    Ok(if residual <= spec.tolerance {
        Outcome::Pass {
            actual,
            expected,
            residual,
        }
    } else {
        Outcome::Fail {
            actual,
            expected,
            residual,
        }
    })
}

fn read_numeric(
    pkg: &XlsxPackage,
    coord: &CellCoord,
    sheets: &mut BTreeMap<String, Result<Worksheet, VerifyError>>,
) -> Result<f64, VerifyError> {
    let entry = sheets
        .entry(coord.sheet.clone())
        .or_insert_with(|| load_sheet(pkg, &coord.sheet));
    let ws = match entry {
        Ok(ws) => ws,
        Err(e) => return Err(e.clone()),
    };

    let Some(cell) = ws.cell(coord.cell) else {
        return Err(VerifyError::CellEmpty {
            coord: coord.to_string(),
        });
    };
    if cell.is_unevaluated() {
        return Err(VerifyError::UnresolvedFormula {
            coord: coord.to_string(),
        });
    }
    match cell.literal() {
        Some(CellValue::Number(n)) => Ok(*n),
        Some(CellValue::Empty) | None => Err(VerifyError::CellEmpty {
            coord: coord.to_string(),
        }),
        Some(other) => Err(VerifyError::NotNumeric {
            coord: coord.to_string(),
            found: match other {
                CellValue::String(s) => s.clone(),
                CellValue::Boolean(b) => b.to_string(),
                _ => format!("{other:?}"),
            },
        }),
    }
}

fn load_sheet(pkg: &XlsxPackage, sheet: &str) -> Result<Worksheet, VerifyError> {
    read_worksheet(pkg, sheet).map_err(|e| match e {
        girder_xlsx::XlsxError::SheetNotFound(name) => VerifyError::SheetNotFound { sheet: name },
        other => VerifyError::SheetUnreadable {
            sheet: sheet.to_string(),
            message: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_model::Cell;
    use girder_xlsx::minimal::{write_fixture_xlsx, FixtureSheet};
    use pretty_assertions::assert_eq;

    fn stability_sheet(deck: Cell) -> FixtureSheet {
        FixtureSheet::new("STABILITY CHECK FOR PIER")
            .cell("E21", deck)
            .cell("M84", Cell::literal_value(100.6))
            .cell("H26", Cell::literal_value(0.85))
            .cell("H27", Cell::literal_value(0.075))
    }

    fn pkg_with(deck: Cell) -> XlsxPackage {
        let bytes = write_fixture_xlsx(&[stability_sheet(deck)]).unwrap();
        XlsxPackage::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn deck_level_identity_passes_at_default_tolerance() {
        let pkg = pkg_with(Cell::evaluated_formula("M84+H26+H27", 101.6));
        let results = verify(&pkg, &[IdentitySpec::deck_level()]);
        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            Outcome::Pass {
                actual,
                expected,
                residual,
            } => {
                assert_eq!(*actual, 101.6);
                assert_eq!(*expected, 101.525);
                assert!((residual - 0.075).abs() < 1e-9);
            }
            other => panic!("expected pass, got {other:?}"),
        }
    }

    #[test]
    fn tolerance_boundary_flips_the_verdict() {
        let pkg = pkg_with(Cell::literal_value(101.6));
        let spec = IdentitySpec::deck_level().with_tolerance(0.05);
        let results = verify(&pkg, &[spec]);
        match &results[0].outcome {
            Outcome::Fail { residual, .. } => assert!((residual - 0.075).abs() < 1e-9),
            other => panic!("expected fail, got {other:?}"),
        }
    }

    #[test]
    fn residual_equal_to_tolerance_passes() {
        // Exactly representable values so the boundary comparison is exact:
        // 101.5 - (100.0 + 1.0 + 0.25) = 0.25.
        let bytes = write_fixture_xlsx(&[FixtureSheet::new("STABILITY CHECK FOR PIER")
            .cell("E21", Cell::literal_value(101.5))
            .cell("M84", Cell::literal_value(100.0))
            .cell("H26", Cell::literal_value(1.0))
            .cell("H27", Cell::literal_value(0.25))])
        .unwrap();
        let pkg = XlsxPackage::from_bytes(&bytes).unwrap();

        assert!(verify(&pkg, &[IdentitySpec::deck_level().with_tolerance(0.25)])[0].passed());
        assert!(!verify(&pkg, &[IdentitySpec::deck_level().with_tolerance(0.2)])[0].passed());
    }

    #[test]
    fn unresolved_formula_is_an_error_not_a_zero() {
        let pkg = pkg_with(Cell::unevaluated_formula("M84+H26+H27"));
        let results = verify(&pkg, &[IdentitySpec::deck_level()]);
        match &results[0].outcome {
            Outcome::Error {
                error: VerifyError::UnresolvedFormula { coord },
            } => assert!(coord.contains("E21"), "{coord}"),
            other => panic!("expected unresolved formula, got {other:?}"),
        }
    }

    #[test]
    fn one_broken_identity_does_not_hide_the_others() {
        let bytes = write_fixture_xlsx(&[FixtureSheet::new("LEVELS")
            .cell("B1", Cell::literal_value(101.6))
            .cell("B2", Cell::literal_value(100.6))
            .cell("B3", Cell::literal_value(1.0))
            .cell("B4", Cell::unevaluated_formula("B1-B2"))])
        .unwrap();
        let pkg = XlsxPackage::from_bytes(&bytes).unwrap();

        let ok = |label: &str| {
            IdentitySpec::new(
                label,
                CellCoord::new("LEVELS", "B1"),
                vec![CellCoord::new("LEVELS", "B2"), CellCoord::new("LEVELS", "B3")],
            )
        };
        let broken = IdentitySpec::new(
            "broken",
            CellCoord::new("LEVELS", "B4"),
            vec![CellCoord::new("LEVELS", "B2")],
        );

        let results = verify(&pkg, &[ok("first"), broken, ok("third")]);
        assert_eq!(results.len(), 3);
        assert!(results[0].passed());
        assert!(matches!(
            results[1].outcome,
            Outcome::Error {
                error: VerifyError::UnresolvedFormula { .. }
            }
        ));
        assert!(results[2].passed());
    }

    #[test]
    fn missing_sheet_and_empty_cell_are_reported() {
        let pkg = pkg_with(Cell::literal_value(101.6));

        let missing = IdentitySpec::new(
            "wrong sheet",
            CellCoord::new("HYDRAULICS", "F4"),
            vec![CellCoord::new("HYDRAULICS", "F5")],
        );
        let results = verify(&pkg, &[missing]);
        assert_eq!(
            results[0].outcome,
            Outcome::Error {
                error: VerifyError::SheetNotFound {
                    sheet: "HYDRAULICS".to_string()
                }
            }
        );

        let empty = IdentitySpec::new(
            "empty operand",
            CellCoord::new("STABILITY CHECK FOR PIER", "E21"),
            vec![CellCoord::new("STABILITY CHECK FOR PIER", "Z99")],
        );
        let results = verify(&pkg, &[empty]);
        assert!(matches!(
            results[0].outcome,
            Outcome::Error {
                error: VerifyError::CellEmpty { .. }
            }
        ));
    }

    #[test]
    fn text_cell_is_not_numeric() {
        let bytes = write_fixture_xlsx(&[FixtureSheet::new("S")
            .cell("A1", Cell::literal_value(1.0))
            .cell("A2", Cell::literal_value("SLAB 775 TO 925 MM"))])
        .unwrap();
        let pkg = XlsxPackage::from_bytes(&bytes).unwrap();
        let spec = IdentitySpec::new(
            "text operand",
            CellCoord::new("S", "A1"),
            vec![CellCoord::new("S", "A2")],
        );
        let results = verify(&pkg, &[spec]);
        assert!(matches!(
            &results[0].outcome,
            Outcome::Error {
                error: VerifyError::NotNumeric { found, .. }
            } if found == "SLAB 775 TO 925 MM"
        ));
    }
}
