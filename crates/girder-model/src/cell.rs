use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{CellRef, CellValue, MAX_COLS, MAX_ROWS};

const COL_BITS: u32 = 14; // 2^14 = 16,384 columns.
const COL_MASK: u64 = (1u64 << COL_BITS) - 1;

/// Compact key used for sparse cell storage.
///
/// A `(row, col)` pair packed into a `u64` as `(row << 14) | col`, so keys
/// order row-major and fit within 34 bits (JSON-safe).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct CellKey(u64);

impl CellKey {
    /// Encode a coordinate. Panics outside Excel bounds; coordinates parsed
    /// from A1 text are already bounds-checked.
    #[inline]
    pub fn new(row: u32, col: u32) -> Self {
        assert!(row < MAX_ROWS, "row out of Excel bounds: {row}");
        assert!(col < MAX_COLS, "col out of Excel bounds: {col}");
        Self(((row as u64) << COL_BITS) | (col as u64))
    }

    #[inline]
    pub const fn row(self) -> u32 {
        (self.0 >> COL_BITS) as u32
    }

    #[inline]
    pub const fn col(self) -> u32 {
        (self.0 & COL_MASK) as u32
    }

    #[inline]
    pub const fn to_ref(self) -> CellRef {
        CellRef::new(self.row(), self.col())
    }

    #[inline]
    pub fn from_ref(cell: CellRef) -> Self {
        Self::new(cell.row, cell.col)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        let row = raw >> COL_BITS;
        let col = raw & COL_MASK;
        if row >= MAX_ROWS as u64 {
            return Err(D::Error::custom(format!(
                "CellKey row out of Excel bounds: {row}"
            )));
        }
        Ok(Self(raw))
    }
}

/// A single worksheet cell.
///
/// A cell holds at most one of {literal value, formula}. A formula cell may
/// carry the last value a spreadsheet application evaluated for it (`cached`).
/// A formula cell without a cached value is *unevaluated*: [`Cell::literal`]
/// returns `None` for it, and readers that need a number must treat it as an
/// unresolved formula rather than an empty cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default, skip_serializing_if = "CellValue::is_empty")]
    pub value: CellValue,
    /// Formula text without the leading `=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Cell XF style index from the source part, preserved across edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_index: Option<u32>,
}

impl Cell {
    /// A literal (non-formula) cell.
    pub fn literal_value(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            formula: None,
            style_index: None,
        }
    }

    /// A formula cell with a cached evaluation result.
    pub fn evaluated_formula(formula: impl Into<String>, cached: impl Into<CellValue>) -> Self {
        Self {
            value: cached.into(),
            formula: Some(formula.into()),
            style_index: None,
        }
    }

    /// A formula cell whose result has never been computed.
    pub fn unevaluated_formula(formula: impl Into<String>) -> Self {
        Self {
            value: CellValue::Empty,
            formula: Some(formula.into()),
            style_index: None,
        }
    }

    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// True if this cell holds a formula with no cached result.
    pub fn is_unevaluated(&self) -> bool {
        self.formula.is_some() && self.value.is_empty()
    }

    /// The value a reader may trust as a literal: the stored value for plain
    /// cells, the cached result for evaluated formula cells, `None` for
    /// unevaluated formula cells.
    pub fn literal(&self) -> Option<&CellValue> {
        if self.is_unevaluated() {
            None
        } else {
            Some(&self.value)
        }
    }
}
