use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Cell, CellKey, CellRef, MergedRegions, Range};

/// A single worksheet: a sparse cell grid plus merged regions and the
/// declared used-range rectangle.
///
/// Cells are keyed by packed [`CellKey`] in a `BTreeMap`, so iteration is
/// row-major and deterministic, which keeps serialized output and patch
/// application stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    cells: BTreeMap<CellKey, Cell>,
    #[serde(default, skip_serializing_if = "MergedRegions::is_empty")]
    pub merges: MergedRegions,
    /// Declared used range (the worksheet `dimension` element). Readers that
    /// trust the declared range silently ignore cells outside it, so writers
    /// must keep it at least as large as the populated bounding box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Range>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            merges: MergedRegions::new(),
            dimension: None,
        }
    }

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.cells.get(&CellKey::from_ref(at))
    }

    /// Set a cell, growing the declared dimension to cover it.
    pub fn set_cell(&mut self, at: CellRef, cell: Cell) {
        self.cells.insert(CellKey::from_ref(at), cell);
        self.expand_dimension(Range::single(at));
    }

    /// Insert a cell without touching the declared dimension.
    ///
    /// Used by readers replaying a worksheet part whose dimension element is
    /// authoritative as stored (including templates that under-declare it).
    pub fn set_cell_raw(&mut self, at: CellRef, cell: Cell) {
        self.cells.insert(CellKey::from_ref(at), cell);
    }

    pub fn remove_cell(&mut self, at: CellRef) -> Option<Cell> {
        self.cells.remove(&CellKey::from_ref(at))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Row-major iteration over populated cells.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(key, cell)| (key.to_ref(), cell))
    }

    /// Bounding box of the populated cells (independent of the declared
    /// dimension).
    pub fn populated_bounds(&self) -> Option<Range> {
        let mut bounds: Option<Range> = None;
        for key in self.cells.keys() {
            let cell = Range::single(key.to_ref());
            bounds = Some(match bounds {
                Some(b) => b.union(&cell),
                None => cell,
            });
        }
        bounds
    }

    /// Grow the declared dimension to cover `range`. Growth is monotonic: the
    /// resulting rectangle is always a superset of the previous one.
    pub fn expand_dimension(&mut self, range: Range) {
        self.dimension = Some(match self.dimension {
            Some(existing) => existing.union(&range),
            None => range,
        });
    }
}
