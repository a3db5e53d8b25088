use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CellRef, Range};

/// Errors raised when adding a merged region.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("merged region must span more than one cell: {0}")]
    SingleCell(String),
    #[error("merged region {new} overlaps existing region {existing}")]
    Overlap { new: String, existing: String },
}

/// The set of merged rectangles declared by a worksheet.
///
/// Invariant: regions never overlap and each covers at least two cells.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRegions {
    regions: Vec<Range>,
}

impl MergedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.regions.iter()
    }

    /// Add a merged region, rejecting single-cell and overlapping rectangles.
    pub fn insert(&mut self, range: Range) -> Result<(), MergeError> {
        if range.is_single_cell() {
            return Err(MergeError::SingleCell(range.to_string()));
        }
        if let Some(existing) = self.regions.iter().find(|r| r.intersects(&range)) {
            return Err(MergeError::Overlap {
                new: range.to_string(),
                existing: existing.to_string(),
            });
        }
        self.regions.push(range);
        Ok(())
    }

    /// The merged region containing `cell`, if any.
    pub fn region_containing(&self, cell: CellRef) -> Option<&Range> {
        self.regions.iter().find(|r| r.contains(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_and_single_cell() {
        let mut merges = MergedRegions::new();
        merges.insert(Range::from_a1("A1:B2").unwrap()).unwrap();
        assert!(matches!(
            merges.insert(Range::from_a1("B2:C3").unwrap()),
            Err(MergeError::Overlap { .. })
        ));
        assert!(matches!(
            merges.insert(Range::from_a1("D4").unwrap()),
            Err(MergeError::SingleCell(_))
        ));
        assert_eq!(merges.len(), 1);
    }

    #[test]
    fn region_lookup() {
        let mut merges = MergedRegions::new();
        merges.insert(Range::from_a1("L84:N84").unwrap()).unwrap();
        let hit = merges.region_containing(CellRef::from_a1("M84").unwrap());
        assert_eq!(hit.map(ToString::to_string).as_deref(), Some("L84:N84"));
        assert!(merges
            .region_containing(CellRef::from_a1("M85").unwrap())
            .is_none());
    }
}
