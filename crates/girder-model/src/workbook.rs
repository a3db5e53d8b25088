use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{validate_sheet_name, SheetNameError, Worksheet};

/// Errors raised when adding a worksheet to a workbook.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AddSheetError {
    #[error(transparent)]
    InvalidName(#[from] SheetNameError),
    #[error("sheet name already exists: {0:?}")]
    DuplicateName(String),
}

/// An ordered collection of uniquely named worksheets.
///
/// The workbook is a plain value: operations own it exclusively for the
/// duration of a call (open → populate → verify → serialize), with no shared
/// mutable state behind it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.sheets.iter()
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Append an empty worksheet and return a mutable handle to it.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<&mut Worksheet, AddSheetError> {
        self.push_sheet(Worksheet::new(name.into()))
    }

    /// Append a fully built worksheet, enforcing name validity/uniqueness.
    pub fn push_sheet(&mut self, sheet: Worksheet) -> Result<&mut Worksheet, AddSheetError> {
        validate_sheet_name(&sheet.name)?;
        if self.sheets.iter().any(|s| s.name == sheet.name) {
            return Err(AddSheetError::DuplicateName(sheet.name));
        }
        self.sheets.push(sheet);
        Ok(self.sheets.last_mut().expect("sheet was just pushed"))
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_look_up_sheets() {
        let mut wb = Workbook::new();
        wb.add_sheet("INSERT- HYDRAULICS").unwrap();
        wb.add_sheet("INSERT C1-ABUT").unwrap();

        assert_eq!(wb.sheet_count(), 2);
        assert!(wb.sheet_by_name("INSERT- HYDRAULICS").is_some());
        assert!(wb.sheet_by_name("INSERT ESTIMATE").is_none());
        // Order is insertion order.
        let names: Vec<&str> = wb.sheet_names().collect();
        assert_eq!(names, ["INSERT- HYDRAULICS", "INSERT C1-ABUT"]);
    }

    #[test]
    fn duplicate_and_invalid_names_are_rejected() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        assert!(matches!(
            wb.add_sheet("Sheet1"),
            Err(AddSheetError::DuplicateName(_))
        ));
        assert!(matches!(
            wb.add_sheet(""),
            Err(AddSheetError::InvalidName(SheetNameError::Empty))
        ));
    }
}
