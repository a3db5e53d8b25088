//! XLSX compatibility layer for girder.
//!
//! The crate exposes a deliberately small surface:
//!
//! - [`XlsxPackage`]: Open Packaging Convention (OPC) ZIP handling that
//!   inflates the package into memory (part name -> bytes), preserving every
//!   untouched part byte-for-byte across a load/edit/repack cycle.
//! - [`read_worksheet`]: parse one worksheet part into a
//!   [`girder_model::Worksheet`], including cached formula results, merged
//!   regions, and the declared dimension.
//! - [`WorkbookCellPatches`] / [`XlsxPackage::apply_cell_patches`]: literal
//!   cell writes applied by streaming rewrite of only the affected worksheet
//!   XML (plus `sharedStrings.xml` / `workbook.xml` when needed).
//! - [`minimal`]: a tiny fixture serializer for tests.

pub mod minimal;
mod openxml;
mod package;
mod patch;
mod read;
mod shared_strings;
mod xml;

pub use openxml::resolve_relationship_target;
pub use package::{
    WorkbookSheetInfo, XlsxError, XlsxPackage, XlsxPackageLimits, MAX_PACKAGE_PART_BYTES,
    MAX_PACKAGE_TOTAL_BYTES,
};
pub use patch::{WorkbookCellPatches, WorksheetCellPatches};
pub use read::{read_workbook, read_worksheet};
pub use shared_strings::SharedStrings;
