//! Exploratory cell discovery.
//!
//! The original analysis workflow grew dozens of scripts that scanned whole
//! sheets for a keyword ("soffit", "wearing coat", ...) to guess where a
//! quantity lives. That scanning is useful while *building* a
//! [`crate::CellAddressMap`], but it is not a contract: the authoritative
//! binding between fields and coordinates is always the map. This module
//! keeps the exploration explicitly separate and explicitly named.

use girder_model::{Cell, CellRef, CellValue, Worksheet};

/// Scan a worksheet for cells matching `predicate`, in row-major order.
pub fn discover_candidate_cells<F>(sheet: &Worksheet, predicate: F) -> Vec<CellRef>
where
    F: Fn(CellRef, &Cell) -> bool,
{
    sheet
        .iter_cells()
        .filter(|(at, cell)| predicate(*at, cell))
        .map(|(at, _)| at)
        .collect()
}

/// Predicate matching cells whose readable text contains `needle`,
/// case-insensitively. Cached string results of formula cells match too.
pub fn text_contains(needle: &str) -> impl Fn(CellRef, &Cell) -> bool {
    let needle = needle.to_lowercase();
    move |_, cell| match cell.literal() {
        Some(CellValue::String(s)) => s.to_lowercase().contains(&needle),
        _ => false,
    }
}

/// Predicate matching numeric cells within `[lo, hi]`, the "plausible slab
/// thickness" style of hunt.
pub fn number_in_range(lo: f64, hi: f64) -> impl Fn(CellRef, &Cell) -> bool {
    move |_, cell| match cell.literal() {
        Some(CellValue::Number(n)) => (lo..=hi).contains(n),
        _ => false,
    }
}
