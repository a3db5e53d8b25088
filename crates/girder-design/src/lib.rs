//! Bridge-design workbook population and auditing.
//!
//! The pipeline is a chain of pure transforms over an exclusively owned
//! package value (open, [`populate`], [`verify`], serialize) with no shared
//! workbook state anywhere:
//!
//! - [`populate`] writes [`DesignInput`]/[`DesignOutput`] values into the
//!   template coordinates named by a [`CellAddressMap`], touching nothing
//!   else in the package.
//! - [`verify`] re-reads named cells from a populated (and externally
//!   evaluated) workbook and checks engineering identities such as
//!   deck level = structural soffit level + slab + wearing coat.

pub mod discover;
mod map;
mod populate;
mod records;
mod report;
mod verify;

pub use map::{CellAddressMap, CellBinding, Field, InputField, MapError, OutputField};
pub use populate::{populate, PopulateError};
pub use records::{
    Abutment, DesignInput, DesignOutput, Hydraulics, Levels, Pier, Quantities, Slab, StabilityFos,
};
pub use report::render_text;
pub use verify::{
    verify, CellCoord, IdentitySpec, Outcome, VerificationResult, VerifyError, DEFAULT_TOLERANCE,
};
