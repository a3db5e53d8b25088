//! Command-line surface for populating and auditing bridge-design workbooks.
//!
//! The CLI lives in the library crate so integration tests can drive
//! [`cli::run_with_args`] without spawning a process.

pub mod cli;
