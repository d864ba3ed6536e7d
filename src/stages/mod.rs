//! Batch stages of the turnstile pipeline.
//!
//! Raw files are merged into one master file, filtered down to routine
//! `REGULAR` readings, extended with hourly entry/exit deltas, projected to
//! `(unit, hourly entries)` pairs and finally summed per unit. Each stage
//! takes its input read-only and produces a new artifact.

pub mod delta;
pub mod filter;
pub mod mapper;
pub mod merge;
pub mod reducer;
pub mod sort;
pub mod utility;
