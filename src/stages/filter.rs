//! Keeps only the routine `REGULAR` readings of a merged dataset.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::record::{IndexedRecord, RAW_FIELD_COUNT, RawRecord};
use crate::stages::utility::{csv_io, relabel_io};

/// Rows that passed the filter, plus counts for reporting.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub rows: Vec<IndexedRecord>,
    /// Data rows read, malformed ones included.
    pub read: usize,
    /// Malformed rows dropped.
    pub skipped: usize,
}

/// Reads the merged dataset at `path` and returns its `REGULAR` rows.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn filter_regular(path: &Path) -> Result<FilterOutcome> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let outcome = filter_reader(file).map_err(|e| relabel_io(e, path))?;

    info!(
        read = outcome.read,
        kept = outcome.rows.len(),
        skipped = outcome.skipped,
        "Regular readings selected"
    );
    Ok(outcome)
}

/// Filters a headed, comma-separated dataset from any reader.
///
/// Malformed rows are logged and skipped. The input order of the kept
/// rows is preserved, and each keeps the position it had among the valid
/// data rows.
pub fn filter_reader<R: Read>(reader: R) -> Result<FilterOutcome> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut outcome = FilterOutcome::default();
    let mut index = 0;

    for result in rdr.records() {
        outcome.read += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_io(e)),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                warn!(line, error = %e, "Skipping unreadable row");
                outcome.skipped += 1;
                continue;
            }
        };

        let raw = match parse_row(&record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Skipping malformed row");
                outcome.skipped += 1;
                continue;
            }
        };

        if raw.is_regular() {
            outcome.rows.push(IndexedRecord { index, record: raw });
        }
        index += 1;
    }

    Ok(outcome)
}

/// Parses one row positionally into a [`RawRecord`].
pub fn parse_row(record: &StringRecord) -> Result<RawRecord> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);

    if record.len() != RAW_FIELD_COUNT {
        return Err(PipelineError::SchemaMismatch {
            line,
            expected: RAW_FIELD_COUNT,
            found: record.len(),
        });
    }

    record
        .deserialize::<RawRecord>(None)
        .map_err(|e| PipelineError::Parse {
            line,
            message: e.to_string(),
        })
}
