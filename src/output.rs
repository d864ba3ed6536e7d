//! Persistence of the derived dataset and printing of run reports.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{QuoteStyle, WriterBuilder};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::record::{DERIVED_HEADER, DerivedRecord};
use crate::stages::utility::{csv_io, relabel_io};
use crate::stats::PipelineReport;

/// Logs the report using Rust's debug pretty-print format.
pub fn print_pretty(report: &PipelineReport) {
    debug!("{:#?}", report);
}

/// Logs the report as pretty-printed JSON.
pub fn print_json(report: &PipelineReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Writes derived rows to a CSV file at `path`, replacing it.
#[tracing::instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_derived(path: &Path, rows: &[DerivedRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    write_derived_to(file, rows).map_err(|e| relabel_io(e, path))?;
    debug!("Derived dataset written");
    Ok(())
}

/// Writes [`DERIVED_HEADER`] and then one line per row.
pub fn write_derived_to<W: Write>(writer: W, rows: &[DerivedRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    writer.write_record(DERIVED_HEADER).map_err(csv_io)?;
    for row in rows {
        writer.write_record(row.to_fields()).map_err(csv_io)?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io("<derived output>", e))?;

    Ok(())
}
