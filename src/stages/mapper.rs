//! Projects derived rows down to `UNIT<TAB>hourly entries` pairs.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, Trim, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::stages::utility::{csv_io, relabel_io};

/// Rows shorter than this are dropped.
pub const MIN_FIELDS: usize = 7;
/// Position of UNIT in the derived layout.
pub const UNIT_FIELD: usize = 2;
/// Position of `ENTRIESn_hourly` in the derived layout.
pub const ENTRIES_HOURLY_FIELD: usize = 12;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MapSummary {
    pub emitted: usize,
    pub dropped: usize,
}

/// Maps the derived dataset at `input` into `output`.
#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn map_file(input: &Path, output: &Path) -> Result<MapSummary> {
    let src = File::open(input).map_err(|e| PipelineError::io(input, e))?;
    let dst = File::create(output).map_err(|e| PipelineError::io(output, e))?;

    let summary = map_units(src, dst).map_err(|e| relabel_io(e, output))?;
    info!(emitted = summary.emitted, dropped = summary.dropped, "Mapper finished");
    Ok(summary)
}

/// Emits one tab-separated `(unit, hourly entries)` pair per row with at
/// least [`MIN_FIELDS`] fields, in input order. The first line is a header.
///
/// A row long enough to pass the check but without an hourly-entries field
/// emits an empty value.
pub fn map_units<R: Read, W: Write>(reader: R, writer: W) -> Result<MapSummary> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    let mut summary = MapSummary::default();

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_io(e)),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable row");
                summary.dropped += 1;
                continue;
            }
        };

        if record.len() < MIN_FIELDS {
            debug!(fields = record.len(), "Dropping short row");
            summary.dropped += 1;
            continue;
        }

        let unit = record.get(UNIT_FIELD).unwrap_or_default();
        let entries = record.get(ENTRIES_HOURLY_FIELD).unwrap_or_default();

        wtr.write_record([unit, entries]).map_err(csv_io)?;
        summary.emitted += 1;
    }

    wtr.flush().map_err(|e| PipelineError::io("<mapper output>", e))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DERIVED_HEADER;

    fn run(input: &str) -> (MapSummary, String) {
        let mut out = Vec::new();
        let summary = map_units(input.as_bytes(), &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    fn header() -> String {
        DERIVED_HEADER.join(",")
    }

    #[test]
    fn test_emits_unit_and_hourly_entries() {
        let input = format!(
            "{}\n\
             0,A002,R051,02-00-00,59 ST,NQR456W,BMT,06/03/2017,00:00:00,REGULAR,100,50,1,1\n\
             2,A002,R051,02-00-00,59 ST,NQR456W,BMT,06/03/2017,04:00:00,REGULAR,110,55,10,5\n",
            header()
        );
        let (summary, out) = run(&input);
        assert_eq!(summary, MapSummary { emitted: 2, dropped: 0 });
        assert_eq!(out, "R051\t1\nR051\t10\n");
    }

    #[test]
    fn test_stray_quote_does_not_swallow_next_row() {
        let input = format!(
            "{}\n\
             0,A002,\"R051,02-00-00,59 ST,NQR456W,BMT,06/03/2017,00:00:00,REGULAR,100,50,1,1\n\
             1,A002,R052,02-00-00,59 ST,NQR456W,BMT,06/03/2017,04:00:00,REGULAR,110,55,10,5\n",
            header()
        );
        let (summary, out) = run(&input);
        assert_eq!(summary, MapSummary { emitted: 2, dropped: 0 });
        assert_eq!(out, "\"R051\t1\nR052\t10\n");
    }

    #[test]
    fn test_six_field_row_is_dropped() {
        let input = format!("{}\na,b,c,d,e,f\n", header());
        let (summary, out) = run(&input);
        assert_eq!(summary.emitted, 0);
        assert_eq!(summary.dropped, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_seven_field_row_emits_one_pair() {
        let input = format!("{}\na,b,R099,d,e,f,g\n", header());
        let (summary, out) = run(&input);
        assert_eq!(summary.emitted, 1);
        assert_eq!(out, "R099\t\n");
    }

    #[test]
    fn test_header_only() {
        let (summary, out) = run(&format!("{}\n", header()));
        assert_eq!(summary, MapSummary::default());
        assert!(out.is_empty());
    }
}
