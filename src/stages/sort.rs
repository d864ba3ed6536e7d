//! Groups mapper output by key so the reducer sees each unit as one run.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::stages::utility::{csv_io, relabel_io};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SortSummary {
    pub pairs: usize,
    pub dropped: usize,
}

#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn sort_file(input: &Path, output: &Path) -> Result<SortSummary> {
    let src = File::open(input).map_err(|e| PipelineError::io(input, e))?;
    let dst = File::create(output).map_err(|e| PipelineError::io(output, e))?;

    let summary = sort_pairs(src, dst).map_err(|e| relabel_io(e, output))?;
    info!(pairs = summary.pairs, dropped = summary.dropped, "Mapper output sorted");
    Ok(summary)
}

/// Stable-sorts tab-separated pairs by key. Lines without exactly two
/// fields are dropped; pairs with equal keys keep their input order.
pub fn sort_pairs<R: Read, W: Write>(reader: R, writer: W) -> Result<SortSummary> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut dropped = 0;

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_io(e)),
            Err(_) => {
                dropped += 1;
                continue;
            }
        };
        if record.len() != 2 {
            dropped += 1;
            continue;
        }
        pairs.push((record[0].to_string(), record[1].to_string()));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);
    for (key, value) in &pairs {
        wtr.write_record([key, value]).map_err(csv_io)?;
    }
    wtr.flush().map_err(|e| PipelineError::io("<sort output>", e))?;

    Ok(SortSummary {
        pairs: pairs.len(),
        dropped,
    })
}
