//! Concatenates raw turnstile files into one master file with a single header.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::record::MASTER_HEADER;

/// What a merge wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub files: usize,
    pub rows: usize,
}

/// Writes [`MASTER_HEADER`] followed by every non-header line of `inputs`,
/// file by file, into `dest`.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if any input cannot be read or `dest`
/// cannot be written. Nothing is retried.
#[tracing::instrument(skip_all, fields(files = inputs.len(), dest = %dest.display()))]
pub fn create_master_file(inputs: &[PathBuf], dest: &Path) -> Result<MergeSummary> {
    let file = File::create(dest).map_err(|e| PipelineError::io(dest, e))?;
    let mut writer = BufWriter::new(file);

    let summary = merge_into(inputs, &mut writer, dest)?;
    writer.flush().map_err(|e| PipelineError::io(dest, e))?;

    info!(files = summary.files, rows = summary.rows, "Master file written");
    Ok(summary)
}

/// Merges `inputs` into an arbitrary sink. `dest` only labels write errors.
pub fn merge_into<W: Write>(inputs: &[PathBuf], writer: &mut W, dest: &Path) -> Result<MergeSummary> {
    writeln!(writer, "{}", MASTER_HEADER).map_err(|e| PipelineError::io(dest, e))?;

    let mut summary = MergeSummary::default();

    for path in inputs {
        let mut reader = open_source(path)?;
        let rows = copy_data_lines(&mut reader, writer, path, dest)?;
        debug!(path = %path.display(), rows, "Source file merged");

        summary.files += 1;
        summary.rows += rows;
    }

    Ok(summary)
}

/// Opens a source file, decompressing it when the name ends in `.gz`.
fn open_source(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;

    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    if is_gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Skips the first line of `reader` and copies the rest, newline-terminated.
fn copy_data_lines<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    source: &Path,
    dest: &Path,
) -> Result<usize> {
    let mut line = Vec::new();
    let mut rows = 0;
    let mut header_seen = false;

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| PipelineError::io(source, e))?;
        if n == 0 {
            break;
        }

        if !header_seen {
            header_seen = true;
            continue;
        }

        let content = strip_line_ending(&line);
        writer
            .write_all(content)
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| PipelineError::io(dest, e))?;
        rows += 1;
    }

    Ok(rows)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
