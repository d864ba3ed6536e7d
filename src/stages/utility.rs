use std::path::Path;

use crate::error::PipelineError;

/// Converts a `csv` error raised while streaming into a [`PipelineError`].
pub fn csv_io(e: csv::Error) -> PipelineError {
    let line = e.position().map(|p| p.line()).unwrap_or(0);
    match e.into_kind() {
        csv::ErrorKind::Io(source) => PipelineError::io("<stream>", source),
        other => PipelineError::Parse {
            line,
            message: format!("{:?}", other),
        },
    }
}

/// Attaches `path` to an I/O error coming out of a reader/writer-based stage.
pub fn relabel_io(e: PipelineError, path: &Path) -> PipelineError {
    match e {
        PipelineError::Io { source, .. } => PipelineError::io(path, source),
        other => other,
    }
}

/// Formats a summed total with the shortest representation; whole sums
/// print without a fractional part.
pub fn format_total(total: f64) -> String {
    format!("{}", total)
}
