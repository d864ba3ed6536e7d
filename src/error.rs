//! Error types for the turnstile pipeline.
//!
//! [`PipelineError::Io`] is fatal and aborts the current stage. The
//! row-level variants ([`PipelineError::Parse`], [`PipelineError::SchemaMismatch`]
//! and [`PipelineError::Value`]) are reported by the stages, logged and the
//! row is dropped.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: malformed row: {message}")]
    Parse { line: u64, message: String },
    #[error("line {line}: expected {expected} fields, found {found}")]
    SchemaMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: counter value '{value}' is not numeric")]
    Value { line: u64, value: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = PipelineError::io(
            "missing.txt",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("missing.txt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_row_level_messages() {
        let err = PipelineError::SchemaMismatch {
            line: 4,
            expected: 11,
            found: 6,
        };
        assert_eq!(err.to_string(), "line 4: expected 11 fields, found 6");

        let err = PipelineError::Value {
            line: 9,
            value: "abc".into(),
        };
        assert!(err.to_string().contains("'abc'"));
    }
}
