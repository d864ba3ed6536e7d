//! Sums hourly entries per control unit over contiguous runs of keys.
//!
//! Input must already be grouped by key (see [`crate::stages::sort`]); a key
//! that reappears after a different one starts a new run and is emitted
//! again.

use std::fs::File;
use std::io::{Read, Write};
use std::num::ParseFloatError;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::stages::utility::{csv_io, format_total, relabel_io};

/// Total for one run of a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitTotal {
    pub unit: String,
    pub total: f64,
}

#[derive(Debug, Default, PartialEq)]
enum State {
    #[default]
    NoCurrentKey,
    Accumulating { key: String, sum: f64 },
}

/// Run-length aggregation state machine.
#[derive(Debug, Default)]
pub struct Reducer {
    state: State,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one already-parsed pair. Returns the finished total of the
    /// previous run when `key` differs from the current one.
    pub fn push(&mut self, key: &str, value: f64) -> Option<UnitTotal> {
        if let State::Accumulating { key: current, sum } = &mut self.state {
            if current.as_str() == key {
                *sum += value;
                return None;
            }
        }

        let next = State::Accumulating {
            key: key.to_string(),
            sum: value,
        };
        match std::mem::replace(&mut self.state, next) {
            State::Accumulating { key, sum } => Some(UnitTotal { unit: key, total: sum }),
            State::NoCurrentKey => None,
        }
    }

    /// Parses `value` and feeds the pair. A value that does not parse
    /// leaves the state untouched.
    pub fn push_raw(&mut self, key: &str, value: &str) -> Result<Option<UnitTotal>, ParseFloatError> {
        let value: f64 = value.trim().parse()?;
        Ok(self.push(key, value))
    }

    /// Emits the run still being accumulated, if any.
    pub fn finish(self) -> Option<UnitTotal> {
        match self.state {
            State::Accumulating { key, sum } => Some(UnitTotal { unit: key, total: sum }),
            State::NoCurrentKey => None,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ReduceSummary {
    pub totals: Vec<UnitTotal>,
    pub read: usize,
    pub skipped: usize,
}

/// Reduces the mapper output at `input` into `output`.
#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn reduce_file(input: &Path, output: &Path) -> Result<ReduceSummary> {
    let src = File::open(input).map_err(|e| PipelineError::io(input, e))?;
    let dst = File::create(output).map_err(|e| PipelineError::io(output, e))?;

    reduce_pairs(src, dst).map_err(|e| relabel_io(e, output))
}

/// Reads `key<TAB>value` lines and writes one `key<TAB>total` line per run.
///
/// Lines without exactly two fields, or whose value is not a number, are
/// skipped. Empty input produces no output.
pub fn reduce_pairs<R: Read, W: Write>(reader: R, mut writer: W) -> Result<ReduceSummary> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut reducer = Reducer::new();
    let mut summary = ReduceSummary::default();

    for result in rdr.records() {
        summary.read += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(csv_io(e)),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable pair");
                summary.skipped += 1;
                continue;
            }
        };

        if record.len() != 2 {
            debug!(fields = record.len(), "Skipping line without exactly two fields");
            summary.skipped += 1;
            continue;
        }

        let (key, value) = (&record[0], &record[1]);
        match reducer.push_raw(key, value) {
            Ok(Some(done)) => emit(&mut writer, done, &mut summary)?,
            Ok(None) => {}
            Err(e) => {
                warn!(key, value, error = %e, "Skipping non-numeric value");
                summary.skipped += 1;
            }
        }
    }

    if let Some(done) = reducer.finish() {
        emit(&mut writer, done, &mut summary)?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io("<reducer output>", e))?;

    info!(
        groups = summary.totals.len(),
        read = summary.read,
        skipped = summary.skipped,
        "Reducer finished"
    );
    Ok(summary)
}

fn emit<W: Write>(writer: &mut W, total: UnitTotal, summary: &mut ReduceSummary) -> Result<()> {
    writeln!(writer, "{}\t{}", total.unit, format_total(total.total))
        .map_err(|e| PipelineError::io("<reducer output>", e))?;
    summary.totals.push(total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reduce(input: &str) -> (ReduceSummary, String) {
        let mut out = Vec::new();
        let summary = reduce_pairs(input.as_bytes(), &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    fn total(unit: &str, total: f64) -> UnitTotal {
        UnitTotal {
            unit: unit.into(),
            total,
        }
    }

    #[test]
    fn test_contiguous_runs() {
        let (summary, out) = reduce("A\t1\nA\t2\nB\t5\nB\t1\nB\t1\n");
        assert_eq!(out, "A\t3\nB\t7\n");
        assert_eq!(summary.totals, vec![total("A", 3.0), total("B", 7.0)]);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn test_single_pair() {
        let (_, out) = reduce("X\t10\n");
        assert_eq!(out, "X\t10\n");
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        let (summary, out) = reduce("");
        assert!(out.is_empty());
        assert!(summary.totals.is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let (summary, out) = reduce("A\t1\njunk\nA\t2\textra\nA\t4\n");
        assert_eq!(out, "A\t5\n");
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_bad_value_does_not_switch_key() {
        // The bad B line must not close the A run.
        let (summary, out) = reduce("A\t1\nB\toops\nA\t2\nB\t3\n");
        assert_eq!(out, "A\t3\nB\t3\n");
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_non_contiguous_key_emitted_per_run() {
        let (_, out) = reduce("A\t1\nB\t1\nA\t1\n");
        assert_eq!(out, "A\t1\nB\t1\nA\t1\n");
    }

    #[test]
    fn test_stray_quote_does_not_swallow_following_lines() {
        let (summary, out) = reduce("\"A\t1\nA\t2\nB\t5\nB\t1\n");
        assert_eq!(out, "\"A\t1\nA\t2\nB\t6\n");
        assert_eq!(summary.read, 4);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn test_fractional_values() {
        let (_, out) = reduce("R051\t1.5\nR051\t2\n");
        assert_eq!(out, "R051\t3.5\n");
    }

    #[test]
    fn test_reduce_file_names_the_failing_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("mapper_result.txt");
        let err = reduce_file(&missing, &dir.path().join("out.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.to_string().contains("mapper_result.txt"));

        let input = dir.path().join("pairs.txt");
        std::fs::write(&input, "A\t1\n").unwrap();
        let err = reduce_file(&input, &dir.path().join("no/such/dir/out.txt")).unwrap_err();
        assert!(err.to_string().contains("out.txt"));
    }

    #[test]
    fn test_state_machine_directly() {
        let mut r = Reducer::new();
        assert_eq!(r.push("K", 1.0), None);
        assert_eq!(r.push("K", 2.0), None);
        assert_eq!(r.push("L", 4.0), Some(total("K", 3.0)));
        assert!(r.push_raw("M", "nan?").is_err());
        assert_eq!(r.finish(), Some(total("L", 4.0)));
        assert_eq!(Reducer::new().finish(), None);
    }
}
