//! Turns cumulative turnstile counters into per-interval (hourly) counts.
//!
//! Counter resets and wraps are not detected: a reset shows up as a
//! negative or implausibly large delta.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::record::{DerivedRecord, IndexedRecord};

/// Value given to the first row, which has no predecessor to diff against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// A fixed placeholder value. Not a measurement.
    Sentinel(i64),
    /// Leave the first delta empty.
    Missing,
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        BoundaryPolicy::Sentinel(1)
    }
}

impl BoundaryPolicy {
    fn first_value(self) -> Option<i64> {
        match self {
            BoundaryPolicy::Sentinel(v) => Some(v),
            BoundaryPolicy::Missing => None,
        }
    }
}

impl FromStr for BoundaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("missing") {
            return Ok(BoundaryPolicy::Missing);
        }
        s.parse::<i64>()
            .map(BoundaryPolicy::Sentinel)
            .map_err(|_| format!("expected 'missing' or an integer sentinel, got '{}'", s))
    }
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Sentinel(v) => write!(f, "{}", v),
            BoundaryPolicy::Missing => write!(f, "missing"),
        }
    }
}

/// Adjacent differences of `counters`; the first slot follows `boundary`.
///
/// A difference that does not fit in an `i64` is left empty.
pub fn counter_deltas(counters: &[i64], boundary: BoundaryPolicy) -> Vec<Option<i64>> {
    let mut deltas = Vec::with_capacity(counters.len());
    let mut previous: Option<i64> = None;

    for &counter in counters {
        let delta = match previous {
            None => boundary.first_value(),
            Some(prev) => {
                let delta = counter.checked_sub(prev);
                if delta.is_none() {
                    warn!(counter, previous = prev, "Counter delta overflows, leaving it empty");
                }
                delta
            }
        };
        deltas.push(delta);
        previous = Some(counter);
    }

    deltas
}

/// Coerces a counter field to an integer.
///
/// Whole-valued decimals such as `"12.0"` are accepted; anything else is a
/// [`PipelineError::Value`].
pub fn coerce_counter(raw: &str, line: u64) -> Result<i64> {
    let value = raw.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }

    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(PipelineError::Value {
            line,
            value: raw.to_string(),
        }),
    }
}

/// Derived rows plus how many regular rows were dropped for bad counters.
#[derive(Debug, Default)]
pub struct DeriveOutcome {
    pub rows: Vec<DerivedRecord>,
    pub skipped: usize,
}

/// Adds hourly entries and exits to each row.
///
/// Rows whose counters are not numeric are dropped. The delta algorithm is
/// then run over the remaining rows, once for entries and once for exits.
#[tracing::instrument(skip_all, fields(rows = rows.len(), boundary = %boundary))]
pub fn derive_hourly(rows: Vec<IndexedRecord>, boundary: BoundaryPolicy) -> DeriveOutcome {
    let mut kept = Vec::with_capacity(rows.len());
    let mut entries = Vec::with_capacity(rows.len());
    let mut exits = Vec::with_capacity(rows.len());
    let mut skipped = 0;

    for row in rows {
        let line = row.index as u64;
        let counters = coerce_counter(&row.record.entries, line)
            .and_then(|e| coerce_counter(&row.record.exits, line).map(|x| (e, x)));

        match counters {
            Ok((e, x)) => {
                entries.push(e);
                exits.push(x);
                kept.push(row);
            }
            Err(err) => {
                warn!(index = row.index, unit = %row.record.unit, error = %err, "Dropping row with non-numeric counter");
                skipped += 1;
            }
        }
    }

    let entries_hourly = counter_deltas(&entries, boundary);
    let exits_hourly = counter_deltas(&exits, boundary);

    let rows: Vec<DerivedRecord> = kept
        .into_iter()
        .enumerate()
        .map(|(i, row)| DerivedRecord {
            index: row.index,
            record: row.record,
            entries: entries[i],
            exits: exits[i],
            entries_hourly: entries_hourly[i],
            exits_hourly: exits_hourly[i],
        })
        .collect();

    info!(derived = rows.len(), skipped, "Hourly counts derived");
    DeriveOutcome { rows, skipped }
}
