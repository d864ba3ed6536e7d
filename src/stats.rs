use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::record::DerivedRecord;
use crate::stages::reducer::UnitTotal;

#[derive(Debug, Default, Serialize)]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,

    // merge
    pub files_merged: usize,
    pub rows_merged: usize,

    // filter
    pub rows_read: usize,
    pub rows_regular: usize,
    pub rows_malformed: usize,

    // delta
    pub rows_derived: usize,
    pub rows_non_numeric: usize,

    // map / reduce
    pub pairs_emitted: usize,
    pub pairs_dropped: usize,
    pub pairs_skipped: usize,

    // observation window of the derived rows
    pub window_start: Option<NaiveDateTime>,
    pub window_end: Option<NaiveDateTime>,
    pub window_minutes: i64,

    pub totals: Vec<UnitTotal>,
}

impl PipelineReport {
    pub fn new() -> Self {
        PipelineReport {
            generated_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of merged rows that were dropped as malformed or non-numeric.
    pub fn skip_pct(&self) -> f64 {
        Self::pct(self.rows_malformed + self.rows_non_numeric, self.rows_read)
    }

    /// Records the earliest and latest parseable reading time.
    pub fn with_window(mut self, rows: &[DerivedRecord]) -> Self {
        let mut stamps = rows.iter().filter_map(|r| r.record.observed_at());
        if let Some(first) = stamps.next() {
            let (start, end) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
            self.window_start = Some(start);
            self.window_end = Some(end);
            self.window_minutes = (end - start).num_minutes();
        }
        self
    }

    /// Sum over all unit totals.
    pub fn grand_total(&self) -> f64 {
        self.totals.iter().map(|t| t.total).sum()
    }
}
