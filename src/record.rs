//! Turnstile row types and the column layouts shared by the stages.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

/// Header line written at the top of the merged master file.
pub const MASTER_HEADER: &str =
    "C/A,UNIT,SCP,STATION,LINENAME,DIVISION,DATEn,TIMEn,DESCn,ENTRIESn,EXITSn";

/// Number of columns in a raw turnstile row.
pub const RAW_FIELD_COUNT: usize = 11;

/// Header of the derived dataset. The leading empty column holds the row
/// index, which puts UNIT at field 2 and `ENTRIESn_hourly` at field 12.
pub const DERIVED_HEADER: [&str; 14] = [
    "",
    "C/A",
    "UNIT",
    "SCP",
    "STATION",
    "LINENAME",
    "DIVISION",
    "DATEn",
    "TIMEn",
    "DESCn",
    "ENTRIESn",
    "EXITSn",
    "ENTRIESn_hourly",
    "EXITSn_hourly",
];

/// Description tag of a routine scheduled reading.
pub const REGULAR_TAG: &str = "REGULAR";

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

/// One row of a raw turnstile file, deserialized by position.
///
/// Counters stay as text here; they are coerced to integers when hourly
/// deltas are derived.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    pub control_area: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
    pub line_name: String,
    pub division: String,
    pub date: String,
    pub time: String,
    pub description: String,
    pub entries: String,
    pub exits: String,
}

impl RawRecord {
    pub fn is_regular(&self) -> bool {
        self.description == REGULAR_TAG
    }

    /// Timestamp of the reading, if `DATEn`/`TIMEn` parse.
    pub fn observed_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()?;
        let time = NaiveTime::parse_from_str(self.time.trim(), TIME_FORMAT).ok()?;
        Some(NaiveDateTime::new(date, time))
    }
}

/// A raw record tagged with its position among the merged data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub index: usize,
    pub record: RawRecord,
}

/// A regular reading extended with its hourly entry and exit counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedRecord {
    pub index: usize,
    pub record: RawRecord,
    pub entries: i64,
    pub exits: i64,
    pub entries_hourly: Option<i64>,
    pub exits_hourly: Option<i64>,
}

impl DerivedRecord {
    /// Field values in [`DERIVED_HEADER`] order. A missing hourly value is
    /// written as an empty field.
    pub fn to_fields(&self) -> Vec<String> {
        let r = &self.record;
        vec![
            self.index.to_string(),
            r.control_area.clone(),
            r.unit.clone(),
            r.scp.clone(),
            r.station.clone(),
            r.line_name.clone(),
            r.division.clone(),
            r.date.clone(),
            r.time.clone(),
            r.description.clone(),
            self.entries.to_string(),
            self.exits.to_string(),
            optional_field(self.entries_hourly),
            optional_field(self.exits_hourly),
        ]
    }
}

fn optional_field(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn sample_record(unit: &str, desc: &str, entries: &str, exits: &str) -> RawRecord {
    RawRecord {
        control_area: "A002".into(),
        unit: unit.into(),
        scp: "02-00-00".into(),
        station: "59 ST".into(),
        line_name: "NQR456W".into(),
        division: "BMT".into(),
        date: "06/03/2017".into(),
        time: "00:00:00".into(),
        description: desc.into(),
        entries: entries.into(),
        exits: exits.into(),
    }
}
