//! Typed, validated view of an uploaded CSV.
//!
//! Columns `review_time` and `merge_time` are required integers; `team` and
//! `date` may be empty and are then counted as missing. Column order is free
//! and extra columns are ignored.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::ParsingError;

pub const COL_REVIEW_TIME: &str = "review_time";
pub const COL_MERGE_TIME: &str = "merge_time";
pub const COL_TEAM: &str = "team";
pub const COL_DATE: &str = "date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub review_time: i64,
    pub merge_time: i64,
    pub team: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Row {
    /// Parsed rows are checked so this sum cannot overflow.
    pub fn total_time(&self) -> i64 {
        self.review_time + self.merge_time
    }

    /// A PR without review or without a CI run is not a meaningful time sample.
    pub fn is_outlier(&self) -> bool {
        self.review_time == 0 || self.merge_time == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows where both `review_time` and `merge_time` are non-zero.
    pub fn without_outliers(&self) -> Table {
        Table {
            rows: self.rows.iter().filter(|r| !r.is_outlier()).cloned().collect(),
        }
    }

    pub fn from_bytes(bytes: &[u8], chunk_size: usize) -> Result<Table, ParsingError> {
        Self::from_reader(bytes, chunk_size)
    }

    /// Parse a CSV with a header row. `chunk_size` is the read buffer size.
    pub fn from_reader<R: Read>(reader: R, chunk_size: usize) -> Result<Table, ParsingError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .buffer_capacity(chunk_size.max(1))
            .from_reader(reader);

        let headers = csv.headers().map_err(csv_error)?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(ParsingError::MissingColumn(name))
        };
        let review_idx = column(COL_REVIEW_TIME)?;
        let merge_idx = column(COL_MERGE_TIME)?;
        let team_idx = column(COL_TEAM)?;
        let date_idx = column(COL_DATE)?;

        let mut rows = Vec::new();
        let mut next_mark = chunk_size as u64;
        for record in csv.records() {
            let record = record.map_err(csv_error)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let review_time = parse_int(field(review_idx), line, COL_REVIEW_TIME)?;
            let merge_time = parse_int(field(merge_idx), line, COL_MERGE_TIME)?;
            if review_time.checked_add(merge_time).is_none() {
                return Err(ParsingError::InvalidValue {
                    line,
                    column: COL_MERGE_TIME,
                    value: field(merge_idx).to_string(),
                    expected: "a time whose sum with review_time fits in 64 bits",
                });
            }

            rows.push(Row {
                review_time,
                merge_time,
                team: non_empty(field(team_idx)).map(str::to_string),
                date: non_empty(field(date_idx))
                    .map(|raw| parse_date(raw, line))
                    .transpose()?,
            });

            let consumed = record.position().map(|p| p.byte()).unwrap_or(0);
            if consumed >= next_mark {
                debug!(rows = rows.len(), bytes = consumed, "Parsed dataset chunk");
                next_mark = consumed + chunk_size as u64;
            }
        }

        debug!(rows = rows.len(), "Parsed dataset");
        Ok(Table { rows })
    }
}

fn csv_error(err: csv::Error) -> ParsingError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.kind() {
        csv::ErrorKind::Io(io) => ParsingError::Unreadable(io.to_string()),
        _ => ParsingError::Csv {
            line,
            message: err.to_string(),
        },
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

fn parse_int(raw: &str, line: u64, column: &'static str) -> Result<i64, ParsingError> {
    if raw.is_empty() {
        return Err(ParsingError::MissingValue { line, column });
    }
    raw.parse::<i64>().map_err(|_| ParsingError::InvalidValue {
        line,
        column,
        value: raw.to_string(),
        expected: "an integer",
    })
}

/// `YYYY-MM-DD`, or a datetime truncated to its date.
fn parse_date(raw: &str, line: u64) -> Result<NaiveDate, ParsingError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(datetime.date());
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.date_naive());
    }
    Err(ParsingError::InvalidValue {
        line,
        column: COL_DATE,
        value: raw.to_string(),
        expected: "a date (YYYY-MM-DD)",
    })
}
