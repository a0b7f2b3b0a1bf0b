//! Time-indexed series table
//!
//! A [`SeriesTable`] pairs a strictly ascending timestamp index with a polars
//! [`DataFrame`] holding one column per variable. The index is kept outside
//! the frame so that feature generators can address rows by grid position
//! without re-reading a datetime column.

use crate::error::{FeatureError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use polars::prelude::*;

/// Timestamp formats accepted when parsing string time columns
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Ordered table of observations keyed by unique, ascending timestamps
#[derive(Debug, Clone)]
pub struct SeriesTable {
    index: Vec<NaiveDateTime>,
    frame: DataFrame,
}

impl SeriesTable {
    /// Create a table from an index and a frame of variables.
    ///
    /// Fails if the index is not strictly ascending or if the frame height
    /// does not match the index length.
    pub fn new(index: Vec<NaiveDateTime>, frame: DataFrame) -> Result<Self> {
        if frame.width() > 0 && frame.height() != index.len() {
            return Err(FeatureError::ShapeError {
                expected: format!("{} rows", index.len()),
                actual: format!("{} rows", frame.height()),
            });
        }

        for pair in index.windows(2) {
            if pair[1] == pair[0] {
                return Err(FeatureError::DuplicateTimestamp(format_timestamp(&pair[1])));
            }
            if pair[1] < pair[0] {
                return Err(FeatureError::UnsortedIndex {
                    previous: format_timestamp(&pair[0]),
                    current: format_timestamp(&pair[1]),
                });
            }
        }

        Ok(Self { index, frame })
    }

    /// Split a frame into index and variables, using `time_column` as the index.
    ///
    /// The time column may be a polars `Datetime` or `Date`, an integer column
    /// holding Unix seconds, or a string column in ISO-like format.
    pub fn from_frame(df: &DataFrame, time_column: &str) -> Result<Self> {
        let column = df
            .column(time_column)
            .map_err(|_| FeatureError::ColumnNotFound(time_column.to_string()))?;
        let index = timestamps_from_column(column)?;
        let frame = df.drop(time_column)?;
        Self::new(index, frame)
    }

    /// Re-attach the index as a leading `Datetime(ms)` column
    pub fn to_frame(&self, time_column: &str) -> Result<DataFrame> {
        let millis: Vec<i64> = self
            .index
            .iter()
            .map(|ts| ts.and_utc().timestamp_millis())
            .collect();
        let time = Series::new(time_column.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

        let mut columns: Vec<Column> = Vec::with_capacity(self.frame.width() + 1);
        columns.push(time.into());
        columns.extend(self.frame.get_columns().iter().cloned());
        Ok(DataFrame::new(columns)?)
    }

    /// Timestamp index
    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    /// Variables as a polars frame
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Variable names in column order
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Look up a variable by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| FeatureError::ColumnNotFound(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Append columns on the right, returning a new table
    pub fn with_columns(&self, columns: Vec<Column>) -> Result<Self> {
        let frame = if self.frame.width() == 0 {
            DataFrame::new(columns)?
        } else {
            self.frame.hstack(&columns)?
        };
        Self::new(self.index.clone(), frame)
    }

    /// Drop the named columns, returning a new table
    pub fn without_columns(&self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        let keep: Vec<PlSmallStr> = self
            .frame
            .get_column_names()
            .into_iter()
            .filter(|name| !names.iter().any(|dropped| dropped == name.as_str()))
            .cloned()
            .collect();
        Self::new(self.index.clone(), self.frame.select(keep)?)
    }

    /// Drop the first `n` rows
    pub fn skip_rows(&self, n: usize) -> Result<Self> {
        let n = n.min(self.height());
        let remaining = self.height() - n;
        let frame = self.frame.slice(n as i64, remaining);
        Self::new(self.index[n..].to_vec(), frame)
    }
}

/// Render a timestamp for error messages and logs
pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn timestamps_from_column(column: &Column) -> Result<Vec<NaiveDateTime>> {
    let name = column.name().to_string();
    let null_timestamp = |row: usize| FeatureError::DataError(format!("Null timestamp in '{}' at row {}", name, row));

    match column.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = column.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    let value = value.ok_or_else(|| null_timestamp(row))?;
                    let ts = match unit {
                        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
                        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
                        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
                    };
                    ts.map(|dt| dt.naive_utc()).ok_or_else(|| {
                        FeatureError::DataError(format!("Timestamp out of range at row {}", row))
                    })
                })
                .collect()
        }
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| FeatureError::DataError("Invalid epoch".to_string()))?;
            let raw = column.cast(&DataType::Int32)?;
            raw.i32()?
                .into_iter()
                .enumerate()
                .map(|(row, days)| {
                    let days = days.ok_or_else(|| null_timestamp(row))?;
                    epoch
                        .checked_add_signed(TimeDelta::days(days as i64))
                        .ok_or_else(|| FeatureError::DataError(format!("Date out of range at row {}", row)))
                })
                .collect()
        }
        DataType::String => column
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let value = value.ok_or_else(|| null_timestamp(row))?;
                parse_timestamp(value).ok_or_else(|| {
                    FeatureError::DataError(format!("Cannot parse timestamp '{}' at row {}", value, row))
                })
            })
            .collect(),
        dtype if dtype.is_integer() => {
            let raw = column.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .enumerate()
                .map(|(row, secs)| {
                    let secs = secs.ok_or_else(|| null_timestamp(row))?;
                    DateTime::from_timestamp(secs, 0)
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| FeatureError::DataError(format!("Timestamp out of range at row {}", row)))
                })
                .collect()
        }
        other => Err(FeatureError::DataError(format!(
            "Column '{}' has type {} which cannot be used as a time index",
            name, other
        ))),
    }
}

/// Parse an ISO-like timestamp string
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
