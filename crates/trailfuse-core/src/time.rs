//! Time format detection and normalization to relative seconds.
//!
//! A format is detected once per table from a sample of the time columns; every
//! time cell is then converted to absolute seconds and rebased so the earliest
//! timestamp across all time columns becomes zero.

use crate::error::{Result, TrailError};
use crate::models::{CellValue, Table};
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Number of non-missing cells sampled for detection
pub const SAMPLE_SIZE: usize = 20;

/// Individually reported invalid cells before summarizing
pub const MAX_REPORTED_WARNINGS: usize = 10;

/// Share of rows with unparseable times above which the import fails
pub const MAX_INVALID_RATIO: f64 = 0.10;

const UNIX_MILLIS_MIN: f64 = 1e11;
const UNIX_SECONDS_MIN: f64 = 1e9;

static ISO_8601: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T").expect("valid regex"));

static DATETIME_STRING: LazyLock<Regex> = LazyLock::new(|| {
    let date = r"(\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{1,2}/\d{1,2}/\d{4})";
    let time = r"\d{1,2}:\d{2}(:\d{2}(\.\d+)?)?";
    Regex::new(&format!("^{} {}$", date, time)).expect("valid regex")
});

static TIME_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\d{2}(:\d{2})?(\.\d+)?$").expect("valid regex"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const ISO_LOCAL_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Detected time encoding of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeFormat {
    /// Plain seconds
    Numeric,
    UnixSeconds,
    UnixMilliseconds,
    Iso8601,
    DateTimeString,
    /// `M:SS` or `H:MM:SS`
    TimeColon,
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeFormat::Numeric => "numeric",
            TimeFormat::UnixSeconds => "unix-seconds",
            TimeFormat::UnixMilliseconds => "unix-milliseconds",
            TimeFormat::Iso8601 => "iso8601",
            TimeFormat::DateTimeString => "datetime-string",
            TimeFormat::TimeColon => "time-colon",
        };
        f.write_str(name)
    }
}

impl TimeFormat {
    /// Classify a single cell, `None` if it matches no known encoding
    pub fn classify(cell: &CellValue) -> Option<TimeFormat> {
        match cell {
            CellValue::Number(n) if n.is_finite() => {
                let magnitude = n.abs();
                if magnitude > UNIX_MILLIS_MIN {
                    Some(TimeFormat::UnixMilliseconds)
                } else if magnitude >= UNIX_SECONDS_MIN {
                    Some(TimeFormat::UnixSeconds)
                } else {
                    Some(TimeFormat::Numeric)
                }
            }
            CellValue::Text(s) => {
                let s = s.trim();
                if ISO_8601.is_match(s) {
                    Some(TimeFormat::Iso8601)
                } else if DATETIME_STRING.is_match(s) {
                    Some(TimeFormat::DateTimeString)
                } else if TIME_COLON.is_match(s) {
                    Some(TimeFormat::TimeColon)
                } else {
                    None
                }
            }
            CellValue::Number(_) | CellValue::Bool(_) | CellValue::Missing => None,
        }
    }

    /// Detect one format from a sample; every sampled value must agree
    pub fn detect<'a>(
        sample: impl IntoIterator<Item = &'a CellValue>,
        columns: &[&str],
    ) -> Result<TimeFormat> {
        let undetected = |reason: String| TrailError::FormatUndetected {
            columns: columns.join(", "),
            reason,
        };

        let mut detected: Option<TimeFormat> = None;
        for cell in sample {
            let format = TimeFormat::classify(cell).ok_or_else(|| {
                undetected(format!(
                    "value '{}' ({}) is not a recognized time",
                    cell,
                    cell.type_name()
                ))
            })?;
            match detected {
                None => detected = Some(format),
                Some(existing) if existing == format => {}
                Some(existing) => {
                    return Err(undetected(format!(
                        "sample mixes {} and {} values (e.g. '{}')",
                        existing, format, cell
                    )));
                }
            }
        }

        detected.ok_or_else(|| undetected("no time values to sample".to_string()))
    }

    /// Convert a cell to absolute seconds under this format
    pub fn to_seconds(&self, cell: &CellValue) -> Option<f64> {
        let seconds = match self {
            TimeFormat::Numeric | TimeFormat::UnixSeconds => cell.as_number(),
            TimeFormat::UnixMilliseconds => cell.as_number().map(|ms| ms / 1000.0),
            TimeFormat::Iso8601 => cell.as_text().and_then(parse_iso8601),
            TimeFormat::DateTimeString => cell.as_text().and_then(parse_datetime_string),
            TimeFormat::TimeColon => cell.as_text().and_then(parse_time_colon),
        }?;
        seconds.is_finite().then_some(seconds)
    }

}

fn parse_iso8601(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64 / 1000.0);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.timestamp_millis() as f64 / 1000.0);
    }
    ISO_LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis() as f64 / 1000.0)
}

fn parse_datetime_string(s: &str) -> Option<f64> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis() as f64 / 1000.0)
}

fn parse_time_colon(s: &str) -> Option<f64> {
    let parts: Vec<f64> = s
        .trim()
        .split(':')
        .map(|p| p.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [h, m, sec] => Some(h * 3600.0 + m * 60.0 + sec),
        [m, sec] => Some(m * 60.0 + sec),
        _ => None,
    }
}

/// Outcome of normalizing a table's time columns
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationReport {
    pub format: TimeFormat,

    /// Absolute seconds subtracted from every value
    pub baseline: f64,

    pub total_rows: usize,
    pub invalid_rows: usize,
    pub warnings: Vec<String>,
}

/// Rewrites time columns of a table to relative seconds
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    columns: Vec<String>,
}

impl TimeNormalizer {
    pub fn new(columns: &[&str]) -> Self {
        Self { columns: columns.iter().map(|c| c.to_lowercase()).collect() }
    }

    /// Normalizer for whichever of `time`, `start`, `end` the table carries
    pub fn for_table(table: &Table) -> Self {
        let columns: Vec<&str> =
            ["time", "start", "end"].into_iter().filter(|c| table.has_column(c)).collect();
        Self::new(&columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Detect the table's time format from a sample of its time cells
    pub fn detect(&self, table: &Table) -> Result<TimeFormat> {
        let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let sample = table
            .rows
            .iter()
            .flat_map(|row| columns.iter().map(move |c| row.get(c)))
            .filter(|cell| !cell.is_missing())
            .take(SAMPLE_SIZE);
        TimeFormat::detect(sample, &columns)
    }

    /// Normalize in place. On error the table is left untouched.
    pub fn normalize(&self, table: &mut Table) -> Result<NormalizationReport> {
        let format = self.detect(table)?;

        // Convert everything first so a failure leaves the table untouched
        let mut converted: Vec<Vec<Option<f64>>> = Vec::with_capacity(table.rows.len());
        let mut warnings = Vec::new();
        let mut invalid_cells = 0usize;
        let mut invalid_rows = 0usize;

        for (idx, row) in table.rows.iter().enumerate() {
            let mut row_values = Vec::with_capacity(self.columns.len());
            let mut row_invalid = false;
            for column in &self.columns {
                let cell = row.get(column);
                let value = format.to_seconds(cell);
                if value.is_none() {
                    row_invalid = true;
                    invalid_cells += 1;
                    if warnings.len() < MAX_REPORTED_WARNINGS {
                        warnings.push(format!(
                            "Row {}: invalid {} value '{}' in column '{}'",
                            idx + 1,
                            format,
                            cell,
                            column
                        ));
                    }
                }
                row_values.push(value);
            }
            if row_invalid {
                invalid_rows += 1;
            }
            converted.push(row_values);
        }

        if invalid_cells > MAX_REPORTED_WARNINGS {
            warnings.push(format!(
                "... and {} more invalid time values",
                invalid_cells - MAX_REPORTED_WARNINGS
            ));
        }

        let total_rows = table.rows.len();
        if total_rows > 0 && invalid_rows as f64 / total_rows as f64 > MAX_INVALID_RATIO {
            return Err(TrailError::TooManyInvalidTimes {
                invalid: invalid_rows,
                total: total_rows,
            });
        }

        let baseline =
            converted.iter().flatten().flatten().copied().fold(f64::INFINITY, f64::min);
        let baseline = if baseline.is_finite() { baseline } else { 0.0 };

        for (row, values) in table.rows.iter_mut().zip(converted) {
            for (column, value) in self.columns.iter().zip(values) {
                let cell = match value {
                    Some(seconds) => CellValue::Number(seconds - baseline),
                    None => CellValue::Missing,
                };
                if let Some(slot) = row.get_mut(column) {
                    *slot = cell;
                }
            }
        }

        if invalid_rows > 0 {
            tracing::warn!(
                table = %table.name,
                invalid_rows,
                total_rows,
                "Some time values could not be parsed"
            );
        }
        tracing::debug!(table = %table.name, %format, baseline, "Normalized time columns");

        Ok(NormalizationReport { format, baseline, total_rows, invalid_rows, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRow;

    fn time_table(values: Vec<CellValue>) -> Table {
        let mut table = Table::new("t", &["time", "x", "y"]);
        for v in values {
            let mut row = RawRow::new();
            row.insert("time", v);
            row.insert("x", 1.0);
            row.insert("y", 1.0);
            table.push_row(row);
        }
        table
    }

    #[test]
    fn test_classify_numeric_magnitudes() {
        assert_eq!(TimeFormat::classify(&CellValue::Number(12.5)), Some(TimeFormat::Numeric));
        assert_eq!(
            TimeFormat::classify(&CellValue::Number(1_700_000_000.0)),
            Some(TimeFormat::UnixSeconds)
        );
        assert_eq!(
            TimeFormat::classify(&CellValue::Number(1_700_000_000_000.0)),
            Some(TimeFormat::UnixMilliseconds)
        );
    }

    #[test]
    fn test_classify_strings() {
        let cases = [
            ("2024-03-01T10:00:00Z", TimeFormat::Iso8601),
            ("2024-03-01 10:00:00", TimeFormat::DateTimeString),
            ("03/01/2024 10:00", TimeFormat::DateTimeString),
            ("1:05", TimeFormat::TimeColon),
            ("1:02:03", TimeFormat::TimeColon),
            ("1:05.5", TimeFormat::TimeColon),
            ("1:02:03.25", TimeFormat::TimeColon),
        ];
        for (text, expected) in cases {
            assert_eq!(TimeFormat::classify(&CellValue::from(text)), Some(expected), "{}", text);
        }
        assert_eq!(TimeFormat::classify(&CellValue::from("noon")), None);
        assert_eq!(TimeFormat::classify(&CellValue::Bool(true)), None);
    }

    #[test]
    fn test_detect_rejects_mixed_sample() {
        let sample = [CellValue::Number(3.0), CellValue::from("1:00")];
        let err = TimeFormat::detect(sample.iter(), &["time"]).unwrap_err();
        assert!(matches!(err, TrailError::FormatUndetected { .. }));
    }

    #[test]
    fn test_detect_rejects_empty_sample() {
        let err = TimeFormat::detect(std::iter::empty::<&CellValue>(), &["time"]).unwrap_err();
        assert!(matches!(err, TrailError::FormatUndetected { .. }));
    }

    #[test]
    fn test_unix_millis_become_relative_seconds() {
        let mut table = time_table(vec![
            CellValue::Number(1_700_000_000_000.0),
            CellValue::Number(1_700_000_060_000.0),
        ]);
        let report = TimeNormalizer::for_table(&table).normalize(&mut table).unwrap();

        assert_eq!(report.format, TimeFormat::UnixMilliseconds);
        assert_eq!(table.rows[0].get("time"), &CellValue::Number(0.0));
        assert_eq!(table.rows[1].get("time"), &CellValue::Number(60.0));
    }

    #[test]
    fn test_numeric_times_rebased_to_earliest() {
        let mut table = time_table(vec![CellValue::Number(5.0), CellValue::Number(7.5)]);
        let report = TimeNormalizer::for_table(&table).normalize(&mut table).unwrap();

        assert_eq!(report.format, TimeFormat::Numeric);
        assert_eq!(report.baseline, 5.0);
        assert_eq!(table.rows[0].get("time"), &CellValue::Number(0.0));
        assert_eq!(table.rows[1].get("time"), &CellValue::Number(2.5));
    }

    #[test]
    fn test_time_colon_conversion() {
        let mut table = time_table(vec![
            CellValue::from("1:00:00"),
            CellValue::from("1:00:30"),
            CellValue::from("1:01:00"),
        ]);
        TimeNormalizer::for_table(&table).normalize(&mut table).unwrap();
        assert_eq!(table.rows[1].get("time"), &CellValue::Number(30.0));
        assert_eq!(table.rows[2].get("time"), &CellValue::Number(60.0));
        assert_eq!(parse_time_colon("2:30"), Some(150.0));
        assert_eq!(parse_time_colon("1:05.5"), Some(65.5));
    }

    #[test]
    fn test_baseline_spans_start_and_end_columns() {
        let mut table = Table::new("codes", &["code", "start", "end"]);
        for (start, end) in [
            ("2024-01-01 10:00:10", "2024-01-01 10:00:20"),
            ("2024-01-01 10:00:00", "2024-01-01 10:00:05"),
        ] {
            let mut row = RawRow::new();
            row.insert("code", "group");
            row.insert("start", start);
            row.insert("end", end);
            table.push_row(row);
        }
        let report = TimeNormalizer::for_table(&table).normalize(&mut table).unwrap();

        assert_eq!(report.format, TimeFormat::DateTimeString);
        assert_eq!(table.rows[0].get("start"), &CellValue::Number(10.0));
        assert_eq!(table.rows[0].get("end"), &CellValue::Number(20.0));
        assert_eq!(table.rows[1].get("start"), &CellValue::Number(0.0));
    }

    #[test]
    fn test_iso_with_offset() {
        assert_eq!(parse_iso8601("1970-01-01T00:01:00Z"), Some(60.0));
        assert_eq!(parse_iso8601("1970-01-01T01:00:00+01:00"), Some(0.0));
        assert_eq!(parse_iso8601("1970-01-01T00:00:01.5"), Some(1.5));
    }

    #[test]
    fn test_too_many_invalid_times_leaves_table_untouched() {
        let mut values: Vec<CellValue> = (0..25).map(|i| CellValue::Number(i as f64)).collect();
        values.push(CellValue::from("bogus"));
        values.push(CellValue::Missing);
        values.push(CellValue::from("later"));
        let mut table = time_table(values);

        let err = TimeNormalizer::for_table(&table).normalize(&mut table).unwrap_err();
        assert!(matches!(err, TrailError::TooManyInvalidTimes { invalid: 3, total: 28 }));
        assert_eq!(table.rows[25].get("time"), &CellValue::from("bogus"));
        assert_eq!(table.rows[3].get("time"), &CellValue::Number(3.0));
    }

    #[test]
    fn test_invalid_warnings_are_capped() {
        let mut values: Vec<CellValue> = (0..200).map(|i| CellValue::Number(i as f64)).collect();
        for _ in 0..15 {
            values.push(CellValue::from("n/a"));
        }
        let mut table = time_table(values);
        let report = TimeNormalizer::for_table(&table).normalize(&mut table).unwrap();

        assert_eq!(report.invalid_rows, 15);
        assert_eq!(report.warnings.len(), MAX_REPORTED_WARNINGS + 1);
        assert!(report.warnings.last().unwrap().contains("5 more"));
        assert!(table.rows[210].get("time").is_missing());
    }
}
