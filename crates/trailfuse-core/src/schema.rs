//! Table schema classification and row-level validation.
//!
//! Tables are classified by header intersection (multi-code, single-code,
//! conversation, GPS movement, movement) and a type predicate over at least one
//! row. Every row is then checked for type mismatches, CSV formula injection,
//! oversized strings and out-of-range numbers. Offending rows are rejected and
//! reported; the import only fails when no schema matches or no row survives.

use crate::error::{Result, TrailError};
use crate::models::{CellValue, CodeRecord, GpsRecord, MovementRecord, RawRow, SpeechRecord, Table};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MOVEMENT_HEADERS: &[&str] = &["time", "x", "y"];
pub const CONVERSATION_HEADERS: &[&str] = &["time", "speaker", "talk"];
pub const SINGLE_CODE_HEADERS: &[&str] = &["start", "end"];
pub const MULTI_CODE_HEADERS: &[&str] = &["code", "start", "end"];

/// Prefixes that spreadsheet applications interpret as formulas
pub const FORMULA_PREFIXES: &[char] = &['=', '+', '-', '@', '\t', '\r'];

/// Row issues listed individually per list before summarizing
pub const MAX_REPORTED_ISSUES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    Movement,
    GpsMovement,
    Conversation,
    SingleCode,
    MultiCode,
    Unknown,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Movement => "movement",
            FileType::GpsMovement => "gps-movement",
            FileType::Conversation => "conversation",
            FileType::SingleCode => "single-code",
            FileType::MultiCode => "multi-code",
            FileType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Numeric and string limits enforced per cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationLimits {
    pub max_string_length: usize,
    pub max_coordinate: f64,
    pub max_time: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self { max_string_length: 5000, max_coordinate: 1e7, max_time: 1e9 }
    }
}

/// One reported problem, optionally tied to a 1-based data row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub row: Option<usize>,
    pub column: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn file(message: impl Into<String>) -> Self {
        Self { row: None, column: None, message: message.into() }
    }

    fn from_rejection(err: TrailError) -> Self {
        match err {
            TrailError::RowRejected { row, column, reason } => {
                Self { row: Some(row), column: Some(column), message: reason }
            }
            other => Self::file(other.to_string()),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.row, &self.column) {
            (Some(row), Some(column)) => write!(f, "Row {} [{}]: {}", row, column, self.message),
            (Some(row), None) => write!(f, "Row {}: {}", row, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ValidationStats {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub rejected_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub file_type: FileType,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub stats: ValidationStats,
}

/// Typed rows that survived validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRecords {
    Movement(Vec<MovementRecord>),
    Gps(Vec<GpsRecord>),
    Conversation(Vec<SpeechRecord>),
    Codes(Vec<CodeRecord>),
    Empty,
}

#[derive(Debug, Clone)]
pub struct ValidatedTable {
    pub report: ValidationReport,
    pub records: ValidatedRecords,
}

impl ValidatedTable {
    /// Turn fatal report states into errors
    pub fn require_valid(self) -> Result<Self> {
        if self.report.file_type == FileType::Unknown {
            return Err(TrailError::SchemaUnrecognized { expected: expected_schemas() });
        }
        if self.report.stats.valid_rows == 0 {
            return Err(TrailError::NoValidRows { file_type: self.report.file_type.to_string() });
        }
        Ok(self)
    }
}

/// Human-readable list of every accepted header set
pub fn expected_schemas() -> String {
    [
        ("movement", MOVEMENT_HEADERS),
        ("conversation", CONVERSATION_HEADERS),
        ("single code", SINGLE_CODE_HEADERS),
        ("multi code", MULTI_CODE_HEADERS),
    ]
    .iter()
    .map(|(name, headers)| format!("{} [{}]", name, headers.join(", ")))
    .collect::<Vec<_>>()
    .join("; ")
}

#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    limits: ValidationLimits,
}

impl SchemaValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Classify a table by its headers and row types
    pub fn classify(&self, table: &Table) -> FileType {
        let has_all = |headers: &[&str]| headers.iter().all(|h| table.has_column(h));
        let any_row = |predicate: fn(&RawRow) -> bool| table.rows.iter().any(predicate);

        if has_all(MULTI_CODE_HEADERS) && any_row(is_multi_code_row) {
            FileType::MultiCode
        } else if has_all(SINGLE_CODE_HEADERS) && any_row(is_single_code_row) {
            FileType::SingleCode
        } else if has_all(CONVERSATION_HEADERS) && any_row(is_conversation_row) {
            FileType::Conversation
        } else if gps_columns(table)
            .is_some_and(|columns| table.rows.iter().any(|r| parse_gps(0, r, columns).is_ok()))
        {
            FileType::GpsMovement
        } else if has_all(MOVEMENT_HEADERS) && any_row(is_movement_row) {
            FileType::Movement
        } else {
            FileType::Unknown
        }
    }

    /// Classify and validate every row
    pub fn validate(&self, table: &Table) -> ValidatedTable {
        let file_type = self.classify(table);
        let total_rows = table.rows.len();

        let mut collector = IssueCollector::default();
        let records = match file_type {
            FileType::Movement => ValidatedRecords::Movement(self.collect_rows(
                table,
                &mut collector,
                parse_movement,
                |row, r| self.check_movement_bounds(row, r),
            )),
            FileType::GpsMovement => {
                let columns = gps_columns(table).unwrap_or(("lat", "lng"));
                ValidatedRecords::Gps(self.collect_rows(
                    table,
                    &mut collector,
                    |row, r| parse_gps(row, r, columns),
                    |row, r| self.check_time(row, "time", r.time),
                ))
            }
            FileType::Conversation => ValidatedRecords::Conversation(self.collect_rows(
                table,
                &mut collector,
                parse_conversation,
                |row, r| self.check_time(row, "time", r.time),
            )),
            FileType::MultiCode => ValidatedRecords::Codes(self.collect_rows(
                table,
                &mut collector,
                parse_multi_code,
                |row, r| self.check_code_bounds(row, r),
            )),
            FileType::SingleCode => {
                let label = table.name.clone();
                ValidatedRecords::Codes(self.collect_rows(
                    table,
                    &mut collector,
                    |row, r| parse_single_code(row, r, &label),
                    |row, r| self.check_code_bounds(row, r),
                ))
            }
            FileType::Unknown => ValidatedRecords::Empty,
        };

        let valid_rows = match &records {
            ValidatedRecords::Movement(r) => r.len(),
            ValidatedRecords::Gps(r) => r.len(),
            ValidatedRecords::Conversation(r) => r.len(),
            ValidatedRecords::Codes(r) => r.len(),
            ValidatedRecords::Empty => 0,
        };

        let (mut errors, warnings) = collector.finish();
        if file_type == FileType::Unknown {
            errors.push(ValidationIssue::file(format!(
                "Unrecognized table schema. Expected one of: {}",
                expected_schemas()
            )));
        } else if valid_rows == 0 {
            errors.push(ValidationIssue::file(format!(
                "No valid rows found in {} data",
                file_type
            )));
        }

        let stats =
            ValidationStats { total_rows, valid_rows, rejected_rows: total_rows - valid_rows };
        if stats.rejected_rows > 0 {
            tracing::warn!(
                table = %table.name,
                %file_type,
                rejected = stats.rejected_rows,
                total = total_rows,
                "Rejected rows during validation"
            );
        }

        ValidatedTable {
            report: ValidationReport {
                is_valid: file_type != FileType::Unknown && valid_rows > 0,
                file_type,
                errors,
                warnings,
                stats,
            },
            records,
        }
    }

    fn collect_rows<T>(
        &self,
        table: &Table,
        collector: &mut IssueCollector,
        parse: impl Fn(usize, &RawRow) -> Result<T>,
        bounds: impl Fn(usize, &T) -> Result<()>,
    ) -> Vec<T> {
        let mut out = Vec::with_capacity(table.rows.len());
        for (idx, raw) in table.rows.iter().enumerate() {
            let row = idx + 1;
            if let Err(e) = self.check_security(row, raw) {
                collector.error(e);
                continue;
            }
            let record = match parse(row, raw) {
                Ok(r) => r,
                Err(e) => {
                    collector.warning(e);
                    continue;
                }
            };
            if let Err(e) = bounds(row, &record) {
                collector.error(e);
                continue;
            }
            out.push(record);
        }
        out
    }

    /// Reject formula-injection prefixes and oversized strings in any column
    fn check_security(&self, row: usize, raw: &RawRow) -> Result<()> {
        for (column, cell) in raw.iter() {
            let Some(text) = cell.as_text() else { continue };
            if text.starts_with(FORMULA_PREFIXES) {
                return Err(rejected(row, column, "value starts with a formula character"));
            }
            if text.chars().count() > self.limits.max_string_length {
                return Err(rejected(
                    row,
                    column,
                    &format!("value exceeds {} characters", self.limits.max_string_length),
                ));
            }
        }
        Ok(())
    }

    fn check_time(&self, row: usize, column: &str, time: f64) -> Result<()> {
        if !(0.0..=self.limits.max_time).contains(&time) {
            return Err(rejected(
                row,
                column,
                &format!("time {} outside [0, {}]", time, self.limits.max_time),
            ));
        }
        Ok(())
    }

    fn check_movement_bounds(&self, row: usize, record: &MovementRecord) -> Result<()> {
        self.check_time(row, "time", record.time)?;
        for (column, value) in [("x", record.x), ("y", record.y)] {
            if value.abs() > self.limits.max_coordinate {
                return Err(rejected(
                    row,
                    column,
                    &format!("coordinate {} exceeds ±{}", value, self.limits.max_coordinate),
                ));
            }
        }
        Ok(())
    }

    fn check_code_bounds(&self, row: usize, record: &CodeRecord) -> Result<()> {
        self.check_time(row, "start", record.start)?;
        self.check_time(row, "end", record.end)
    }
}

fn rejected(row: usize, column: &str, reason: &str) -> TrailError {
    TrailError::RowRejected { row, column: column.to_string(), reason: reason.to_string() }
}

fn number(row: usize, raw: &RawRow, column: &str) -> Result<f64> {
    let cell = raw.get(column);
    cell.as_number()
        .ok_or_else(|| {
            rejected(row, column, &format!("expected number, found {}", cell.type_name()))
        })
}

fn text(row: usize, raw: &RawRow, column: &str) -> Result<String> {
    let cell = raw.get(column);
    cell.as_text()
        .map(str::to_string)
        .ok_or_else(|| {
            rejected(row, column, &format!("expected string, found {}", cell.type_name()))
        })
}

fn parse_movement(row: usize, raw: &RawRow) -> Result<MovementRecord> {
    Ok(MovementRecord {
        time: number(row, raw, "time")?,
        x: number(row, raw, "x")?,
        y: number(row, raw, "y")?,
    })
}

fn parse_conversation(row: usize, raw: &RawRow) -> Result<SpeechRecord> {
    let time = number(row, raw, "time")?;
    let speaker = text(row, raw, "speaker")?;
    let cell = raw.get("talk");
    let talk = match cell {
        CellValue::Text(_) | CellValue::Number(_) | CellValue::Bool(_) => cell.to_string(),
        CellValue::Missing => {
            return Err(rejected(row, "talk", "expected talk text, found missing"))
        }
    };
    Ok(SpeechRecord { time, speaker, talk })
}

fn parse_multi_code(row: usize, raw: &RawRow) -> Result<CodeRecord> {
    Ok(CodeRecord {
        code: text(row, raw, "code")?,
        start: number(row, raw, "start")?,
        end: number(row, raw, "end")?,
    })
}

fn parse_single_code(row: usize, raw: &RawRow, label: &str) -> Result<CodeRecord> {
    Ok(CodeRecord {
        code: label.to_string(),
        start: number(row, raw, "start")?,
        end: number(row, raw, "end")?,
    })
}

/// Latitude/longitude column names, preferring the short form
fn gps_columns(table: &Table) -> Option<(&'static str, &'static str)> {
    if !table.has_column("time") {
        return None;
    }
    [("lat", "lng"), ("latitude", "longitude")]
        .into_iter()
        .find(|(lat, lng)| table.has_column(lat) && table.has_column(lng))
}

fn parse_gps(row: usize, raw: &RawRow, (lat_col, lng_col): (&str, &str)) -> Result<GpsRecord> {
    let time = number(row, raw, "time")?;
    let lat = number(row, raw, lat_col)?;
    let lng = number(row, raw, lng_col)?;
    if !GpsRecord::is_valid_coordinate(lat, lng) {
        return Err(rejected(row, lat_col, &format!("invalid GPS coordinate ({}, {})", lat, lng)));
    }
    Ok(GpsRecord { time, lat, lng })
}

fn is_movement_row(raw: &RawRow) -> bool {
    parse_movement(0, raw).is_ok()
}

fn is_conversation_row(raw: &RawRow) -> bool {
    parse_conversation(0, raw).is_ok()
}

fn is_single_code_row(raw: &RawRow) -> bool {
    number(0, raw, "start").is_ok() && number(0, raw, "end").is_ok()
}

fn is_multi_code_row(raw: &RawRow) -> bool {
    parse_multi_code(0, raw).is_ok()
}

#[derive(Debug, Default)]
struct IssueCollector {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    dropped_errors: usize,
    dropped_warnings: usize,
}

impl IssueCollector {
    fn error(&mut self, err: TrailError) {
        if self.errors.len() < MAX_REPORTED_ISSUES {
            self.errors.push(ValidationIssue::from_rejection(err));
        } else {
            self.dropped_errors += 1;
        }
    }

    fn warning(&mut self, err: TrailError) {
        if self.warnings.len() < MAX_REPORTED_ISSUES {
            self.warnings.push(ValidationIssue::from_rejection(err));
        } else {
            self.dropped_warnings += 1;
        }
    }

    fn finish(mut self) -> (Vec<ValidationIssue>, Vec<ValidationIssue>) {
        if self.dropped_errors > 0 {
            self.errors
                .push(ValidationIssue::file(format!(
                    "... and {} more rejected rows",
                    self.dropped_errors
                )));
        }
        if self.dropped_warnings > 0 {
            self.warnings.push(ValidationIssue::file(format!(
                "... and {} more rows with type mismatches",
                self.dropped_warnings
            )));
        }
        (self.errors, self.warnings)
    }
}
