//! Source readers that turn files into [`Table`]s.
//!
//! Each format implements [`SourceReader`]; the [`FormatRegistry`] picks a
//! reader by file extension. File reads are the async boundary of the
//! pipeline; everything downstream is synchronous.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::error::{Result, TrailError};
use crate::models::{RawRow, Table};

pub mod csv;
pub mod gpx;
pub mod kml;
pub mod validation;

pub use self::csv::CsvReader;
pub use self::gpx::GpxReader;
pub use self::kml::KmlReader;

use self::validation::FormatValidator;

/// Columns produced by track readers
pub const TRACK_COLUMNS: &[&str] = &["time", "lat", "lng"];

/// Reader trait that all source formats implement
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Read a table from the given path
    async fn read(&self, path: &Path) -> Result<Table>;

    /// Supported file extensions (e.g., ["csv"])
    fn supported_extensions(&self) -> &[&str];

    /// Human-readable format name (e.g., "CSV", "GPX")
    fn format_name(&self) -> &str;

    /// Validate file structure without a full read
    async fn validate(&self, _path: &Path) -> Result<FormatValidation> {
        Ok(FormatValidation::default())
    }
}

/// Result of format validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormatValidation {
    /// Problems that prevent reading
    pub errors: Vec<String>,

    /// Problems that don't prevent reading
    pub warnings: Vec<String>,
}

impl FormatValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A table read from disk along with the reader's non-fatal findings
#[derive(Debug)]
pub struct SourceTable {
    pub table: Table,
    pub format: String,
    pub warnings: Vec<String>,
}

/// Registry of source readers keyed by extension
pub struct FormatRegistry {
    readers: Vec<Box<dyn SourceReader>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with the CSV, GPX and KML readers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CsvReader));
        registry.register(Box::new(GpxReader));
        registry.register(Box::new(KmlReader));
        registry
    }

    pub fn register(&mut self, reader: Box<dyn SourceReader>) {
        self.readers.push(reader);
    }

    /// Reader for the file's extension (case-insensitive)
    pub fn detect_format(&self, path: &Path) -> Result<&dyn SourceReader> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| TrailError::UnsupportedFormat {
                extension: "none".to_string(),
                supported: self.supported_formats(),
            })?;

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| TrailError::UnsupportedFormat {
                extension,
                supported: self.supported_formats(),
            })
    }

    /// Detect the format, run the reader's file checks and read the file
    pub async fn read(&self, path: &Path) -> Result<SourceTable> {
        let reader = self.detect_format(path)?;
        let validation = reader.validate(path).await?;
        FormatValidator::validation_to_result(&validation, reader.format_name())?;

        tracing::debug!(path = %path.display(), format = reader.format_name(), "Reading source");
        let table = reader.read(path).await?;
        Ok(SourceTable {
            table,
            format: reader.format_name().to_string(),
            warnings: validation.warnings,
        })
    }

    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A track point before time normalization
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub lat: f64,
    pub lng: f64,
}

/// Build a GPS movement table from track points.
///
/// Times are relative to the earliest timestamp when every point carries
/// one; otherwise points get sequential synthetic seconds.
pub fn track_table(name: &str, points: &[TrackPoint]) -> Table {
    let mut table = Table::new(name, TRACK_COLUMNS);
    let earliest = points
        .iter()
        .map(|p| p.timestamp)
        .collect::<Option<Vec<_>>>()
        .and_then(|stamps| stamps.into_iter().min());

    for (idx, point) in points.iter().enumerate() {
        let time = match (earliest, point.timestamp) {
            (Some(start), Some(at)) => (at - start).num_milliseconds() as f64 / 1000.0,
            _ => idx as f64,
        };
        let mut row = RawRow::new();
        row.insert("time", time);
        row.insert("lat", point.lat);
        row.insert("lng", point.lng);
        table.push_row(row);
    }

    if earliest.is_none() && !points.is_empty() {
        tracing::debug!(table = name, "Track has no complete timestamps; using sequential time");
    }
    table
}

/// File stem used as table name
pub(crate) fn table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

/// Parse an RFC 3339 timestamp into UTC
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
