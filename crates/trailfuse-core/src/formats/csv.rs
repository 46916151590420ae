use async_trait::async_trait;
use std::path::Path;

use crate::error::{Result, TrailError};
use crate::formats::validation::FormatValidator;
use crate::formats::{table_name, FormatValidation, SourceReader};
use crate::models::{CellValue, RawRow, Table};

/// CSV reader; cells are typed with [`CellValue::parse`]
pub struct CsvReader;

#[async_trait]
impl SourceReader for CsvReader {
    async fn read(&self, path: &Path) -> Result<Table> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_str(&table_name(path), &content)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn format_name(&self) -> &str {
        "CSV"
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }
        Ok(FormatValidator::merge_validations(vec![
            validation,
            FormatValidator::validate_utf8(path),
        ]))
    }
}

impl CsvReader {
    /// Parse CSV text with a header row into a table named `name`
    pub fn parse_str(name: &str, content: &str) -> Result<Table> {
        let mut reader = ::csv::ReaderBuilder::new()
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(&e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        let mut table = Table::new(name, &header_refs);

        for record in reader.records() {
            let record = record.map_err(|e| csv_error(&e))?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            let mut row = RawRow::new();
            for (column, field) in headers.iter().zip(record.iter()) {
                row.insert(column, CellValue::parse(field));
            }
            table.push_row(row);
        }

        tracing::debug!(table = name, columns = ?table.columns, rows = table.len(), "Parsed CSV");
        Ok(table)
    }
}

fn csv_error(e: &::csv::Error) -> TrailError {
    TrailError::FormatError {
        format: "CSV".to_string(),
        message: e.to_string(),
    }
}
