//! Inspect command: format, schema, time format and row validation of one file

use crate::cli::InspectArgs;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use serde::Serialize;
use trailfuse_core::formats::FormatRegistry;
use trailfuse_core::schema::{FileType, SchemaValidator, ValidationReport};
use trailfuse_core::time::{NormalizationReport, TimeNormalizer};

#[derive(Debug, Serialize)]
struct InspectOutput {
    file: String,
    format: String,
    name: String,
    columns: Vec<String>,
    rows: usize,
    time: Option<NormalizationReport>,
    time_error: Option<String>,
    validation: ValidationReport,
}

pub async fn execute(args: InspectArgs, output: &OutputWriter) -> Result<()> {
    let registry = FormatRegistry::with_defaults();
    let source = registry
        .read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    for warning in &source.warnings {
        output.warning(warning);
    }
    let mut table = source.table;

    let normalizer = TimeNormalizer::for_table(&table);
    let (time, time_error) = if normalizer.columns().is_empty() {
        (None, None)
    } else {
        match normalizer.normalize(&mut table) {
            Ok(report) => (Some(report), None),
            Err(e) => (None, Some(e.to_string())),
        }
    };
    let validation = SchemaValidator::default().validate(&table).report;

    let result = InspectOutput {
        file: args.file.display().to_string(),
        format: source.format,
        name: table.name.clone(),
        columns: table.columns.clone(),
        rows: table.len(),
        time,
        time_error,
        validation,
    };

    if output.is_json() {
        return output.result(result);
    }

    output.section(format!("{} ({})", result.file, result.format));
    output.kv("Name", &result.name);
    output.kv("Columns", result.columns.join(", "));
    output.kv("Rows", result.rows);
    match (&result.time, &result.time_error) {
        (Some(time), _) => {
            output.kv("Time format", time.format);
            if time.baseline != 0.0 {
                output.kv("Baseline", format!("{} s", time.baseline));
            }
            for warning in &time.warnings {
                output.warning(warning);
            }
        }
        (None, Some(error)) => output.error(error),
        (None, None) => output.kv("Time format", "(no time columns)"),
    }

    let report = &result.validation;
    output.kv("Schema", report.file_type);
    output.kv(
        "Valid rows",
        format!(
            "{} of {} ({} rejected)",
            report.stats.valid_rows, report.stats.total_rows, report.stats.rejected_rows
        ),
    );
    for issue in &report.errors {
        output.error(issue);
    }
    for issue in &report.warnings {
        output.warning(issue);
    }

    if report.is_valid && result.time_error.is_none() {
        output.success(format!("Ready to import as {}", report.file_type));
    } else if report.file_type == FileType::Unknown {
        output.info("Rename columns to one of the expected schemas to import this file");
    }
    Ok(())
}
