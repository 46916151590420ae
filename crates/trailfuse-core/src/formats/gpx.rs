use async_trait::async_trait;
use std::path::Path;

use crate::error::{Result, TrailError};
use crate::formats::validation::FormatValidator;
use crate::formats::{
    parse_timestamp, table_name, track_table, FormatValidation, SourceReader, TrackPoint,
};
use crate::models::Table;

/// GPX reader; every `<trkpt>` of every track segment becomes a GPS row
pub struct GpxReader;

#[async_trait]
impl SourceReader for GpxReader {
    async fn read(&self, path: &Path) -> Result<Table> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_str(&table_name(path), &content)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["gpx"]
    }

    fn format_name(&self) -> &str {
        "GPX"
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let mut validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let xml_validation = FormatValidator::validate_xml_structure(path);
        if xml_validation.is_valid() {
            match std::fs::read_to_string(path) {
                Ok(content) => match ::gpx::read(content.as_bytes()) {
                    Ok(parsed) if parsed.tracks.is_empty() => {
                        validation.warnings.push("GPX file has no tracks".to_string());
                    }
                    Ok(_) => {}
                    Err(e) => validation.errors.push(format!("Invalid GPX: {}", e)),
                },
                Err(e) => validation.errors.push(format!("Cannot read file: {}", e)),
            }
        }

        Ok(FormatValidator::merge_validations(vec![validation, xml_validation]))
    }
}

impl GpxReader {
    /// Parse GPX text into a GPS movement table
    pub fn parse_str(name: &str, content: &str) -> Result<Table> {
        let parsed = ::gpx::read(content.as_bytes()).map_err(|e| TrailError::FormatValidation {
            format: "GPX".to_string(),
            reason: format!("Failed to parse GPX: {}", e),
        })?;

        let points: Vec<TrackPoint> = parsed
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
            .map(|waypoint| {
                let timestamp = waypoint
                    .time
                    .as_ref()
                    .and_then(|t| t.format().ok())
                    .and_then(|raw| parse_timestamp(&raw));
                let point = waypoint.point();
                TrackPoint { timestamp, lat: point.y(), lng: point.x() }
            })
            .collect();

        if points.is_empty() {
            tracing::warn!(table = name, "GPX file contains no track points");
        }
        Ok(track_table(name, &points))
    }
}
