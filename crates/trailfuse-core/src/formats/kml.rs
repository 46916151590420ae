//! KML track reader.
//!
//! Reads `<LineString><coordinates>` tuples (`lng,lat[,alt]`, no timestamps)
//! and `<gx:Track>` elements, whose `<when>` and `<gx:coord>` children pair up
//! in document order. When a file carries any timed track, only timed tracks
//! are used.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

use crate::error::{Result, TrailError};
use crate::formats::validation::FormatValidator;
use crate::formats::{
    parse_timestamp, table_name, track_table, FormatValidation, SourceReader, TrackPoint,
};
use crate::models::Table;

/// KML reader
pub struct KmlReader;

#[async_trait]
impl SourceReader for KmlReader {
    async fn read(&self, path: &Path) -> Result<Table> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_str(&table_name(path), &content)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["kml"]
    }

    fn format_name(&self) -> &str {
        "KML"
    }

    async fn validate(&self, path: &Path) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(path);
        if !validation.is_valid() {
            return Ok(validation);
        }
        Ok(FormatValidator::merge_validations(vec![
            validation,
            FormatValidator::validate_xml_structure(path),
        ]))
    }
}

#[derive(Default)]
struct TrackBuffer {
    whens: Vec<Option<chrono::DateTime<chrono::Utc>>>,
    coords: Vec<(f64, f64)>,
}

impl KmlReader {
    /// Parse KML text into a GPS movement table
    pub fn parse_str(name: &str, content: &str) -> Result<Table> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut line_points: Vec<TrackPoint> = Vec::new();
        let mut timed_points: Vec<TrackPoint> = Vec::new();
        let mut track = TrackBuffer::default();
        let mut skipped = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                Ok(Event::End(e)) => {
                    if is_track(e.name().as_ref()) {
                        flush_track(name, &mut track, &mut timed_points);
                    }
                    stack.pop();
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| kml_error(e.to_string()))?;
                    match stack.last().map(String::as_str) {
                        Some("coordinates") if stack.iter().any(|s| s == "LineString") => {
                            for tuple in text.split_whitespace() {
                                match parse_tuple(tuple, ',') {
                                    Some((lng, lat)) => {
                                        line_points.push(TrackPoint { timestamp: None, lat, lng })
                                    }
                                    None => skipped += 1,
                                }
                            }
                        }
                        Some("when") => track.whens.push(parse_timestamp(&text)),
                        Some("gx:coord") | Some("coord") => match parse_tuple(&text, ' ') {
                            Some(coord) => track.coords.push(coord),
                            None => skipped += 1,
                        },
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(kml_error(format!(
                        "Failed to parse KML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if skipped > 0 {
            tracing::warn!(table = name, skipped, "Skipped malformed KML coordinates");
        }
        let points = if timed_points.is_empty() { line_points } else { timed_points };
        Ok(track_table(name, &points))
    }
}

fn is_track(name: &[u8]) -> bool {
    name == b"gx:Track" || name == b"Track"
}

fn flush_track(name: &str, track: &mut TrackBuffer, out: &mut Vec<TrackPoint>) {
    let buffer = std::mem::take(track);
    if buffer.whens.len() != buffer.coords.len() {
        tracing::warn!(
            table = name,
            whens = buffer.whens.len(),
            coords = buffer.coords.len(),
            "gx:Track has unequal <when> and <gx:coord> counts; extra entries dropped"
        );
    }
    out.extend(
        buffer
            .whens
            .into_iter()
            .zip(buffer.coords)
            .map(|(timestamp, (lng, lat))| TrackPoint { timestamp, lat, lng }),
    );
}

/// Parse `lng<sep>lat[<sep>alt]`
fn parse_tuple(raw: &str, separator: char) -> Option<(f64, f64)> {
    let mut parts = raw.trim().split(separator).filter(|p| !p.is_empty());
    let lng = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    Some((lng, lat))
}

fn kml_error(reason: String) -> TrailError {
    TrailError::FormatValidation { format: "KML".to_string(), reason }
}
