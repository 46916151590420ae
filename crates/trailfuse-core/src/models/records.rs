//! Typed records emitted by schema validation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub time: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecord {
    pub time: f64,
    pub speaker: String,
    pub talk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRecord {
    pub code: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsRecord {
    pub time: f64,
    pub lat: f64,
    pub lng: f64,
}

impl GpsRecord {
    pub fn new(time: f64, lat: f64, lng: f64) -> Self {
        Self { time, lat, lng }
    }

    /// Finite, within WGS84 ranges and not the (0, 0) null island
    pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
        lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng)
            && !(lat == 0.0 && lng == 0.0)
    }
}

/// One interval during which a code label is active
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodeInterval {
    pub start: f64,
    pub end: f64,
}

impl From<&CodeRecord> for CodeInterval {
    fn from(record: &CodeRecord) -> Self {
        Self { start: record.start, end: record.end }
    }
}
