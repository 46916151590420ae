//! GPS track to planar movement conversion

use serde::Serialize;
use trailfuse_core::config::GpsConfig;
use trailfuse_core::models::{GpsRecord, MovementRecord};

use crate::projection::{calculate_bounds, to_pixels, GeoBounds};
use crate::validation::{validate_track, GpsValidationReport};

/// A cleaned GPS track projected into the normalized square
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedTrack {
    #[serde(skip)]
    pub records: Vec<MovementRecord>,

    /// Bounds of the accepted points, used for the map background
    pub bounds: GeoBounds,

    pub report: GpsValidationReport,
}

impl ProjectedTrack {
    pub fn bbox(&self) -> String {
        self.bounds.bbox_string()
    }
}

/// Clean a GPS track and project it to movement records.
///
/// Returns `None` when no point survives cleaning.
pub fn project_track(records: &[GpsRecord], config: &GpsConfig) -> Option<ProjectedTrack> {
    let (kept, report) = validate_track(records, config);
    let bounds = calculate_bounds(&kept, config.padding_percent)?;
    let projected = project_with_bounds(&kept, &bounds, config.normalized_size);

    tracing::debug!(points = projected.len(), bbox = %bounds.bbox_string(), "Projected GPS track");
    Some(ProjectedTrack { records: projected, bounds, report })
}

/// Project already-cleaned records into a shared frame
pub fn project_with_bounds(
    records: &[GpsRecord],
    bounds: &GeoBounds,
    size: f64,
) -> Vec<MovementRecord> {
    records
        .iter()
        .map(|r| {
            let (x, y) = to_pixels(r.lat, r.lng, bounds, size);
            MovementRecord { time: r.time, x, y }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_keeps_time_and_fits_square() {
        let track = [
            GpsRecord::new(0.0, 47.6445, -122.3269),
            GpsRecord::new(5.0, 47.6446, -122.3268),
            GpsRecord::new(10.0, 47.6447, -122.3267),
        ];
        let config = GpsConfig::default();
        let projected = project_track(&track, &config).unwrap();

        assert_eq!(projected.records.len(), 3);
        assert_eq!(projected.records[2].time, 10.0);
        for r in &projected.records {
            assert!((0.0..=config.normalized_size).contains(&r.x));
            assert!((0.0..=config.normalized_size).contains(&r.y));
        }
        // Moving north-east: x grows, y shrinks
        assert!(projected.records[2].x > projected.records[0].x);
        assert!(projected.records[2].y < projected.records[0].y);
        assert!(projected.bounds.contains(47.6446, -122.3268));
    }

    #[test]
    fn test_shared_frame_keeps_tracks_comparable() {
        let a = [GpsRecord::new(0.0, 10.0, 10.0)];
        let b = [GpsRecord::new(0.0, 10.0, 10.0)];
        let bounds = GeoBounds { min_lat: 9.0, max_lat: 11.0, min_lng: 9.0, max_lng: 11.0 };
        assert_eq!(
            project_with_bounds(&a, &bounds, 100.0),
            project_with_bounds(&b, &bounds, 100.0)
        );
        assert!((project_with_bounds(&a, &bounds, 100.0)[0].x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_track() {
        assert!(project_track(&[], &GpsConfig::default()).is_none());
    }
}
