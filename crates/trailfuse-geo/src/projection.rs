//! Web Mercator projection into a normalized square

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use trailfuse_core::models::GpsRecord;

/// Latitude limit of the Mercator domain
pub const MAX_MERCATOR_LAT: f64 = 85.0;

/// Total span synthesized on an axis whose points all share one value
pub const MIN_SPAN_DEGREES: f64 = 0.001;

/// Mercator Y in [0, 1], 0 at the north edge
pub fn lat_to_mercator_y(lat: f64) -> f64 {
    0.5 - (PI / 4.0 + lat * PI / 360.0).tan().ln() / (2.0 * PI)
}

/// Mercator X in [0, 1]
pub fn lng_to_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0
}

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    /// `minLng,minLat,maxLng,maxLat`, the form static map providers expect
    pub fn bbox_string(&self) -> String {
        format!("{},{},{},{}", self.min_lng, self.min_lat, self.max_lng, self.max_lat)
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

/// Bounds of all points, padded by `padding_percent` of the span on each side.
///
/// Returns `None` for an empty slice.
pub fn calculate_bounds(points: &[GpsRecord], padding_percent: f64) -> Option<GeoBounds> {
    let first = points.first()?;
    let mut bounds = GeoBounds {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lng: first.lng,
        max_lng: first.lng,
    };
    for p in &points[1..] {
        bounds.min_lat = bounds.min_lat.min(p.lat);
        bounds.max_lat = bounds.max_lat.max(p.lat);
        bounds.min_lng = bounds.min_lng.min(p.lng);
        bounds.max_lng = bounds.max_lng.max(p.lng);
    }

    let (min_lat, max_lat) = pad_axis(bounds.min_lat, bounds.max_lat, padding_percent);
    let (min_lng, max_lng) = pad_axis(bounds.min_lng, bounds.max_lng, padding_percent);

    Some(GeoBounds {
        min_lat: min_lat.max(-MAX_MERCATOR_LAT),
        max_lat: max_lat.min(MAX_MERCATOR_LAT),
        min_lng: min_lng.max(-180.0),
        max_lng: max_lng.min(180.0),
    })
}

fn pad_axis(min: f64, max: f64, padding_percent: f64) -> (f64, f64) {
    let (min, max) = if max - min <= 0.0 {
        (min - MIN_SPAN_DEGREES / 2.0, max + MIN_SPAN_DEGREES / 2.0)
    } else {
        (min, max)
    };
    let pad = (max - min) * padding_percent / 100.0;
    (min - pad, max + pad)
}

/// Project a coordinate into `[0, size] x [0, size]`; the north edge maps to y = 0
pub fn to_pixels(lat: f64, lng: f64, bounds: &GeoBounds, size: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);

    let x_min = lng_to_x(bounds.min_lng);
    let x_span = lng_to_x(bounds.max_lng) - x_min;
    let y_top = lat_to_mercator_y(bounds.max_lat);
    let y_span = lat_to_mercator_y(bounds.min_lat) - y_top;

    let x = if x_span > 0.0 { (lng_to_x(lng) - x_min) / x_span * size } else { size / 2.0 };
    let y = if y_span > 0.0 {
        (lat_to_mercator_y(lat) - y_top) / y_span * size
    } else {
        size / 2.0
    };

    (x.clamp(0.0, size), y.clamp(0.0, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gps(lat: f64, lng: f64) -> GpsRecord {
        GpsRecord::new(0.0, lat, lng)
    }

    #[test]
    fn test_mercator_reference_values() {
        assert!((lat_to_mercator_y(0.0) - 0.5).abs() < 1e-12);
        assert!(lat_to_mercator_y(60.0) < 0.5);
        assert!(lat_to_mercator_y(-60.0) > 0.5);
        assert_eq!(lng_to_x(-180.0), 0.0);
        assert_eq!(lng_to_x(0.0), 0.5);
        assert_eq!(lng_to_x(180.0), 1.0);
    }

    #[test]
    fn test_single_point_bounds_not_degenerate() {
        let bounds = calculate_bounds(&[gps(10.0, 10.0)], 10.0).unwrap();
        assert!(bounds.min_lat < 10.0 && bounds.max_lat > 10.0);
        assert!(bounds.min_lng < 10.0 && bounds.max_lng > 10.0);
        assert!(bounds.max_lat - bounds.min_lat >= MIN_SPAN_DEGREES);
    }

    #[test]
    fn test_bounds_padding_and_clamp() {
        let bounds = calculate_bounds(&[gps(0.0, 0.0), gps(10.0, 20.0)], 10.0).unwrap();
        assert!((bounds.min_lat + 1.0).abs() < 1e-9);
        assert!((bounds.max_lat - 11.0).abs() < 1e-9);
        assert!((bounds.max_lng - 22.0).abs() < 1e-9);

        let polar = calculate_bounds(&[gps(-84.0, -179.0), gps(84.0, 179.0)], 50.0).unwrap();
        assert_eq!(polar.max_lat, MAX_MERCATOR_LAT);
        assert_eq!(polar.min_lat, -MAX_MERCATOR_LAT);
        assert_eq!(polar.min_lng, -180.0);

        assert!(calculate_bounds(&[], 10.0).is_none());
    }

    #[test]
    fn test_pixels_invert_y() {
        let bounds = GeoBounds { min_lat: 0.0, max_lat: 10.0, min_lng: 0.0, max_lng: 10.0 };
        let (x, y) = to_pixels(10.0, 0.0, &bounds, 1000.0);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
        let (x, y) = to_pixels(0.0, 10.0, &bounds, 1000.0);
        assert!((x - 1000.0).abs() < 1e-9 && (y - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_bbox_string_order() {
        let bounds = GeoBounds { min_lat: 1.0, max_lat: 2.0, min_lng: 3.0, max_lng: 4.0 };
        assert_eq!(bounds.bbox_string(), "3,1,4,2");
    }

    proptest! {
        #[test]
        fn prop_pixels_stay_in_square(
            pts in prop::collection::vec((-80.0f64..80.0, -179.0f64..179.0), 1..20),
            lat in -90.0f64..90.0,
            lng in -180.0f64..180.0,
        ) {
            let records: Vec<GpsRecord> = pts.iter().map(|&(la, ln)| gps(la, ln)).collect();
            let bounds = calculate_bounds(&records, 10.0).unwrap();
            let (x, y) = to_pixels(lat, lng, &bounds, 1000.0);
            prop_assert!((0.0..=1000.0).contains(&x));
            prop_assert!((0.0..=1000.0).contains(&y));
        }
    }
}
