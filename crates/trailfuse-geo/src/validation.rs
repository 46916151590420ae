//! GPS track cleaning.
//!
//! Every check here degrades by filtering or reporting; none of them fail an
//! import.

use geo::{Distance, Haversine, Point};
use serde::Serialize;
use trailfuse_core::config::GpsConfig;
use trailfuse_core::models::GpsRecord;

/// Finite, within WGS84 ranges and not exactly (0, 0)
pub fn is_valid_gps_point(lat: f64, lng: f64) -> bool {
    GpsRecord::is_valid_coordinate(lat, lng)
}

/// Findings of a track cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpsValidationReport {
    /// Points whose timestamp was earlier than their predecessor's
    pub out_of_order: usize,

    /// Consecutive equal timestamps with different coordinates
    pub duplicates: usize,

    /// Points dropped by the speed filter
    pub spikes_removed: usize,

    /// Largest time gap left after filtering, in seconds
    pub largest_gap: Option<f64>,

    pub warnings: Vec<String>,
}

/// Sort, deduplicate-report, spike-filter and gap-check a GPS track
pub fn validate_track(
    records: &[GpsRecord],
    config: &GpsConfig,
) -> (Vec<GpsRecord>, GpsValidationReport) {
    let mut report = GpsValidationReport::default();

    report.out_of_order = records.windows(2).filter(|w| w[1].time < w[0].time).count();
    if report.out_of_order > 0 {
        report
            .warnings
            .push(format!(
                "{} GPS points were out of time order and have been sorted",
                report.out_of_order
            ));
    }
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    report.duplicates = sorted
        .windows(2)
        .filter(|w| w[0].time == w[1].time && (w[0].lat != w[1].lat || w[0].lng != w[1].lng))
        .count();
    if report.duplicates > 0 {
        report.warnings.push(format!(
            "{} GPS points share a timestamp with a different position",
            report.duplicates
        ));
    }

    let kept = filter_spikes(&sorted, config.max_speed_kmh);
    report.spikes_removed = sorted.len() - kept.len();
    if report.spikes_removed > 0 {
        report.warnings.push(format!(
            "Removed {} GPS points implying more than {} km/h",
            report.spikes_removed, config.max_speed_kmh
        ));
    }

    report.largest_gap = kept.windows(2).map(|w| w[1].time - w[0].time).reduce(f64::max);
    if let Some(gap) = report.largest_gap.filter(|g| *g > config.gap_warning_secs) {
        report.warnings.push(format!("Largest gap between GPS points is {:.1} seconds", gap));
    }

    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
    (kept, report)
}

/// Greedy forward pass keeping points reachable from the last kept point
/// below `max_speed_kmh`
fn filter_spikes(sorted: &[GpsRecord], max_speed_kmh: f64) -> Vec<GpsRecord> {
    let mut kept: Vec<GpsRecord> = Vec::with_capacity(sorted.len());
    for record in sorted {
        let Some(last) = kept.last() else {
            kept.push(*record);
            continue;
        };
        let dt = record.time - last.time;
        if dt <= 0.0 {
            kept.push(*record);
            continue;
        }
        let meters = Haversine
            .distance(Point::new(last.lng, last.lat), Point::new(record.lng, record.lat));
        let speed_kmh = meters / dt * 3.6;
        if speed_kmh < max_speed_kmh {
            kept.push(*record);
        } else {
            tracing::debug!(time = record.time, speed_kmh, "Dropping GPS spike");
        }
    }
    kept
}
