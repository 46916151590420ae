//! Feature-preserving trail simplification for playback.
//!
//! Pass 1 decimates a fused trail while keeping every point that carries
//! meaning (speech, code changes, stop transitions, real displacement). Pass 2
//! fills long time gaps between moving points with linearly interpolated
//! points so playback stays smooth.

pub mod playback;

use crate::models::{DataPoint, Position};
use serde::{Deserialize, Serialize};

pub use playback::{find_closest_point_at_time, interpolate_position_at_time};

/// Smallest accepted spacing of synthesized points, in seconds
pub const MIN_INTERPOLATION_THRESHOLD: f64 = 0.001;

/// Upper bound on synthesized points between one kept pair
pub const MAX_INTERPOLATED_PER_GAP: usize = 10_000;

/// Simplifier tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifyConfig {
    /// Minimum displacement from the last kept point for a plain movement point
    pub min_distance: f64,

    /// Gaps longer than this (seconds) are filled by interpolation
    pub max_time_gap: f64,

    /// Spacing (seconds) of synthesized points
    pub interpolation_threshold: f64,

    /// Index interval for sampling inside an unchanged code run (aggressive mode)
    pub code_sampling_interval: usize,

    /// Index interval for sampling inside a stationary run
    pub stop_sampling_interval: usize,

    /// Drop repeated speech and sample long code runs
    pub aggressive: bool,

    /// Always keep the first point of a stop and the first point after it
    pub preserve_stops: bool,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            min_distance: 5.0,
            max_time_gap: 2.0,
            interpolation_threshold: 1.0,
            code_sampling_interval: 10,
            stop_sampling_interval: 10,
            aggressive: false,
            preserve_stops: true,
        }
    }
}

/// Counts describing what a simplification kept and why
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplificationStats {
    pub original: usize,
    pub optimized: usize,
    pub reduction_percent: f64,
    pub speech: usize,
    pub codes: usize,
    pub stops: usize,
    pub movement: usize,

    /// Kept pairs whose time gap was filled
    pub temporal: usize,

    /// Synthesized points
    pub interpolated: usize,
}

/// A simplified trail tagged with the source trail it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedTrail {
    pub points: Vec<DataPoint>,
    pub stats: SimplificationStats,
    pub revision: u64,
    pub source_len: usize,
    pub config: SimplifyConfig,
}

impl SimplifiedTrail {
    pub fn build(trail: &[DataPoint], revision: u64, config: SimplifyConfig) -> Self {
        let (points, stats) = simplify_trail(trail, &config);
        Self { points, stats, revision, source_len: trail.len(), config }
    }

    pub fn closest_point_at(&self, time: f64) -> Option<&DataPoint> {
        find_closest_point_at_time(&self.points, time)
    }

    pub fn position_at(&self, time: f64) -> Option<Position> {
        interpolate_position_at_time(&self.points, time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeepReason {
    Speech,
    Codes,
    Stop,
    Movement,
}

/// Simplify a time-sorted trail
pub fn simplify_trail(
    trail: &[DataPoint],
    config: &SimplifyConfig,
) -> (Vec<DataPoint>, SimplificationStats) {
    let mut stats = SimplificationStats { original: trail.len(), ..Default::default() };
    let decimated = decimate(trail, config, &mut stats);
    let points = fill_gaps(decimated, config, &mut stats);

    stats.optimized = points.len();
    stats.reduction_percent = if stats.original == 0 {
        0.0
    } else {
        (stats.original as f64 - stats.optimized as f64) / stats.original as f64 * 100.0
    };
    tracing::debug!(
        original = stats.original,
        optimized = stats.optimized,
        interpolated = stats.interpolated,
        "Simplified trail"
    );
    (points, stats)
}

fn same_position(a: &DataPoint, b: &DataPoint) -> bool {
    match (&a.position, &b.position) {
        (Some(pa), Some(pb)) => pa.same_as(pb),
        _ => false,
    }
}

fn decimate(
    trail: &[DataPoint],
    config: &SimplifyConfig,
    stats: &mut SimplificationStats,
) -> Vec<DataPoint> {
    if trail.len() <= 2 {
        return trail.to_vec();
    }

    let last = trail.len() - 1;
    let mut kept = vec![trail[0].clone()];
    let mut code_run_start = 0;
    let mut stop_run_start = 0;

    for i in 1..last {
        let point = &trail[i];
        let prev = &trail[i - 1];
        if point.codes != prev.codes {
            code_run_start = i;
        }
        let in_stop = same_position(point, prev);
        if !in_stop {
            stop_run_start = i;
        }

        let last_kept = &kept[kept.len() - 1];
        let reason = keep_reason(trail, i, last_kept, config, code_run_start, stop_run_start);
        if let Some(reason) = reason {
            match reason {
                KeepReason::Speech => stats.speech += 1,
                KeepReason::Codes => stats.codes += 1,
                KeepReason::Stop => stats.stops += 1,
                KeepReason::Movement => stats.movement += 1,
            }
            kept.push(point.clone());
        }
    }

    kept.push(trail[last].clone());
    kept
}

/// First rule that fires for `trail[i]`, in priority order
fn keep_reason(
    trail: &[DataPoint],
    i: usize,
    last_kept: &DataPoint,
    config: &SimplifyConfig,
    code_run_start: usize,
    stop_run_start: usize,
) -> Option<KeepReason> {
    let point = &trail[i];

    if point.has_speech() && (!config.aggressive || point.speech != last_kept.speech) {
        return Some(KeepReason::Speech);
    }

    if point.codes != last_kept.codes {
        return Some(KeepReason::Codes);
    }
    if config.aggressive && !point.codes.is_empty() && config.code_sampling_interval > 0 {
        let offset = i - code_run_start;
        if offset > 0 && offset % config.code_sampling_interval == 0 {
            return Some(KeepReason::Codes);
        }
    }

    let prev = &trail[i - 1];
    let in_stop = same_position(point, prev);
    if config.preserve_stops {
        let starts_run = !in_stop && same_position(point, &trail[i + 1]);
        let ends_run = !in_stop && i >= 2 && same_position(prev, &trail[i - 2]);
        if starts_run || ends_run {
            return Some(KeepReason::Stop);
        }
    }
    if in_stop && config.stop_sampling_interval > 0 {
        let offset = i - stop_run_start;
        if offset > 0 && offset % config.stop_sampling_interval == 0 {
            return Some(KeepReason::Stop);
        }
    }

    match (&point.position, &last_kept.position) {
        (Some(p), Some(k)) if p.distance_to(k) > config.min_distance => Some(KeepReason::Movement),
        _ => None,
    }
}

fn fill_gaps(
    kept: Vec<DataPoint>,
    config: &SimplifyConfig,
    stats: &mut SimplificationStats,
) -> Vec<DataPoint> {
    if kept.len() < 2 || config.interpolation_threshold <= 0.0 {
        return kept;
    }

    let mut out = Vec::with_capacity(kept.len());
    for pair in kept.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        out.push(a.clone());

        let gap = b.time - a.time;
        if gap <= config.max_time_gap || a.is_stopped() || b.is_stopped() {
            continue;
        }
        let (Some(pa), Some(pb)) = (a.position, b.position) else {
            continue;
        };
        let count = ((gap / config.interpolation_threshold).floor() - 1.0)
            .min(MAX_INTERPOLATED_PER_GAP as f64);
        if count < 1.0 {
            continue;
        }
        let count = count as usize;

        stats.temporal += 1;
        let steps = count as f64 + 1.0;
        for k in 1..=count {
            let fraction = k as f64 / steps;
            let mut point = DataPoint::movement(
                a.time + gap * fraction,
                pa.x + (pb.x - pa.x) * fraction,
                pa.y + (pb.y - pa.y) * fraction,
            );
            point.interpolated = true;
            out.push(point);
            stats.interpolated += 1;
        }
    }
    if let Some(last) = kept.last() {
        out.push(last.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::compute_stop_lengths;
    use proptest::prelude::*;

    fn trail(points: &[(f64, f64, f64)]) -> Vec<DataPoint> {
        let mut trail: Vec<DataPoint> =
            points.iter().map(|&(t, x, y)| DataPoint::movement(t, x, y)).collect();
        compute_stop_lengths(&mut trail);
        trail
    }

    fn no_gaps() -> SimplifyConfig {
        SimplifyConfig { min_distance: 1.0, max_time_gap: 1_000.0, ..Default::default() }
    }

    #[test]
    fn test_interpolation_capped_per_gap() {
        let input = trail(&[(0.0, 0.0, 0.0), (10.0, 100.0, 0.0)]);
        let config =
            SimplifyConfig { interpolation_threshold: 1e-300, max_time_gap: 2.0, ..no_gaps() };
        let (points, stats) = simplify_trail(&input, &config);

        assert_eq!(stats.interpolated, MAX_INTERPOLATED_PER_GAP);
        assert_eq!(points.len(), MAX_INTERPOLATED_PER_GAP + 2);
        assert!(points.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_zero_displacement_point_dropped() {
        let input = trail(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 5.0, 5.0)]);
        let (points, stats) = simplify_trail(&input, &no_gaps());

        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 2.0]);
        assert_eq!(stats.original, 3);
        assert_eq!(stats.optimized, 2);
    }

    #[test]
    fn test_speech_and_code_changes_kept() {
        let mut input = trail(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.1, 0.0),
            (2.0, 0.2, 0.0),
            (3.0, 0.3, 0.0),
            (4.0, 0.4, 0.0),
        ]);
        input[1].speech = "hi".into();
        input[3].codes.insert("group".into());

        let (points, stats) = simplify_trail(&input, &no_gaps());
        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 3.0, 4.0]);
        assert_eq!(stats.speech, 1);
        assert_eq!(stats.codes, 1);
    }

    #[test]
    fn test_aggressive_drops_repeated_speech() {
        let mut input =
            trail(&[(0.0, 0.0, 0.0), (1.0, 0.1, 0.0), (2.0, 0.2, 0.0), (3.0, 0.3, 0.0)]);
        input[1].speech = "same".into();
        input[2].speech = "same".into();

        let aggressive = SimplifyConfig { aggressive: true, ..no_gaps() };
        let (points, _) = simplify_trail(&input, &aggressive);
        assert_eq!(points.len(), 3);

        let (points, _) = simplify_trail(&input, &no_gaps());
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn test_stop_transitions_kept() {
        let input = trail(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.5, 0.0),
            (2.0, 0.5, 0.0),
            (3.0, 0.5, 0.0),
            (4.0, 0.9, 0.0),
            (5.0, 1.2, 0.0),
            (6.0, 1.4, 0.0),
        ]);
        let (points, stats) = simplify_trail(&input, &no_gaps());
        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 4.0, 6.0]);
        assert_eq!(stats.stops, 2);

        let loose = SimplifyConfig { preserve_stops: false, ..no_gaps() };
        let (points, _) = simplify_trail(&input, &loose);
        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 5.0, 6.0]);
    }

    #[test]
    fn test_gap_interpolation() {
        let input = trail(&[(0.0, 0.0, 0.0), (4.0, 40.0, 0.0)]);
        let config = SimplifyConfig {
            max_time_gap: 2.0,
            interpolation_threshold: 1.0,
            ..Default::default()
        };
        let (points, stats) = simplify_trail(&input, &config);

        assert_eq!(points.len(), 5);
        assert_eq!(stats.temporal, 1);
        assert_eq!(stats.interpolated, 3);
        let xs: Vec<f64> = points.iter().map(|p| p.position.unwrap().x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert!(points[1..4]
            .iter()
            .all(|p| p.interpolated && p.codes.is_empty() && !p.has_speech()));
    }

    #[test]
    fn test_no_interpolation_into_stop() {
        let input =
            trail(&[(0.0, 0.0, 0.0), (1.0, 9.0, 9.0), (10.0, 9.0, 9.0), (20.0, 50.0, 50.0)]);
        let config = SimplifyConfig {
            max_time_gap: 2.0,
            interpolation_threshold: 1.0,
            stop_sampling_interval: 1,
            ..Default::default()
        };
        let (points, stats) = simplify_trail(&input, &config);

        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 10.0, 20.0]);
        assert!(points[2].is_stopped());
        assert_eq!(stats.interpolated, 0);
    }

    #[test]
    fn test_actor_cache_invalidated_by_mutation() {
        use crate::fusion::FusionContext;
        use crate::models::MovementRecord;

        let mut ctx = FusionContext::default();
        let rows = [
            MovementRecord { time: 0.0, x: 0.0, y: 0.0 },
            MovementRecord { time: 1.0, x: 9.0, y: 9.0 },
        ];
        ctx.import_movement("ana", &rows, 2);

        let config = SimplifyConfig::default();
        let actor = ctx.actor_mut("ana").unwrap();
        let first = actor.simplify(&config).clone();
        assert!(actor.simplified().is_some());
        assert_eq!(first.source_len, 2);

        ctx.import_movement("ana", &rows[..1], 1);
        assert!(ctx.actor("ana").unwrap().simplified().is_none());
    }

    proptest! {
        #[test]
        fn prop_endpoints_always_kept(
            steps in prop::collection::vec((0.1f64..5.0, -3i32..3, -3i32..3), 1..60),
            min_distance in 0.0f64..10.0,
        ) {
            let mut t = 0.0;
            let raw: Vec<(f64, f64, f64)> = steps
                .iter()
                .map(|&(dt, x, y)| { t += dt; (t, f64::from(x), f64::from(y)) })
                .collect();
            let input = trail(&raw);
            let config = SimplifyConfig { min_distance, ..Default::default() };
            let (points, _) = simplify_trail(&input, &config);

            prop_assert_eq!(points.first().map(|p| p.time), input.first().map(|p| p.time));
            prop_assert_eq!(points.last().map(|p| p.time), input.last().map(|p| p.time));
            prop_assert!(points.windows(2).all(|w| w[0].time <= w[1].time));
            prop_assert!(points.iter().filter(|p| p.interpolated).all(|p| p.stop_length == 0.0));
        }
    }
}
