//! Time lookups used while scrubbing a timeline.

use crate::fusion::nearest_index;
use crate::models::{DataPoint, Position};

/// Point nearest in time to `time`; ties resolve to the earlier point
pub fn find_closest_point_at_time(trail: &[DataPoint], time: f64) -> Option<&DataPoint> {
    nearest_index(trail, time, |p| p.time).map(|i| &trail[i])
}

/// Position at `time`, linearly interpolated between the straddling points.
///
/// Falls back to the closest point's raw position on an exact hit, when a
/// position is missing or when the two points straddle a stop boundary.
pub fn interpolate_position_at_time(trail: &[DataPoint], time: f64) -> Option<Position> {
    let idx = nearest_index(trail, time, |p| p.time)?;
    let closest = &trail[idx];
    if closest.time == time {
        return closest.position;
    }

    let partner_idx = if time > closest.time {
        idx.checked_add(1).filter(|&i| i < trail.len())
    } else {
        idx.checked_sub(1)
    };
    let Some(partner) = partner_idx.map(|i| &trail[i]) else {
        return closest.position;
    };

    let (Some(pc), Some(pp)) = (closest.position, partner.position) else {
        return closest.position;
    };
    if closest.is_stopped() != partner.is_stopped() {
        return closest.position;
    }

    let (from, to, a, b) = if partner.time > closest.time {
        (closest.time, partner.time, pc, pp)
    } else {
        (partner.time, closest.time, pp, pc)
    };
    let span = to - from;
    if span <= 0.0 {
        return closest.position;
    }
    let fraction = (time - from) / span;
    Some(Position::new(a.x + (b.x - a.x) * fraction, a.y + (b.y - a.y) * fraction))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(time: f64, x: f64, y: f64, stop: f64) -> DataPoint {
        let mut p = DataPoint::movement(time, x, y);
        p.stop_length = stop;
        p
    }

    #[test]
    fn test_closest_point() {
        let trail = vec![
            point(0.0, 0.0, 0.0, 0.0),
            point(2.0, 1.0, 1.0, 0.0),
            point(5.0, 2.0, 2.0, 0.0),
        ];
        assert_eq!(find_closest_point_at_time(&trail, 1.2).unwrap().time, 2.0);
        assert_eq!(find_closest_point_at_time(&trail, 1.0).unwrap().time, 0.0);
        assert_eq!(find_closest_point_at_time(&trail, 99.0).unwrap().time, 5.0);
        assert!(find_closest_point_at_time(&[], 1.0).is_none());
    }

    #[test]
    fn test_interpolates_between_moving_points() {
        let trail = vec![point(0.0, 0.0, 0.0, 0.0), point(4.0, 8.0, 4.0, 0.0)];
        assert_eq!(interpolate_position_at_time(&trail, 1.0), Some(Position::new(2.0, 1.0)));
        assert_eq!(interpolate_position_at_time(&trail, 3.0), Some(Position::new(6.0, 3.0)));
        assert_eq!(interpolate_position_at_time(&trail, 4.0), Some(Position::new(8.0, 4.0)));
    }

    #[test]
    fn test_no_interpolation_across_stop_boundary() {
        let trail = vec![point(0.0, 0.0, 0.0, 0.0), point(4.0, 8.0, 4.0, 3.0)];
        assert_eq!(interpolate_position_at_time(&trail, 1.0), Some(Position::new(0.0, 0.0)));
        assert_eq!(interpolate_position_at_time(&trail, 3.0), Some(Position::new(8.0, 4.0)));
    }

    #[test]
    fn test_clamps_outside_range() {
        let trail = vec![point(1.0, 1.0, 1.0, 0.0), point(2.0, 2.0, 2.0, 0.0)];
        assert_eq!(interpolate_position_at_time(&trail, -5.0), Some(Position::new(1.0, 1.0)));
        assert_eq!(interpolate_position_at_time(&trail, 50.0), Some(Position::new(2.0, 2.0)));
    }

    #[test]
    fn test_missing_position_returns_raw() {
        let mut speech_only = DataPoint::movement(2.0, 0.0, 0.0);
        speech_only.position = None;
        let trail = vec![point(0.0, 0.0, 0.0, 0.0), speech_only];
        assert_eq!(interpolate_position_at_time(&trail, 1.5), None);
        assert_eq!(interpolate_position_at_time(&trail, 0.5), Some(Position::new(0.0, 0.0)));
    }
}
