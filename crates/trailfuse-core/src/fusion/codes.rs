//! Code interval assignment.

use crate::models::{CodeInterval, DataPoint};

/// Clear `label` from every point, then stamp it onto each point whose time
/// lies inside one of the intervals (inclusive on both ends).
///
/// Returns the number of points carrying the label afterwards.
pub fn assign_code(trail: &mut [DataPoint], label: &str, intervals: &[CodeInterval]) -> usize {
    for point in trail.iter_mut() {
        point.codes.remove(label);
    }

    for interval in intervals {
        let first = trail.partition_point(|p| p.time < interval.start);
        let end = trail.partition_point(|p| p.time <= interval.end);
        if first >= end {
            continue;
        }
        for point in &mut trail[first..end] {
            if !point.codes.contains(label) {
                point.codes.insert(label.to_string());
            }
        }
    }

    trail.iter().filter(|p| p.codes.contains(label)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail() -> Vec<DataPoint> {
        (0..10).map(|i| DataPoint::movement(i as f64, 0.0, i as f64)).collect()
    }

    #[test]
    fn test_inclusive_range() {
        let mut t = trail();
        let tagged = assign_code(&mut t, "group", &[CodeInterval { start: 2.0, end: 4.0 }]);
        assert_eq!(tagged, 3);
        assert!(!t[1].codes.contains("group"));
        assert!(t[2].codes.contains("group"));
        assert!(t[4].codes.contains("group"));
        assert!(!t[5].codes.contains("group"));
    }

    #[test]
    fn test_reassignment_replaces_previous_intervals() {
        let mut t = trail();
        assign_code(&mut t, "group", &[CodeInterval { start: 0.0, end: 9.0 }]);
        let tagged = assign_code(&mut t, "group", &[CodeInterval { start: 7.5, end: 8.5 }]);
        assert_eq!(tagged, 1);
        assert!(t[8].codes.contains("group"));
        assert!(!t[0].codes.contains("group"));
    }

    #[test]
    fn test_other_labels_untouched_and_overlaps_deduplicated() {
        let mut t = trail();
        assign_code(&mut t, "solo", &[CodeInterval { start: 0.0, end: 1.0 }]);
        assign_code(
            &mut t,
            "group",
            &[CodeInterval { start: 0.0, end: 3.0 }, CodeInterval { start: 2.0, end: 5.0 }],
        );
        assert!(t[0].codes.contains("solo"));
        assert_eq!(t[2].codes.len(), 1);
    }

    #[test]
    fn test_interval_between_points_tags_nothing() {
        let mut t = trail();
        assert_eq!(assign_code(&mut t, "blip", &[CodeInterval { start: 3.2, end: 3.8 }]), 0);
        assert_eq!(assign_code(&mut t, "rev", &[CodeInterval { start: 5.0, end: 4.0 }]), 0);
    }
}
