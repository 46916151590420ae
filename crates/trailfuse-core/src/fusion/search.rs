//! Nearest-time lookup over time-sorted sequences.

/// Index of the item whose time is nearest to `time`.
///
/// Binary search for an exact match; otherwise the two straddling neighbors are
/// compared by absolute time distance (ties go to the earlier one). Queries
/// outside the range clamp to the first or last item.
pub fn nearest_index<T>(items: &[T], time: f64, key: impl Fn(&T) -> f64) -> Option<usize> {
    if items.is_empty() {
        return None;
    }

    let idx = items.partition_point(|item| key(item) < time);
    if idx == 0 {
        return Some(0);
    }
    if idx == items.len() {
        return Some(items.len() - 1);
    }
    if key(&items[idx]) == time {
        return Some(idx);
    }

    let before = idx - 1;
    if (time - key(&items[before])).abs() <= (key(&items[idx]) - time).abs() {
        Some(before)
    } else {
        Some(idx)
    }
}
