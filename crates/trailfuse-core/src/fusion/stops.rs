//! Stationary-run detection.

use crate::models::DataPoint;

/// Recompute every point's stop length from scratch and return the maximum.
///
/// A run is a maximal stretch of bit-identical positions. Each point after the
/// run start gets the elapsed time since the start; the start itself stays 0.
/// The outer index jumps to the end of each run, so the pass is linear.
pub fn compute_stop_lengths(trail: &mut [DataPoint]) -> f64 {
    for point in trail.iter_mut() {
        point.stop_length = 0.0;
    }

    let mut max_stop = 0.0f64;
    let mut i = 0;
    while i < trail.len() {
        let Some(anchor) = trail[i].position else {
            i += 1;
            continue;
        };
        let start_time = trail[i].time;

        let mut j = i + 1;
        while j < trail.len() && trail[j].position.is_some_and(|p| p.same_as(&anchor)) {
            let cumulative = trail[j].time - start_time;
            trail[j].stop_length = cumulative;
            max_stop = max_stop.max(cumulative);
            j += 1;
        }

        i = j;
    }

    max_stop
}
