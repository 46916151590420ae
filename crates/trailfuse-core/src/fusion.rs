//! Multi-source trajectory fusion.
//!
//! A [`FusionContext`] owns every actor and the dataset-wide side outputs that
//! the rendering layer reads: the timeline duration, the maximum stop length and
//! the stop threshold control. Each import mutates the trails it touches and
//! then re-derives everything that depends on them:
//!
//! * a movement import replaces that actor's trail, re-derives its speech and the
//!   speech of every actor positioned from the shared pool, then recomputes stop
//!   lengths and codes;
//! * a conversation import replaces all speech;
//! * a code import re-stamps its labels across every actor.
//!
//! Stop lengths and codes are always recomputed from scratch, never patched.

pub mod codes;
pub mod search;
pub mod stops;

use crate::error::{Result, TrailError};
use crate::models::{Actor, CodeInterval, CodeRecord, DataPoint, MovementRecord, SpeechRecord};
use crate::ports::DataChangeListener;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use codes::assign_code;
pub use search::nearest_index;
pub use stops::compute_stop_lengths;

/// Movement ingestion settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Tables with more rows than this are down-sampled
    pub movement_sample_threshold: usize,

    /// Minimum spacing in seconds between kept points when down-sampling
    pub movement_sample_interval: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { movement_sample_threshold: 10_000, movement_sample_interval: 0.5 }
    }
}

/// Stop-length threshold control exposed to the rendering layer.
///
/// `max` tracks the dataset maximum stop length; `value` is reset to `min`
/// whenever fused data changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopThreshold {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for StopThreshold {
    fn default() -> Self {
        Self { value: 0.0, min: 0.0, max: 0.0 }
    }
}

/// Notification sent after every successful fusion pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DataChange {
    Movement { actor: String, points: usize },
    Conversation { speakers: usize, points: usize },
    Codes { labels: Vec<String> },
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementImport {
    pub actor: String,
    pub input_rows: usize,
    pub kept_points: usize,
    pub sampled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationImport {
    pub speakers: Vec<String>,
    pub points: usize,

    /// Speech points left without a position because no positioned point exists
    pub unpositioned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeImport {
    pub labels: Vec<String>,
    pub intervals: usize,
    pub tagged_points: usize,
}

/// Read-only view of the fused dataset handed to the rendering layer
#[derive(Debug, Serialize)]
pub struct FusionSnapshot<'a> {
    pub timeline_end: f64,
    pub max_stop_length: f64,
    pub stop_threshold: StopThreshold,
    pub codes: Vec<&'a str>,
    pub actors: &'a [Actor],
}

/// Pipeline context holding all actors and dataset-wide side outputs
pub struct FusionContext {
    config: FusionConfig,
    actors: Vec<Actor>,
    timeline_end: f64,
    max_stop_length: f64,
    stop_threshold: StopThreshold,
    code_intervals: BTreeMap<String, Vec<CodeInterval>>,
    listeners: Vec<Box<dyn DataChangeListener>>,
}

impl fmt::Debug for FusionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FusionContext")
            .field("config", &self.config)
            .field("actors", &self.actors.len())
            .field("timeline_end", &self.timeline_end)
            .field("max_stop_length", &self.max_stop_length)
            .field("code_labels", &self.code_intervals.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for FusionContext {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl FusionContext {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            actors: Vec::new(),
            timeline_end: 0.0,
            max_stop_length: 0.0,
            stop_threshold: StopThreshold::default(),
            code_intervals: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Register a listener notified after each successful fusion pass
    pub fn subscribe(&mut self, listener: Box<dyn DataChangeListener>) {
        self.listeners.push(listener);
    }

    /// Actors in order of first reference
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actors_mut(&mut self) -> &mut [Actor] {
        &mut self.actors
    }

    pub fn actor(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.name == name)
    }

    pub fn actor_mut(&mut self, name: &str) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.name == name)
    }

    /// Maximum end time across all movement imports
    pub fn timeline_end(&self) -> f64 {
        self.timeline_end
    }

    /// Largest stop length across every trail
    pub fn max_stop_length(&self) -> f64 {
        self.max_stop_length
    }

    pub fn stop_threshold(&self) -> StopThreshold {
        self.stop_threshold
    }

    /// Move the stop threshold control, clamped to its range
    pub fn set_stop_threshold(&mut self, value: f64) {
        self.stop_threshold.value = value.clamp(self.stop_threshold.min, self.stop_threshold.max);
    }

    pub fn code_labels(&self) -> impl Iterator<Item = &str> {
        self.code_intervals.keys().map(String::as_str)
    }

    /// Toggle what the rendering layer shows for an actor
    pub fn set_visibility(&mut self, name: &str, movement: bool, speech: bool) -> bool {
        match self.actor_mut(name) {
            Some(actor) => {
                actor.show_movement = movement;
                actor.show_speech = speech;
                true
            }
            None => false,
        }
    }

    fn actor_index_or_create(&mut self, name: &str) -> usize {
        match self.actors.iter().position(|a| a.name == name) {
            Some(idx) => idx,
            None => {
                self.actors.push(Actor::new(name));
                self.actors.len() - 1
            }
        }
    }

    /// Replace an actor's trail with movement rows.
    ///
    /// Rows are time-sorted; when `table_rows` exceeds the sample threshold they
    /// are greedily down-sampled so each kept point is at least the sample
    /// interval after the previous kept point.
    pub fn import_movement(
        &mut self,
        name: &str,
        records: &[MovementRecord],
        table_rows: usize,
    ) -> MovementImport {
        let mut sorted = records.to_vec();
        sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

        let sampled = table_rows > self.config.movement_sample_threshold;
        let kept = if sampled {
            sample_movement(&sorted, self.config.movement_sample_interval)
        } else {
            sorted
        };
        tracing::debug!(
            actor = name,
            input = records.len(),
            kept = kept.len(),
            sampled,
            "Movement rows kept"
        );

        if let Some(last) = kept.last() {
            self.timeline_end = self.timeline_end.max(last.time);
        }

        let idx = self.actor_index_or_create(name);
        {
            let actor = &mut self.actors[idx];
            *actor.trail_mut() =
                kept.iter().map(|r| DataPoint::movement(r.time, r.x, r.y)).collect();
            actor.set_movement_loaded(true);
        }

        // Own speech borrows from this trail; pooled speech borrows from every trail
        let dependents: Vec<usize> = (0..self.actors.len())
            .filter(|&i| {
                let actor = &self.actors[i];
                i == idx || (!actor.has_movement() && !actor.speech_records.is_empty())
            })
            .collect();
        let pool = self.position_pool();
        for &i in &dependents {
            self.derive_speech(i, &pool);
        }

        self.refresh_stops();
        self.recompute_codes();

        let summary = MovementImport {
            actor: name.to_string(),
            input_rows: records.len(),
            kept_points: kept.len(),
            sampled,
        };
        tracing::info!(actor = name, points = summary.kept_points, "Fused movement");
        self.notify(DataChange::Movement { actor: name.to_string(), points: summary.kept_points });
        summary
    }

    /// Replace all speech with a conversation table.
    ///
    /// Speakers without movement are positioned from the pooled points of every
    /// actor that has movement.
    pub fn import_conversation(&mut self, records: &[SpeechRecord]) -> ConversationImport {
        for actor in &mut self.actors {
            actor.speech_records.clear();
        }

        let mut speakers: Vec<String> = Vec::new();
        for record in records {
            let idx = self.actor_index_or_create(&record.speaker);
            if self.actors[idx].speech_records.is_empty() {
                speakers.push(record.speaker.clone());
            }
            self.actors[idx].speech_records.push(record.clone());
        }
        for actor in &mut self.actors {
            actor.speech_records.sort_by(|a, b| a.time.total_cmp(&b.time));
        }

        let pool = self.position_pool();
        let mut unpositioned = 0;
        for i in 0..self.actors.len() {
            unpositioned += self.derive_speech(i, &pool);
        }

        self.refresh_stops();
        self.recompute_codes();

        let summary = ConversationImport { speakers, points: records.len(), unpositioned };
        if unpositioned > 0 {
            tracing::warn!(unpositioned, "Speech points have no position to borrow yet");
        }
        tracing::info!(
            speakers = summary.speakers.len(),
            points = summary.points,
            "Fused conversation"
        );
        self.notify(DataChange::Conversation {
            speakers: summary.speakers.len(),
            points: summary.points,
        });
        summary
    }

    /// Register code intervals and re-stamp their labels on every trail.
    ///
    /// Each label present in `records` replaces any intervals previously
    /// registered under the same label.
    pub fn import_codes(&mut self, records: &[CodeRecord]) -> CodeImport {
        let mut grouped: BTreeMap<String, Vec<CodeInterval>> = BTreeMap::new();
        for record in records {
            grouped.entry(record.code.clone()).or_default().push(CodeInterval::from(record));
        }

        let mut tagged_points = 0;
        for (label, intervals) in &grouped {
            for actor in &mut self.actors {
                tagged_points += assign_code(actor.trail_mut(), label, intervals);
            }
        }

        let labels: Vec<String> = grouped.keys().cloned().collect();
        self.code_intervals.extend(grouped);
        self.reset_stop_threshold();

        let summary =
            CodeImport { labels: labels.clone(), intervals: records.len(), tagged_points };
        tracing::info!(labels = ?summary.labels, tagged_points, "Applied codes");
        self.notify(DataChange::Codes { labels });
        summary
    }

    /// Drop a code label and its intervals
    pub fn remove_code(&mut self, label: &str) -> bool {
        if self.code_intervals.remove(label).is_none() {
            return false;
        }
        for actor in &mut self.actors {
            assign_code(actor.trail_mut(), label, &[]);
        }
        self.notify(DataChange::Codes { labels: vec![label.to_string()] });
        true
    }

    /// Clear every code from every point and re-apply all registered intervals
    pub fn recompute_codes(&mut self) {
        for actor in &mut self.actors {
            let trail = actor.trail_mut();
            for point in trail.iter_mut() {
                point.codes.clear();
            }
            for (label, intervals) in &self.code_intervals {
                assign_code(trail, label, intervals);
            }
        }
    }

    pub fn snapshot(&self) -> FusionSnapshot<'_> {
        FusionSnapshot {
            timeline_end: self.timeline_end,
            max_stop_length: self.max_stop_length,
            stop_threshold: self.stop_threshold,
            codes: self.code_labels().collect(),
            actors: &self.actors,
        }
    }

    /// Pretty JSON of [`FusionContext::snapshot`]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| TrailError::Serialization(e.to_string()))
    }

    /// Remove every actor and code and reset side outputs
    pub fn clear(&mut self) {
        self.actors.clear();
        self.code_intervals.clear();
        self.timeline_end = 0.0;
        self.max_stop_length = 0.0;
        self.stop_threshold = StopThreshold::default();
        self.notify(DataChange::Cleared);
    }

    /// Time-sorted positioned points of every actor that has movement
    fn position_pool(&self) -> Vec<DataPoint> {
        let mut pool: Vec<DataPoint> = self
            .actors
            .iter()
            .filter(|a| a.has_movement())
            .flat_map(|a| a.trail().iter().filter(|p| p.position.is_some() && !p.has_speech()))
            .cloned()
            .collect();
        pool.sort_by(|a, b| a.time.total_cmp(&b.time));
        pool
    }

    /// Rebuild an actor's speech points from its retained conversation rows.
    ///
    /// Returns how many speech points ended up without a position.
    fn derive_speech(&mut self, idx: usize, pool: &[DataPoint]) -> usize {
        let new_points: Vec<DataPoint> = {
            let actor = &self.actors[idx];
            let own: Vec<DataPoint>;
            let source: &[DataPoint] = if actor.has_movement() {
                own = actor
                    .trail()
                    .iter()
                    .filter(|p| p.position.is_some() && !p.has_speech())
                    .cloned()
                    .collect();
                &own
            } else {
                pool
            };
            actor.speech_records.iter().map(|r| speech_point(r, source)).collect()
        };

        let unpositioned = new_points.iter().filter(|p| p.position.is_none()).count();
        let actor = &mut self.actors[idx];
        actor.set_speech_loaded(!new_points.is_empty());
        let trail = actor.trail_mut();
        trail.retain(|p| !p.has_speech());
        for point in new_points {
            let at = trail.partition_point(|p| p.time <= point.time);
            trail.insert(at, point);
        }
        unpositioned
    }

    /// Recompute stop lengths everywhere and publish the dataset maximum
    fn refresh_stops(&mut self) {
        let mut max_stop = 0.0f64;
        for actor in &mut self.actors {
            max_stop = max_stop.max(compute_stop_lengths(actor.trail_mut()));
        }
        self.max_stop_length = max_stop;
        self.reset_stop_threshold();
    }

    fn reset_stop_threshold(&mut self) {
        self.stop_threshold = StopThreshold {
            value: self.stop_threshold.min,
            min: self.stop_threshold.min,
            max: self.max_stop_length,
        };
    }

    fn notify(&self, change: DataChange) {
        for listener in &self.listeners {
            listener.on_data_changed(&change);
        }
    }
}

/// Speech point borrowing position, stop length and codes from the time-nearest source point
fn speech_point(record: &SpeechRecord, source: &[DataPoint]) -> DataPoint {
    let matched = nearest_index(source, record.time, |p| p.time).map(|i| &source[i]);
    DataPoint {
        time: record.time,
        position: matched.and_then(|m| m.position),
        speech: record.talk.clone(),
        stop_length: matched.map_or(0.0, |m| m.stop_length),
        codes: matched.map(|m| m.codes.clone()).unwrap_or_default(),
        interpolated: false,
    }
}

/// Greedy forward sampling: keep a row only when it is at least `interval`
/// seconds after the last kept row
pub fn sample_movement(sorted: &[MovementRecord], interval: f64) -> Vec<MovementRecord> {
    let mut kept: Vec<MovementRecord> = Vec::new();
    for record in sorted {
        match kept.last() {
            Some(last) if record.time - last.time < interval => {}
            _ => kept.push(*record),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn movement(points: &[(f64, f64, f64)]) -> Vec<MovementRecord> {
        points.iter().map(|&(time, x, y)| MovementRecord { time, x, y }).collect()
    }

    fn speech(time: f64, speaker: &str, talk: &str) -> SpeechRecord {
        SpeechRecord { time, speaker: speaker.to_string(), talk: talk.to_string() }
    }

    struct Counter(Arc<AtomicUsize>);

    impl DataChangeListener for Counter {
        fn on_data_changed(&self, _change: &DataChange) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_movement_import_sorts_and_tracks_timeline() {
        let mut ctx = FusionContext::default();
        let rows = movement(&[(2.0, 1.0, 1.0), (0.0, 0.0, 0.0), (1.0, 0.5, 0.5)]);
        let summary = ctx.import_movement("ana", &rows, rows.len());

        assert_eq!(summary.kept_points, 3);
        assert!(!summary.sampled);
        let times: Vec<f64> = ctx.actor("ana").unwrap().trail().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert_eq!(ctx.timeline_end(), 2.0);
    }

    #[test]
    fn test_greedy_sampling_above_threshold() {
        let mut ctx = FusionContext::new(FusionConfig {
            movement_sample_threshold: 3,
            movement_sample_interval: 1.0,
        });
        let rows = movement(&[
            (0.0, 0.0, 0.0),
            (0.4, 1.0, 0.0),
            (0.9, 2.0, 0.0),
            (1.1, 3.0, 0.0),
            (1.5, 4.0, 0.0),
            (2.2, 5.0, 0.0),
        ]);
        let summary = ctx.import_movement("ana", &rows, rows.len());

        assert!(summary.sampled);
        let times: Vec<f64> = ctx.actor("ana").unwrap().trail().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 1.1, 2.2]);
    }

    #[test]
    fn test_reimport_replaces_trail_and_rederives_speech() {
        let mut ctx = FusionContext::default();
        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0), (10.0, 2.0, 2.0)]), 2);
        ctx.import_conversation(&[speech(9.0, "ana", "hello")]);

        let before =
            ctx.actor("ana").unwrap().trail().iter().find(|p| p.has_speech()).unwrap().clone();
        assert_eq!(before.position, Some(Position::new(2.0, 2.0)));

        let rows = movement(&[(0.0, 7.0, 7.0), (8.0, 8.0, 8.0), (20.0, 9.0, 9.0)]);
        ctx.import_movement("ana", &rows, 3);
        let actor = ctx.actor("ana").unwrap();
        assert_eq!(actor.trail().len(), 4);
        let spoken = actor.trail().iter().find(|p| p.has_speech()).unwrap();
        assert_eq!(spoken.position, Some(Position::new(8.0, 8.0)));
        assert_eq!(actor.state(), crate::models::ActorState::MovementAndSpeech);
    }

    #[test]
    fn test_speaker_without_movement_uses_pooled_positions() {
        let mut ctx = FusionContext::default();
        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0), (10.0, 2.0, 2.0)]), 2);
        ctx.import_movement("ben", &movement(&[(4.0, 5.0, 5.0), (30.0, 6.0, 6.0)]), 2);
        ctx.import_conversation(&[speech(5.0, "cam", "question")]);

        let cam = ctx.actor("cam").unwrap();
        assert_eq!(cam.state(), crate::models::ActorState::SpeechOnly);
        assert_eq!(cam.trail()[0].position, Some(Position::new(5.0, 5.0)));
    }

    #[test]
    fn test_speech_before_any_movement_is_backfilled() {
        let mut ctx = FusionContext::default();
        let summary = ctx.import_conversation(&[speech(3.0, "cam", "early")]);
        assert_eq!(summary.unpositioned, 1);
        assert!(ctx.actor("cam").unwrap().trail()[0].position.is_none());

        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0), (4.0, 2.0, 2.0)]), 2);
        assert_eq!(ctx.actor("cam").unwrap().trail()[0].position, Some(Position::new(2.0, 2.0)));
    }

    #[test]
    fn test_speech_inserted_in_time_order_with_copied_codes() {
        let mut ctx = FusionContext::default();
        let rows = movement(&[(0.0, 1.0, 1.0), (2.0, 2.0, 2.0), (4.0, 3.0, 3.0)]);
        ctx.import_movement("ana", &rows, 3);
        ctx.import_codes(&[CodeRecord { code: "group".into(), start: 1.5, end: 2.5 }]);
        ctx.import_conversation(&[speech(2.2, "ana", "b"), speech(0.5, "ana", "a")]);

        let trail = ctx.actor("ana").unwrap().trail();
        assert!(trail.windows(2).all(|w| w[0].time <= w[1].time));
        assert_eq!(trail.len(), 5);
        assert_eq!(trail[3].speech, "b");
        assert!(trail[3].codes.contains("group"));
        assert!(trail[1].codes.is_empty());
    }

    #[test]
    fn test_conversation_reimport_replaces_speech() {
        let mut ctx = FusionContext::default();
        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0), (4.0, 2.0, 2.0)]), 2);
        ctx.import_conversation(&[speech(1.0, "ana", "first")]);
        ctx.import_conversation(&[speech(2.0, "ben", "second")]);

        let ana = ctx.actor("ana").unwrap();
        assert!(!ana.has_speech());
        assert_eq!(ana.trail().len(), 2);
        assert!(ctx.actor("ben").unwrap().has_speech());
    }

    #[test]
    fn test_stop_side_outputs_reset_threshold() {
        let mut ctx = FusionContext::default();
        let rows = movement(&[(0.0, 1.0, 1.0), (5.0, 1.0, 1.0), (6.0, 2.0, 2.0)]);
        ctx.import_movement("ana", &rows, 3);
        assert_eq!(ctx.max_stop_length(), 5.0);
        ctx.set_stop_threshold(3.0);
        assert_eq!(ctx.stop_threshold().value, 3.0);

        ctx.import_movement("ben", &movement(&[(0.0, 1.0, 1.0), (9.0, 1.0, 1.0)]), 2);
        let threshold = ctx.stop_threshold();
        assert_eq!(threshold.value, threshold.min);
        assert_eq!(threshold.max, 9.0);
    }

    #[test]
    fn test_codes_survive_movement_reimport() {
        let mut ctx = FusionContext::default();
        ctx.import_codes(&[CodeRecord { code: "lecture".into(), start: 0.0, end: 1.0 }]);
        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0), (2.0, 2.0, 2.0)]), 2);

        let trail = ctx.actor("ana").unwrap().trail();
        assert!(trail[0].codes.contains("lecture"));
        assert!(!trail[1].codes.contains("lecture"));

        assert!(ctx.remove_code("lecture"));
        assert!(ctx.actor("ana").unwrap().trail()[0].codes.is_empty());
    }

    #[test]
    fn test_listeners_notified_per_pass() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut ctx = FusionContext::default();
        ctx.subscribe(Box::new(Counter(count.clone())));

        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0)]), 1);
        ctx.import_codes(&[]);
        ctx.clear();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(ctx.actors().is_empty());
        assert_eq!(ctx.timeline_end(), 0.0);
    }

    #[test]
    fn test_visibility_toggle() {
        let mut ctx = FusionContext::default();
        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0)]), 1);
        assert!(ctx.set_visibility("ana", false, true));
        assert!(!ctx.actor("ana").unwrap().show_movement);
        assert!(!ctx.set_visibility("nobody", true, true));
    }

    #[test]
    fn test_snapshot_json() {
        let mut ctx = FusionContext::default();
        ctx.import_movement("ana", &movement(&[(0.0, 1.0, 1.0), (2.0, 1.0, 1.0)]), 2);
        ctx.import_codes(&[CodeRecord { code: "lecture".into(), start: 0.0, end: 1.0 }]);

        let json: serde_json::Value = serde_json::from_str(&ctx.to_json().unwrap()).unwrap();
        assert_eq!(json["timeline_end"], 2.0);
        assert_eq!(json["max_stop_length"], 2.0);
        assert_eq!(json["codes"][0], "lecture");
        assert_eq!(json["actors"][0]["name"], "ana");
        assert_eq!(json["actors"][0]["trail"].as_array().unwrap().len(), 2);
    }
}
