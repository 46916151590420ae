//! Actors and their fused trails.

use super::records::SpeechRecord;
use crate::simplify::{SimplifiedTrail, SimplifyConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Planar position in the normalized drawing space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Bit-for-bit equality, used for stop-run detection
    pub fn same_as(&self, other: &Position) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One instant in an actor's trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Relative seconds; non-decreasing within a trail
    pub time: f64,

    /// Absent only for speech points when no positioned point exists anywhere
    pub position: Option<Position>,

    /// Spoken text, empty if none
    pub speech: String,

    /// Seconds since the start of the stationary run this point belongs to
    pub stop_length: f64,

    /// Active code labels
    pub codes: BTreeSet<String>,

    /// True for points synthesized by gap interpolation
    pub interpolated: bool,
}

impl DataPoint {
    /// Movement point at a known position
    pub fn movement(time: f64, x: f64, y: f64) -> Self {
        Self {
            time,
            position: Some(Position::new(x, y)),
            speech: String::new(),
            stop_length: 0.0,
            codes: BTreeSet::new(),
            interpolated: false,
        }
    }

    pub fn has_speech(&self) -> bool {
        !self.speech.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_length > 0.0
    }
}

/// Fusion state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorState {
    NoData,
    MovementOnly,
    SpeechOnly,
    MovementAndSpeech,
}

/// A named participant with a fused trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,

    /// Display color, assigned by the rendering layer
    pub color: Option<String>,

    pub show_movement: bool,
    pub show_speech: bool,

    trail: Vec<DataPoint>,
    movement_loaded: bool,
    speech_loaded: bool,

    /// Conversation rows kept so speech can be re-derived after a movement re-import
    #[serde(skip)]
    pub(crate) speech_records: Vec<SpeechRecord>,

    /// Bumped on every trail mutation
    #[serde(skip)]
    revision: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) simplified: Option<SimplifiedTrail>,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            show_movement: true,
            show_speech: true,
            trail: Vec::new(),
            movement_loaded: false,
            speech_loaded: false,
            speech_records: Vec::new(),
            revision: 0,
            simplified: None,
        }
    }

    pub fn state(&self) -> ActorState {
        match (self.movement_loaded, self.speech_loaded) {
            (false, false) => ActorState::NoData,
            (true, false) => ActorState::MovementOnly,
            (false, true) => ActorState::SpeechOnly,
            (true, true) => ActorState::MovementAndSpeech,
        }
    }

    pub fn trail(&self) -> &[DataPoint] {
        &self.trail
    }

    pub fn has_movement(&self) -> bool {
        self.movement_loaded
    }

    pub fn has_speech(&self) -> bool {
        self.speech_loaded
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Cached simplified trail, if one is current
    pub fn simplified(&self) -> Option<&SimplifiedTrail> {
        self.simplified
            .as_ref()
            .filter(|s| s.revision == self.revision && s.source_len == self.trail.len())
    }

    /// Simplified trail for `config`, rebuilt only when the trail or config changed
    pub fn simplify(&mut self, config: &SimplifyConfig) -> &SimplifiedTrail {
        let current = self.simplified().is_some_and(|s| s.config == *config);
        if !current {
            self.simplified = None;
        }
        let (trail, revision) = (&self.trail, self.revision);
        self.simplified
            .get_or_insert_with(|| SimplifiedTrail::build(trail, revision, *config))
    }

    pub fn speech_records(&self) -> &[SpeechRecord] {
        &self.speech_records
    }

    /// Mutable access to the trail; invalidates the simplified cache
    pub(crate) fn trail_mut(&mut self) -> &mut Vec<DataPoint> {
        self.revision += 1;
        self.simplified = None;
        &mut self.trail
    }

    pub(crate) fn set_movement_loaded(&mut self, loaded: bool) {
        self.movement_loaded = loaded;
    }

    pub(crate) fn set_speech_loaded(&mut self, loaded: bool) {
        self.speech_loaded = loaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_bitwise_equality() {
        let a = Position::new(1.0, 2.0);
        assert!(a.same_as(&Position::new(1.0, 2.0)));
        assert!(!a.same_as(&Position::new(1.0, 2.000_000_1)));
        assert!(!Position::new(0.0, 0.0).same_as(&Position::new(-0.0, 0.0)));
    }

    #[test]
    fn test_actor_state_transitions() {
        let mut actor = Actor::new("ana");
        assert_eq!(actor.state(), ActorState::NoData);
        actor.set_speech_loaded(true);
        assert_eq!(actor.state(), ActorState::SpeechOnly);
        actor.set_movement_loaded(true);
        assert_eq!(actor.state(), ActorState::MovementAndSpeech);
    }

    #[test]
    fn test_trail_mutation_bumps_revision() {
        let mut actor = Actor::new("a");
        let before = actor.revision();
        actor.trail_mut().push(DataPoint::movement(0.0, 1.0, 1.0));
        assert!(actor.revision() > before);
        assert_eq!(actor.trail().len(), 1);
    }
}
