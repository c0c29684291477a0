//! Sequential ranges and the scrub-slider state

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Inclusive `[first, last]` window of sequential ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeqRange {
    pub first: usize,
    pub last: usize,
}

impl Default for SeqRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl SeqRange {
    pub const EMPTY: SeqRange = SeqRange {
        first: usize::MAX,
        last: 0,
    };

    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    pub fn contains(&self, s_id: usize) -> bool {
        self.first <= s_id && s_id <= self.last
    }

    /// Grow to cover `[first, last]`
    pub fn extend(&mut self, first: usize, last: usize) {
        self.first = self.first.min(first);
        self.last = self.last.max(last);
    }

    /// Clamp both ends into `outer`
    pub fn clamp_to(&self, outer: SeqRange) -> SeqRange {
        if outer.is_empty() {
            return SeqRange::EMPTY;
        }
        SeqRange {
            first: self.first.clamp(outer.first, outer.last),
            last: self.last.clamp(outer.first, outer.last),
        }
    }
}

impl std::fmt::Display for SeqRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "[]")
        } else {
            write!(f, "[{}, {}]", self.first, self.last)
        }
    }
}

/// Relation of the current window to the global extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RangeState {
    /// Nothing loaded yet
    #[default]
    Unset,
    Full,
    Partial,
    Empty,
}

impl RangeState {
    pub fn classify(current: SeqRange, global: SeqRange) -> Self {
        if current.is_empty() || global.is_empty() {
            RangeState::Empty
        } else if current == global {
            RangeState::Full
        } else {
            RangeState::Partial
        }
    }
}

/// What the scrub-slider shows
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SequentialView {
    pub current: SeqRange,
    pub global: SeqRange,
    /// Visible ids of the top layer in the layer range
    pub top_layer: SeqRange,
    pub state: RangeState,
    /// Tool position at the end of `current`
    pub current_position: Option<Vec3>,
    /// Marker offset applied to `current_position`
    pub current_offset: Vec3,
}

impl SequentialView {
    /// Take the ranges of a fresh assembly
    pub fn update(&mut self, current: SeqRange, global: SeqRange, top_layer: SeqRange) {
        self.current = current;
        self.global = global;
        self.top_layer = top_layer;
        self.state = RangeState::classify(current, global);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_full(&self) -> bool {
        self.state == RangeState::Full
    }
}
