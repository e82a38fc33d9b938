//! Ratchet invariant enforcement
//!
//! **Core Rule:** stops may tighten, never loosen.
//!
//! A wider ATR or a stale lock level can propose a looser stop; the ratchet
//! discards any such proposal and keeps the current level.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;

/// Stop level that only moves in the favorable direction:
/// - Long positions: stop can only rise
/// - Short positions: stop can only fall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatchetState {
    current_level: Option<f64>,
    direction: Direction,
}

impl RatchetState {
    pub fn new(direction: Direction) -> Self {
        Self {
            current_level: None,
            direction,
        }
    }

    pub fn with_initial_level(direction: Direction, initial_level: f64) -> Self {
        Self {
            current_level: Some(initial_level),
            direction,
        }
    }

    /// Apply ratchet to a proposed stop level and return the resulting level.
    ///
    /// # Example
    /// ```
    /// use replaylab_core::domain::Direction;
    /// use replaylab_core::risk::RatchetState;
    ///
    /// let mut ratchet = RatchetState::with_initial_level(Direction::Long, 95.0);
    ///
    /// // Tightening: $95 → $100 (allowed)
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    ///
    /// // Loosening: $100 → $90 (blocked, stays at $100)
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        let next = match self.current_level {
            None => proposed,
            Some(current) => match self.direction {
                Direction::Long => current.max(proposed),
                Direction::Short => current.min(proposed),
            },
        };
        self.current_level = Some(next);
        next
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }
}
