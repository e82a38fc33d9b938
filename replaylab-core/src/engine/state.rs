//! Per-symbol replay state: FLAT → ENTERING → OPEN → FLAT, plus the cooldown clock.

use serde::{Deserialize, Serialize};

use crate::domain::{Direction, ExitReason, Position};

/// An accepted entry waiting for its fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEntry {
    pub direction: Direction,
    pub stop_distance: f64,
    pub decided_at: usize,
    pub atr: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum PhaseState {
    Flat,
    Entering(PendingEntry),
    Open(Box<Position>),
}

impl PhaseState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PhaseState::Flat)
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PhaseState::Open(p) => Some(p.as_ref()),
            _ => None,
        }
    }
}

/// Why an intent was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Cooldown,
    AlreadyInPosition,
    InvalidRisk,
    NothingToExit,
    NoNextBar,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub cooldown: usize,
    pub already_in_position: usize,
    pub invalid_risk: usize,
    pub nothing_to_exit: usize,
    pub no_next_bar: usize,
}

impl RejectionCounts {
    pub fn record(&mut self, r: Rejection) {
        match r {
            Rejection::Cooldown => self.cooldown += 1,
            Rejection::AlreadyInPosition => self.already_in_position += 1,
            Rejection::InvalidRisk => self.invalid_risk += 1,
            Rejection::NothingToExit => self.nothing_to_exit += 1,
            Rejection::NoNextBar => self.no_next_bar += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.cooldown
            + self.already_in_position
            + self.invalid_risk
            + self.nothing_to_exit
            + self.no_next_bar
    }
}

/// Mutable state owned by one replay.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub phase: PhaseState,
    /// Exit decided on the previous bar, filled at this bar's open.
    pub pending_exit: Option<ExitReason>,
    /// `None` until the first exit; 0 on the exit bar, +1 on every later bar.
    pub bars_since_exit: Option<usize>,
    /// Initial equity plus net PnL of every closed slice.
    pub realized_equity: f64,
    pub rejections: RejectionCounts,
}

impl EngineState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            phase: PhaseState::Flat,
            pending_exit: None,
            bars_since_exit: None,
            realized_equity: initial_equity,
            rejections: RejectionCounts::default(),
        }
    }

    pub fn tick_cooldown(&mut self) {
        if let Some(n) = self.bars_since_exit.as_mut() {
            *n += 1;
        }
    }

    pub fn cooldown_elapsed(&self, cooldown_bars: usize) -> bool {
        self.bars_since_exit.map_or(true, |n| n >= cooldown_bars)
    }

    pub fn mark_exit(&mut self) {
        self.phase = PhaseState::Flat;
        self.pending_exit = None;
        self.bars_since_exit = Some(0);
    }

    /// Realized equity plus open PnL at `price`, net of the unallocated
    /// part of the entry commission.
    pub fn equity_at(&self, price: f64) -> f64 {
        match self.phase.position() {
            Some(p) => {
                self.realized_equity + p.unrealized_pnl(price)
                    - p.entry_commission * p.remaining_fraction()
            }
            None => self.realized_equity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_clock() {
        let mut s = EngineState::new(10_000.0);
        assert!(s.cooldown_elapsed(7));
        s.mark_exit();
        assert!(!s.cooldown_elapsed(7));
        for _ in 0..6 {
            s.tick_cooldown();
        }
        assert!(!s.cooldown_elapsed(7));
        s.tick_cooldown();
        assert!(s.cooldown_elapsed(7));
        assert!(s.cooldown_elapsed(0));
    }

    #[test]
    fn rejection_counts() {
        let mut c = RejectionCounts::default();
        c.record(Rejection::Cooldown);
        c.record(Rejection::Cooldown);
        c.record(Rejection::InvalidRisk);
        assert_eq!(c.cooldown, 2);
        assert_eq!(c.total(), 3);
    }
}
