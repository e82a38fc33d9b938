//! Position: one open trade, mutated bar by bar by the risk manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use crate::risk::ratchet::RatchetState;

/// Remaining fractions below this are treated as fully closed.
pub const FRACTION_EPSILON: f64 = 1e-9;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Price `multiple` R-units away from `entry` in the profit direction.
    /// Negative multiples land on the loss side.
    pub fn offset(self, entry: f64, r_unit: f64, multiple: f64) -> f64 {
        entry + self.sign() * r_unit * multiple
    }

    pub fn favorable_extreme(self, bar: &Bar) -> f64 {
        match self {
            Direction::Long => bar.high,
            Direction::Short => bar.low,
        }
    }

    pub fn adverse_extreme(self, bar: &Bar) -> f64 {
        match self {
            Direction::Long => bar.low,
            Direction::Short => bar.high,
        }
    }

    /// True if the bar's adverse extreme touches or crosses `stop`.
    pub fn stop_hit(self, bar: &Bar, stop: f64) -> bool {
        match self {
            Direction::Long => bar.low <= stop,
            Direction::Short => bar.high >= stop,
        }
    }

    /// True if the bar's favorable extreme touches or crosses `target`.
    pub fn target_hit(self, bar: &Bar, target: f64) -> bool {
        match self {
            Direction::Long => bar.high >= target,
            Direction::Short => bar.low <= target,
        }
    }

    /// True if `candidate` is strictly more protective than `current`.
    pub fn is_tighter(self, candidate: f64, current: f64) -> bool {
        match self {
            Direction::Long => candidate > current,
            Direction::Short => candidate < current,
        }
    }
}

/// What last moved the stop. Decides the exit tag when the stop is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSource {
    /// entry ∓ stop distance
    Initial,
    /// Breakeven or previous-target lock after a partial fill.
    Locked,
    /// Water-mark trail on the runner.
    Trailing,
    /// Volume-climax tightening.
    Climax,
}

/// An open (or just-closed) position.
///
/// Entry price, size and R-unit are fixed at creation. The stop can only
/// tighten and `remaining_fraction` can only shrink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    // ── Identification ──
    pub symbol: String,
    pub direction: Direction,

    // ── Entry ──
    entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_index: usize,
    size: f64,
    r_unit: f64,
    entry_atr: Option<f64>,
    /// Commission paid on the entry fill, allocated to exits pro rata.
    pub entry_commission: f64,

    // ── Stop ──
    stop: RatchetState,
    stop_source: StopSource,

    // ── Progress ──
    remaining_fraction: f64,
    /// Gross PnL of every slice closed so far.
    pub realized_pnl: f64,
    partials_filled: Vec<f64>,
    high_water_mark: f64,
    low_water_mark: f64,
    bars_held: usize,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        entry_index: usize,
        size: f64,
        stop_distance: f64,
        entry_atr: Option<f64>,
    ) -> Self {
        let initial_stop = direction.offset(entry_price, stop_distance, -1.0);
        Self {
            symbol: symbol.into(),
            direction,
            entry_price,
            entry_time,
            entry_index,
            size,
            r_unit: stop_distance,
            entry_atr,
            entry_commission: 0.0,
            stop: RatchetState::with_initial_level(direction, initial_stop),
            stop_source: StopSource::Initial,
            remaining_fraction: 1.0,
            realized_pnl: 0.0,
            partials_filled: Vec::new(),
            high_water_mark: entry_price,
            low_water_mark: entry_price,
            bars_held: 0,
        }
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Original quantity at entry.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Initial stop distance in price terms.
    pub fn r_unit(&self) -> f64 {
        self.r_unit
    }

    pub fn initial_stop_distance(&self) -> f64 {
        self.r_unit
    }

    pub fn entry_atr(&self) -> Option<f64> {
        self.entry_atr
    }

    pub fn current_stop(&self) -> f64 {
        self.stop.current_level().unwrap_or(self.entry_price)
    }

    pub fn stop_source(&self) -> StopSource {
        self.stop_source
    }

    pub fn remaining_fraction(&self) -> f64 {
        self.remaining_fraction
    }

    pub fn remaining_quantity(&self) -> f64 {
        self.size * self.remaining_fraction
    }

    pub fn partials_filled(&self) -> &[f64] {
        &self.partials_filled
    }

    pub fn has_filled(&self, multiple: f64) -> bool {
        self.partials_filled
            .iter()
            .any(|m| (m - multiple).abs() < FRACTION_EPSILON)
    }

    pub fn high_water_mark(&self) -> f64 {
        self.high_water_mark
    }

    pub fn low_water_mark(&self) -> f64 {
        self.low_water_mark
    }

    pub fn bars_held(&self) -> usize {
        self.bars_held
    }

    pub fn is_closed(&self) -> bool {
        self.remaining_fraction <= 0.0
    }

    /// Unrealized PnL of the remaining quantity at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.remaining_quantity()
    }

    // ── Mutation (risk manager only) ──

    /// Propose a new stop. Applied only if tighter; returns whether it moved.
    pub(crate) fn ratchet_stop(&mut self, proposed: f64, source: StopSource) -> bool {
        let before = self.current_stop();
        let after = self.stop.apply(proposed);
        let moved = self.direction.is_tighter(after, before);
        if moved {
            self.stop_source = source;
        }
        moved
    }

    /// Close up to `fraction` of the original size. Returns the fraction
    /// actually closed.
    pub(crate) fn close_fraction(&mut self, fraction: f64) -> f64 {
        let closed = fraction.min(self.remaining_fraction).max(0.0);
        self.remaining_fraction -= closed;
        if self.remaining_fraction < FRACTION_EPSILON {
            self.remaining_fraction = 0.0;
        }
        closed
    }

    /// Close everything that remains. Returns the fraction closed.
    pub(crate) fn close_all(&mut self) -> f64 {
        let closed = self.remaining_fraction;
        self.remaining_fraction = 0.0;
        closed
    }

    pub(crate) fn record_partial(&mut self, multiple: f64) {
        self.partials_filled.push(multiple);
    }

    pub(crate) fn update_water_marks(&mut self, bar: &Bar) {
        self.high_water_mark = self.high_water_mark.max(bar.high);
        self.low_water_mark = self.low_water_mark.min(bar.low);
    }

    pub(crate) fn increment_bars_held(&mut self) {
        self.bars_held += 1;
    }
}
