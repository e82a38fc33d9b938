//! Risk Manager: sizing plus the per-bar partial-exit / stop-ratchet machine.
//!
//! `on_bar` evaluates a fixed sequence against each new bar:
//! 1. stop check on the adverse extreme (wins every same-bar conflict)
//! 2. partial targets in ascending R order, each followed by a stop lock
//! 3. water-mark update, runner trail, climax tightening
//! 4. time exit at the close
//!
//! Water marks and trails computed on bar t are first tested by the stop
//! check on bar t+1.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{PartialTarget, RiskConfig};
use super::sizing::{cap_quantity, size_position};
use crate::domain::{Bar, Direction, ExitReason, ParameterSet, Position, StopSource, TradeRecord};
use crate::error::CoreError;

/// Where and when an entry was filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryFill {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub bar_index: usize,
    /// ATR at entry; sets the runner trail distance.
    pub atr: Option<f64>,
}

/// Per-bar context the engine computes for the risk manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarSignals {
    pub bar_index: usize,
    pub volume_climax: bool,
}

/// Stop and target prices for a prospective entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RTargets {
    /// The -1R stop.
    pub stop: f64,
    /// (multiple, price) per schedule rung, ascending.
    pub targets: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn from_params(params: &ParameterSet) -> Result<Self, CoreError> {
        Ok(Self::new(RiskConfig::from_params(params)?))
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Open a position sized by dollar risk, capped by `max_position_pct`.
    pub fn open(
        &self,
        symbol: &str,
        direction: Direction,
        fill: EntryFill,
        stop_distance: f64,
        risk_pct: f64,
        equity: f64,
    ) -> Result<Position, CoreError> {
        let raw = size_position(equity, stop_distance, risk_pct)?;
        let size = cap_quantity(raw, equity, fill.price, self.config.max_position_pct);
        if !(size.is_finite() && size > 0.0) || fill.price <= 0.0 {
            return Err(CoreError::InvalidRiskInput {
                stop_distance,
                risk_pct,
            });
        }
        let capped = size < raw;
        debug!(
            symbol,
            ?direction,
            entry = fill.price,
            stop_distance,
            size,
            capped,
            "position opened"
        );
        Ok(Position::new(
            symbol,
            direction,
            fill.price,
            fill.time,
            fill.bar_index,
            size,
            stop_distance,
            fill.atr,
        ))
    }

    /// Advance `position` by one bar and return every slice closed on it.
    pub fn on_bar(&self, position: &mut Position, bar: &Bar, signals: BarSignals) -> Vec<TradeRecord> {
        let mut records = Vec::new();
        if position.is_closed() {
            return records;
        }
        position.increment_bars_held();
        let direction = position.direction;
        let index = signals.bar_index;

        // ─── 1. Stop check ───
        let stop = position.current_stop();
        if direction.stop_hit(bar, stop) {
            let reason = match position.stop_source() {
                StopSource::Trailing => ExitReason::TrailingStop,
                _ => ExitReason::StopLoss,
            };
            records.extend(self.liquidate(position, stop, bar.open_time, index, reason));
            return records;
        }

        // ─── 2. Partial targets ───
        let entry = position.entry_price();
        let r_unit = position.r_unit();
        for (rung, target) in self.config.partial_schedule.iter().enumerate() {
            if position.has_filled(target.multiple) {
                continue;
            }
            let price = direction.offset(entry, r_unit, target.multiple);
            if !direction.target_hit(bar, price) {
                break;
            }
            let closed = position.close_fraction(target.fraction);
            position.record_partial(target.multiple);
            if closed > 0.0 {
                debug!(
                    symbol = %position.symbol,
                    multiple = target.multiple,
                    price,
                    fraction = closed,
                    "partial target filled"
                );
                records.push(self.close_slice(
                    position,
                    price,
                    bar.open_time,
                    index,
                    closed,
                    ExitReason::TakeProfitPartial,
                ));
            }
            let lock = self.stop_for_level(entry, r_unit, rung + 1, direction);
            position.ratchet_stop(lock, StopSource::Locked);
            if position.is_closed() {
                return records;
            }
        }

        // ─── 3. Water marks, runner trail, climax ───
        position.update_water_marks(bar);
        if self.all_partials_filled(position) {
            let distance = self.trail_distance(position);
            let proposed = match direction {
                Direction::Long => position.high_water_mark() - distance,
                Direction::Short => position.low_water_mark() + distance,
            };
            position.ratchet_stop(proposed, StopSource::Trailing);
        }
        if signals.volume_climax {
            if let Some(climax) = &self.config.climax {
                let proposed = bar.close * (1.0 - direction.sign() * climax.tighten_pct);
                if position.ratchet_stop(proposed, StopSource::Climax) {
                    debug!(
                        symbol = %position.symbol,
                        stop = proposed,
                        "stop tightened on volume climax"
                    );
                }
            }
        }

        // ─── 4. Time exit ───
        if let Some(max_bars) = self.config.time_exit_bars {
            if position.bars_held() > max_bars {
                records.extend(self.liquidate(
                    position,
                    bar.close,
                    bar.open_time,
                    index,
                    ExitReason::TimeExit,
                ));
            }
        }

        records
    }

    /// Close whatever remains at `price`. `None` if already flat.
    pub fn liquidate(
        &self,
        position: &mut Position,
        price: f64,
        time: DateTime<Utc>,
        index: usize,
        reason: ExitReason,
    ) -> Option<TradeRecord> {
        if position.is_closed() {
            return None;
        }
        let fraction = position.close_all();
        debug!(
            symbol = %position.symbol,
            %reason,
            price,
            fraction,
            "position closed"
        );
        Some(self.close_slice(position, price, time, index, fraction, reason))
    }

    /// The -1R stop and every schedule target for a prospective entry.
    pub fn r_targets(&self, entry: f64, stop_distance: f64, direction: Direction) -> RTargets {
        RTargets {
            stop: direction.offset(entry, stop_distance, -1.0),
            targets: self
                .config
                .partial_schedule
                .iter()
                .map(|t| (t.multiple, direction.offset(entry, stop_distance, t.multiple)))
                .collect(),
        }
    }

    /// Stop level after `partials_taken` rungs: initial stop, then breakeven,
    /// then the previous rung's target.
    pub fn stop_for_level(
        &self,
        entry: f64,
        stop_distance: f64,
        partials_taken: usize,
        direction: Direction,
    ) -> f64 {
        let schedule = &self.config.partial_schedule;
        match partials_taken {
            0 => direction.offset(entry, stop_distance, -1.0),
            1 => entry,
            n => {
                let rung = (n - 2).min(schedule.len().saturating_sub(1));
                match schedule.get(rung) {
                    Some(PartialTarget { multiple, .. }) => {
                        direction.offset(entry, stop_distance, *multiple)
                    }
                    None => entry,
                }
            }
        }
    }

    fn all_partials_filled(&self, position: &Position) -> bool {
        self.config
            .partial_schedule
            .iter()
            .all(|t| position.has_filled(t.multiple))
    }

    /// Entry ATR × trailing multiple. Without an entry ATR the ATR is
    /// recovered from the initial stop distance.
    fn trail_distance(&self, position: &Position) -> f64 {
        let atr = position
            .entry_atr()
            .unwrap_or(position.r_unit() / self.config.atr_initial_mult);
        atr * self.config.atr_trailing_mult
    }

    fn close_slice(
        &self,
        position: &mut Position,
        price: f64,
        time: DateTime<Utc>,
        index: usize,
        fraction: f64,
        reason: ExitReason,
    ) -> TradeRecord {
        let direction = position.direction;
        let entry = position.entry_price();
        let quantity = position.size() * fraction;
        let gross = direction.sign() * (price - entry) * quantity;
        position.realized_pnl += gross;
        TradeRecord {
            symbol: position.symbol.clone(),
            direction,
            entry_index: position.entry_index,
            entry_time: position.entry_time,
            entry_price: entry,
            exit_index: index,
            exit_time: time,
            exit_price: price,
            reason,
            fraction,
            quantity,
            r_multiple: r_multiple(entry, price, position.r_unit(), direction),
            gross_pnl: gross,
            commission: 0.0,
            pnl: gross,
        }
    }
}

/// Realized R per unit: favorable move divided by the initial stop distance.
pub fn r_multiple(entry: f64, exit: f64, stop_distance: f64, direction: Direction) -> f64 {
    if stop_distance <= 0.0 {
        return 0.0;
    }
    direction.sign() * (exit - entry) / stop_distance
}
