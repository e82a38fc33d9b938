//! The bar-by-bar replay loop.
//!
//! Per base bar, strictly in time order:
//! 1. cooldown clock, then pending next-open fills
//! 2. bar signals (ATR, volume climax)
//! 3. risk manager `on_bar` for the open position
//! 4. exactly one strategy call
//! 5. intent routing (cooldown, position and sizing checks)
//! 6. mark-to-market

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::{EngineConfig, FillModel};
use super::ledger::TradeLedger;
use super::signals::SignalTracker;
use super::state::{EngineState, PendingEntry, PhaseState, Rejection, RejectionCounts};
use super::ReplayError;
use crate::data::{BarStore, TimeframeSync};
use crate::domain::{Bar, Direction, ExitReason, Position, TradeRecord};
use crate::risk::{EntryFill, RiskManager};
use crate::strategy::{Intent, StrategyAdapter, StrategyContext};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

/// Everything one replay produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub symbol: String,
    pub strategy: String,
    pub initial_equity: f64,
    /// Marked to the last close, including any still-open position.
    pub final_equity: f64,
    pub trades: Vec<TradeRecord>,
    /// One point per base bar, at the bar's close.
    pub equity_curve: Vec<EquityPoint>,
    pub bar_count: usize,
    pub first_close: f64,
    pub last_close: f64,
    pub rejections: RejectionCounts,
    /// Position still open when the data ran out.
    pub open_position: Option<Position>,
}

pub struct ReplayEngine {
    config: EngineConfig,
    risk: RiskManager,
}

impl ReplayEngine {
    pub fn new(config: EngineConfig, risk: RiskManager) -> Self {
        Self { config, risk }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    /// Replay every base bar of `store` through `strategy`.
    ///
    /// Single-threaded by construction: each bar's risk state depends on all
    /// prior bars. Halts on the first strategy or synchronizer error.
    pub fn run(
        &self,
        store: &BarStore,
        strategy: &mut dyn StrategyAdapter,
    ) -> Result<ReplayResult, ReplayError> {
        self.config.validate().map_err(ReplayError::Config)?;
        self.risk.config().validate().map_err(ReplayError::Config)?;

        let bars = store.base_bars();
        let base_tf = store.base_timeframe();
        let sync = TimeframeSync::new(store);
        let mut state = EngineState::new(self.config.initial_equity);
        let mut ledger = TradeLedger::new();
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut tracker = SignalTracker::new(self.risk.config());

        debug!(
            symbol = store.symbol(),
            strategy = strategy.name(),
            bars = bars.len(),
            "replay started"
        );

        for (i, bar) in bars.iter().enumerate() {
            // ─── Phase 1: Open ───
            state.tick_cooldown();
            self.fill_at_open(store.symbol(), &mut state, &mut ledger, bar, i);

            // ─── Phase 2: Bar signals ───
            let (atr, signals) = tracker.update(bar, i);

            // ─── Phase 3: Risk manager ───
            let mut exited = false;
            if let PhaseState::Open(position) = &mut state.phase {
                let records = self.risk.on_bar(position, bar, signals);
                let entry_commission = position.entry_commission;
                for record in records {
                    self.book(record, entry_commission, &mut state.realized_equity, &mut ledger);
                }
                exited = position.is_closed();
            }
            if exited {
                state.mark_exit();
            }

            // ─── Phase 4: Strategy ───
            let ctx = StrategyContext::new(i, sync, state.phase.position(), atr);
            let intent = strategy
                .decide(&ctx)
                .map_err(|source| ReplayError::Halted { index: i, source })?;

            // ─── Phase 5: Intent routing ───
            let close_time = base_tf.close_time(bar.open_time);
            self.route(
                store.symbol(),
                intent,
                &mut state,
                &mut ledger,
                bar,
                close_time,
                i,
                atr,
            );

            // ─── Phase 6: Mark-to-market ───
            equity_curve.push(EquityPoint {
                time: close_time,
                equity: state.equity_at(bar.close),
            });
        }

        // Next-open fills decided on the last bar have nowhere to land.
        if let PhaseState::Entering(_) = state.phase {
            state.rejections.record(Rejection::NoNextBar);
            state.phase = PhaseState::Flat;
        }
        if state.pending_exit.take().is_some() {
            state.rejections.record(Rejection::NoNextBar);
        }

        let first_close = bars.first().map_or(0.0, |b| b.close);
        let last_close = bars.last().map_or(0.0, |b| b.close);
        let final_equity = state.equity_at(last_close);
        let open_position = state.phase.position().cloned();

        debug!(
            symbol = store.symbol(),
            trades = ledger.len(),
            final_equity,
            rejected = state.rejections.total(),
            "replay finished"
        );

        Ok(ReplayResult {
            symbol: store.symbol().to_string(),
            strategy: strategy.name().to_string(),
            initial_equity: self.config.initial_equity,
            final_equity,
            trades: ledger.into_records(),
            equity_curve,
            bar_count: bars.len(),
            first_close,
            last_close,
            rejections: state.rejections,
            open_position,
        })
    }

    /// Fill whatever was decided on the previous bar at this bar's open.
    fn fill_at_open(
        &self,
        symbol: &str,
        state: &mut EngineState,
        ledger: &mut TradeLedger,
        bar: &Bar,
        index: usize,
    ) {
        if let PhaseState::Entering(pending) = state.phase {
            self.open_position(symbol, state, pending, bar.open, bar.open_time, index);
        }
        if let Some(reason) = state.pending_exit.take() {
            self.exit_now(state, ledger, bar.open, bar.open_time, index, reason);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn route(
        &self,
        symbol: &str,
        intent: Intent,
        state: &mut EngineState,
        ledger: &mut TradeLedger,
        bar: &Bar,
        close_time: DateTime<Utc>,
        index: usize,
        atr: Option<f64>,
    ) {
        let (direction, stop_distance) = match intent {
            Intent::NoAction => return,
            Intent::ExitNow(reason) => {
                if state.phase.position().is_none() {
                    debug!(index, %reason, "exit intent while flat ignored");
                    state.rejections.record(Rejection::NothingToExit);
                    return;
                }
                match self.config.fill_model {
                    FillModel::NextOpen => state.pending_exit = Some(reason),
                    FillModel::CurrentClose => {
                        self.exit_now(state, ledger, bar.close, close_time, index, reason)
                    }
                }
                return;
            }
            Intent::EnterLong { stop_distance } => (Direction::Long, stop_distance),
            Intent::EnterShort { stop_distance } => (Direction::Short, stop_distance),
        };

        if !state.phase.is_flat() {
            debug!(index, "entry intent rejected: position already open");
            state.rejections.record(Rejection::AlreadyInPosition);
            return;
        }
        let cooldown = self.risk.config().cooldown_bars;
        if !state.cooldown_elapsed(cooldown) {
            debug!(
                index,
                bars_since_exit = ?state.bars_since_exit,
                cooldown,
                "entry intent rejected: cooldown"
            );
            state.rejections.record(Rejection::Cooldown);
            return;
        }

        let pending = PendingEntry {
            direction,
            stop_distance,
            decided_at: index,
            atr,
        };
        match self.config.fill_model {
            FillModel::NextOpen => state.phase = PhaseState::Entering(pending),
            FillModel::CurrentClose => {
                self.open_position(symbol, state, pending, bar.close, close_time, index)
            }
        }
    }

    /// FLAT/ENTERING → OPEN, or back to FLAT if sizing rejects the entry.
    fn open_position(
        &self,
        symbol: &str,
        state: &mut EngineState,
        pending: PendingEntry,
        raw_price: f64,
        time: DateTime<Utc>,
        index: usize,
    ) {
        let slip = pending.direction.sign() * self.config.slippage_bps / 10_000.0;
        let fill = EntryFill {
            price: raw_price * (1.0 + slip),
            time,
            bar_index: index,
            atr: pending.atr,
        };
        let opened = self.risk.open(
            symbol,
            pending.direction,
            fill,
            pending.stop_distance,
            self.risk.config().risk_pct,
            state.realized_equity,
        );
        match opened {
            Ok(mut position) => {
                position.entry_commission = fill.price * position.size() * self.config.commission_rate;
                state.phase = PhaseState::Open(Box::new(position));
            }
            Err(e) => {
                warn!(
                    index,
                    decided_at = pending.decided_at,
                    error = %e,
                    "entry skipped"
                );
                state.rejections.record(Rejection::InvalidRisk);
                state.phase = PhaseState::Flat;
            }
        }
    }

    fn exit_now(
        &self,
        state: &mut EngineState,
        ledger: &mut TradeLedger,
        price: f64,
        time: DateTime<Utc>,
        index: usize,
        reason: ExitReason,
    ) {
        let mut exited = false;
        if let PhaseState::Open(position) = &mut state.phase {
            let entry_commission = position.entry_commission;
            if let Some(record) = self.risk.liquidate(position, price, time, index, reason) {
                self.book(record, entry_commission, &mut state.realized_equity, ledger);
            }
            exited = true;
        }
        if exited {
            state.mark_exit();
        }
    }

    /// Charge costs and append to the ledger. The entry commission is
    /// allocated by the slice's fraction of the original size.
    fn book(
        &self,
        record: TradeRecord,
        entry_commission: f64,
        realized_equity: &mut f64,
        ledger: &mut TradeLedger,
    ) {
        let commission =
            entry_commission * record.fraction + record.notional() * self.config.commission_rate;
        let record = record.with_commission(commission);
        *realized_equity += record.pnl;
        ledger.append(record);
    }
}
