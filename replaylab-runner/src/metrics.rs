//! Performance metrics: pure functions that compute replay statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Win rate, profit factor and expectancy count closed positions, not ledger
//! rows, so partial exits cannot inflate them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replaylab_core::domain::TradeRecord;
use replaylab_core::engine::ReplayResult;

/// Aggregate performance metrics for a single replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub net_return: f64,
    pub final_equity: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    /// Mean realized R per closed position.
    pub expectancy_r: f64,
    /// Annualized by the bar density of the equity curve.
    pub sharpe: f64,
    /// Closed positions.
    pub trade_count: usize,
    /// Ledger rows, partial exits included.
    pub exit_count: usize,
    pub buy_hold_return: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a replay result.
    pub fn compute(result: &ReplayResult) -> Self {
        let curve = equity_values(result);
        let times: Vec<DateTime<Utc>> = result.equity_curve.iter().map(|p| p.time).collect();
        let bars_per_year = periods_per_year(&times).unwrap_or(1.0);
        let still_open = result.open_position.as_ref().map(|p| p.entry_index);
        let positions = closed_positions(&result.trades, still_open);
        Self {
            net_return: net_return(result.initial_equity, result.final_equity),
            final_equity: result.final_equity,
            max_drawdown: max_drawdown(&curve),
            win_rate: win_rate(&positions),
            profit_factor: profit_factor(&positions),
            expectancy_r: expectancy_r(&positions),
            sharpe: sharpe_ratio(&curve, bars_per_year),
            trade_count: positions.len(),
            exit_count: result.trades.len(),
            buy_hold_return: net_return(result.first_close, result.last_close),
        }
    }
}

/// Shorthand for [`PerformanceMetrics::compute`].
pub fn compute_metrics(result: &ReplayResult) -> PerformanceMetrics {
    PerformanceMetrics::compute(result)
}

/// All ledger slices of one position, summed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedPosition {
    pub entry_index: usize,
    pub pnl: f64,
    /// Fraction-weighted sum of slice R-multiples.
    pub r_multiple: f64,
}

/// Group ledger rows by position. Slices of the position still open at the
/// end of the replay are left out.
pub fn closed_positions(trades: &[TradeRecord], still_open: Option<usize>) -> Vec<ClosedPosition> {
    let mut grouped: BTreeMap<usize, ClosedPosition> = BTreeMap::new();
    for t in trades.iter().filter(|t| Some(t.entry_index) != still_open) {
        let entry = grouped.entry(t.entry_index).or_insert(ClosedPosition {
            entry_index: t.entry_index,
            pnl: 0.0,
            r_multiple: 0.0,
        });
        entry.pnl += t.pnl;
        entry.r_multiple += t.fraction * t.r_multiple;
    }
    grouped.into_values().collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Initial equity followed by the mark-to-market curve.
fn equity_values(result: &ReplayResult) -> Vec<f64> {
    std::iter::once(result.initial_equity)
        .chain(result.equity_curve.iter().map(|p| p.equity))
        .collect()
}

/// (final - initial) / initial. Zero for a non-positive start.
pub fn net_return(initial: f64, final_value: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_value - initial) / initial
}

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Observed bars per calendar year: (n - 1) intervals over the span from the
/// first to the last timestamp. Market closures are counted as elapsed time,
/// so a weekday-only daily series lands near 252 and a 24/7 one near 365.
///
/// `None` with fewer than 2 points or a non-positive span.
pub fn periods_per_year(times: &[DateTime<Utc>]) -> Option<f64> {
    let (first, last) = (times.first()?, times.last()?);
    let span = (*last - *first).num_seconds() as f64;
    if times.len() < 2 || span <= 0.0 {
        return None;
    }
    Some((times.len() - 1) as f64 * SECONDS_PER_YEAR / span)
}

/// Sharpe ratio of per-bar returns, scaled by sqrt(periods_per_year).
/// Pass 1.0 for the raw per-bar ratio.
///
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * periods_per_year.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = match equity_curve.first() {
        Some(&first) => first,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of closed positions with positive net PnL.
pub fn win_rate(positions: &[ClosedPosition]) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }
    let winners = positions.iter().filter(|p| p.pnl > 0.0).count();
    winners as f64 / positions.len() as f64
}

/// Gross profits / gross losses over closed positions.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(positions: &[ClosedPosition]) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = positions.iter().filter(|p| p.pnl > 0.0).map(|p| p.pnl).sum();
    let gross_loss: f64 = positions
        .iter()
        .filter(|p| p.pnl < 0.0)
        .map(|p| p.pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Mean R per closed position.
pub fn expectancy_r(positions: &[ClosedPosition]) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }
    positions.iter().map(|p| p.r_multiple).sum::<f64>() / positions.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean_f64(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
