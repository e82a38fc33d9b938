//! TradeRecord: one closed slice of a position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Direction;

/// Why a slice of a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfitPartial,
    StopLoss,
    TrailingStop,
    TimeExit,
    TrendReversal,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TakeProfitPartial => "take_profit_partial",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TimeExit => "time_exit",
            ExitReason::TrendReversal => "trend_reversal",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of a partial or final exit.
///
/// `fraction` is relative to the position's original size, so the fractions
/// of all records sharing an `entry_index` sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub symbol: String,
    pub direction: Direction,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub reason: ExitReason,

    // ── Size ──
    pub fraction: f64,
    pub quantity: f64,

    // ── PnL ──
    /// Realized R per unit: (exit - entry) / R-unit, direction-signed.
    pub r_multiple: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub pnl: f64,
}

impl TradeRecord {
    /// Attach costs. Net PnL is recomputed from gross.
    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self.pnl = self.gross_pnl - commission;
        self
    }

    pub fn notional(&self) -> f64 {
        self.exit_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade() -> TradeRecord {
        TradeRecord {
            symbol: "SPY".into(),
            direction: Direction::Long,
            entry_index: 4,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            entry_price: 100.0,
            exit_index: 8,
            exit_time: Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap(),
            exit_price: 105.0,
            reason: ExitReason::TakeProfitPartial,
            fraction: 0.3,
            quantity: 6.0,
            r_multiple: 1.0,
            gross_pnl: 30.0,
            commission: 0.0,
            pnl: 30.0,
        }
    }

    #[test]
    fn commission_reduces_net_pnl() {
        let t = sample_trade().with_commission(1.5);
        assert_eq!(t.gross_pnl, 30.0);
        assert_eq!(t.pnl, 28.5);
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::TrailingStop).unwrap();
        assert_eq!(json, "\"trailing_stop\"");
        assert_eq!(ExitReason::TimeExit.to_string(), "time_exit");
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let t = sample_trade();
        let json = serde_json::to_string(&t).unwrap();
        let back: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
