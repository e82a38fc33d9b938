//! Objective: configurable score used to rank walk-forward trials.
//!
//! Win rate is reported in the metrics but is not offered as an objective.

use serde::{Deserialize, Serialize};

use crate::metrics::PerformanceMetrics;

/// Drawdown floor for `ReturnOverDrawdown`, so a curve that never dipped
/// does not divide by zero.
const MIN_DRAWDOWN: f64 = 0.01;

/// Which metric to maximize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    NetReturn,
    FinalEquity,
    Sharpe,
    ExpectancyR,
    ReturnOverDrawdown,
}

impl Objective {
    /// Score a replay. Higher is better; non-finite values score `-inf`.
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        let raw = match self {
            Self::NetReturn => metrics.net_return,
            Self::FinalEquity => metrics.final_equity,
            Self::Sharpe => metrics.sharpe,
            Self::ExpectancyR => metrics.expectancy_r,
            Self::ReturnOverDrawdown => {
                metrics.net_return / metrics.max_drawdown.abs().max(MIN_DRAWDOWN)
            }
        };
        if raw.is_finite() {
            raw
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Returns true if score `a` beats score `b`. Ties do not.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetReturn => "net_return",
            Self::FinalEquity => "final_equity",
            Self::Sharpe => "sharpe",
            Self::ExpectancyR => "expectancy_r",
            Self::ReturnOverDrawdown => "return_over_drawdown",
        }
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            net_return: 0.15,
            final_equity: 11_500.0,
            max_drawdown: -0.10,
            win_rate: 0.55,
            profit_factor: 1.8,
            expectancy_r: 0.4,
            sharpe: 1.5,
            trade_count: 20,
            exit_count: 45,
            buy_hold_return: 0.05,
        }
    }

    #[test]
    fn default_is_net_return() {
        assert_eq!(Objective::default(), Objective::NetReturn);
    }

    #[test]
    fn score_extracts_metric() {
        let m = sample_metrics();
        assert!((Objective::NetReturn.score(&m) - 0.15).abs() < 1e-10);
        assert!((Objective::FinalEquity.score(&m) - 11_500.0).abs() < 1e-10);
        assert!((Objective::Sharpe.score(&m) - 1.5).abs() < 1e-10);
        assert!((Objective::ExpectancyR.score(&m) - 0.4).abs() < 1e-10);
        assert!((Objective::ReturnOverDrawdown.score(&m) - 1.5).abs() < 1e-10);
    }

    #[test]
    fn return_over_drawdown_floors_drawdown() {
        let m = PerformanceMetrics {
            max_drawdown: 0.0,
            ..sample_metrics()
        };
        assert!((Objective::ReturnOverDrawdown.score(&m) - 15.0).abs() < 1e-10);
    }

    #[test]
    fn non_finite_scores_lose() {
        let m = PerformanceMetrics {
            sharpe: f64::NAN,
            ..sample_metrics()
        };
        assert_eq!(Objective::Sharpe.score(&m), f64::NEG_INFINITY);
    }

    #[test]
    fn ties_are_not_better() {
        assert!(Objective::NetReturn.is_better(0.2, 0.1));
        assert!(!Objective::NetReturn.is_better(0.1, 0.1));
    }

    #[test]
    fn serde_names() {
        let o: Objective = serde_json::from_str("\"return_over_drawdown\"").unwrap();
        assert_eq!(o, Objective::ReturnOverDrawdown);
        assert_eq!(o.to_string(), "return_over_drawdown");
    }
}
