//! Replay engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// When an accepted intent is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillModel {
    /// At the open of the bar after the decision.
    #[default]
    NextOpen,
    /// At the close of the decision bar.
    CurrentClose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_equity: f64,
    pub fill_model: FillModel,
    /// Adverse entry slippage in basis points.
    pub slippage_bps: f64,
    /// Commission as a fraction of notional, charged on every fill.
    pub commission_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            fill_model: FillModel::NextOpen,
            slippage_bps: 0.0,
            commission_rate: 0.001,
        }
    }
}

impl EngineConfig {
    /// No costs, next-open fills.
    pub fn frictionless(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            commission_rate: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(CoreError::invalid_param(
                "initial_equity",
                format!("must be > 0, got {}", self.initial_equity),
            ));
        }
        if !(self.slippage_bps >= 0.0 && self.slippage_bps < 10_000.0) {
            return Err(CoreError::invalid_param(
                "slippage_bps",
                format!("must be in [0, 10000), got {}", self.slippage_bps),
            ));
        }
        if !(self.commission_rate >= 0.0 && self.commission_rate < 1.0) {
            return Err(CoreError::invalid_param(
                "commission_rate",
                format!("must be in [0, 1), got {}", self.commission_rate),
            ));
        }
        Ok(())
    }
}
