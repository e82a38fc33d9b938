//! Risk manager configuration, read from a `ParameterSet`.

use serde::{Deserialize, Serialize};

use crate::domain::ParameterSet;
use crate::error::CoreError;

/// One rung of the partial-exit schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTarget {
    /// Distance from entry in R-units.
    pub multiple: f64,
    /// Fraction of the original size closed at this target.
    pub fraction: f64,
}

/// Volume-climax stop tightening. Disabled unless `climax_volume_mult` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimaxConfig {
    /// Climax when volume > `volume_mult` × SMA(volume, `lookback`).
    pub volume_mult: f64,
    pub lookback: usize,
    /// ... and |Δclose| / prev close < `stall_pct`.
    pub stall_pct: f64,
    /// Stop moves to close ∓ `tighten_pct` × close.
    pub tighten_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub risk_pct: f64,
    pub atr_period: usize,
    pub atr_initial_mult: f64,
    pub atr_trailing_mult: f64,
    /// Ascending by multiple; fractions sum to <= 1.
    pub partial_schedule: Vec<PartialTarget>,
    /// Cap on notional as a fraction of equity. Uncapped when `None`.
    pub max_position_pct: Option<f64>,
    pub time_exit_bars: Option<usize>,
    pub cooldown_bars: usize,
    pub climax: Option<ClimaxConfig>,
}

pub const DEFAULT_SCHEDULE: [(f64, f64); 3] = [(1.0, 0.3), (2.0, 0.3), (3.0, 0.3)];

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_pct: 0.03,
            atr_period: 14,
            atr_initial_mult: 2.0,
            atr_trailing_mult: 3.0,
            partial_schedule: DEFAULT_SCHEDULE
                .iter()
                .map(|&(multiple, fraction)| PartialTarget { multiple, fraction })
                .collect(),
            max_position_pct: None,
            time_exit_bars: None,
            cooldown_bars: 0,
            climax: None,
        }
    }
}

impl RiskConfig {
    /// Read every recognized key; absent keys take the defaults above.
    pub fn from_params(params: &ParameterSet) -> Result<Self, CoreError> {
        let d = Self::default();
        let schedule = params
            .pairs_or("partial_schedule", &DEFAULT_SCHEDULE)?
            .into_iter()
            .map(|(multiple, fraction)| PartialTarget { multiple, fraction })
            .collect();

        let climax = match params.opt_f64("climax_volume_mult")? {
            None => None,
            Some(volume_mult) => Some(ClimaxConfig {
                volume_mult,
                lookback: params.usize_or("climax_lookback", 20)?,
                stall_pct: params.f64_or("climax_stall_pct", 0.003)?,
                tighten_pct: params.f64_or("climax_tighten_pct", 0.01)?,
            }),
        };

        let cfg = Self {
            risk_pct: params.f64_or("risk_pct", d.risk_pct)?,
            atr_period: params.usize_or("atr_period", d.atr_period)?,
            atr_initial_mult: params.f64_or("atr_initial_mult", d.atr_initial_mult)?,
            atr_trailing_mult: params.f64_or("atr_trailing_mult", d.atr_trailing_mult)?,
            partial_schedule: schedule,
            max_position_pct: params.opt_f64("max_position_pct")?,
            time_exit_bars: params.opt_usize("time_exit_bars")?,
            cooldown_bars: params.usize_or("cooldown_bars", d.cooldown_bars)?,
            climax,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.risk_pct > 0.0 && self.risk_pct <= 1.0) {
            return Err(CoreError::invalid_param(
                "risk_pct",
                format!("must be in (0, 1], got {}", self.risk_pct),
            ));
        }
        if self.atr_period == 0 {
            return Err(CoreError::invalid_param("atr_period", "must be >= 1"));
        }
        for (name, v) in [
            ("atr_initial_mult", self.atr_initial_mult),
            ("atr_trailing_mult", self.atr_trailing_mult),
        ] {
            if v <= 0.0 {
                return Err(CoreError::invalid_param(name, format!("must be > 0, got {v}")));
            }
        }

        let mut prev = 0.0;
        let mut total = 0.0;
        for t in &self.partial_schedule {
            if t.multiple <= prev {
                return Err(CoreError::invalid_param(
                    "partial_schedule",
                    format!("multiples must be positive and ascending, got {}", t.multiple),
                ));
            }
            if t.fraction <= 0.0 {
                return Err(CoreError::invalid_param(
                    "partial_schedule",
                    format!("fractions must be positive, got {}", t.fraction),
                ));
            }
            prev = t.multiple;
            total += t.fraction;
        }
        if total > 1.0 + 1e-9 {
            return Err(CoreError::invalid_param(
                "partial_schedule",
                format!("fractions sum to {total}, must be <= 1"),
            ));
        }

        if let Some(cap) = self.max_position_pct {
            if cap <= 0.0 {
                return Err(CoreError::invalid_param(
                    "max_position_pct",
                    format!("must be > 0, got {cap}"),
                ));
            }
        }

        if let Some(c) = &self.climax {
            if c.volume_mult <= 0.0 || c.lookback == 0 || c.stall_pct <= 0.0 {
                return Err(CoreError::invalid_param(
                    "climax_volume_mult",
                    "climax multiplier, lookback and stall threshold must be positive",
                ));
            }
            if !(c.tighten_pct > 0.0 && c.tighten_pct < 1.0) {
                return Err(CoreError::invalid_param(
                    "climax_tighten_pct",
                    format!("must be in (0, 1), got {}", c.tighten_pct),
                ));
            }
        }
        Ok(())
    }
}
