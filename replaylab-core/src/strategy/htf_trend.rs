//! Higher-timeframe trend filter with a base-timeframe EMA cross entry.
//!
//! - Trend: close of the latest closed HTF bar vs. an EMA of HTF closes
//! - Entry: base close crosses its EMA in the trend direction
//! - Stop: `atr_initial_mult` × base ATR
//! - Exit: `trend_reversal` when the HTF trend flips against the position

use crate::domain::{Direction, ExitReason, ParameterSet, Timeframe};
use crate::error::CoreError;
use crate::indicators::EmaState;

use super::{Intent, StrategyAdapter, StrategyContext};

#[derive(Debug, Clone)]
pub struct HtfTrend {
    trend_timeframe: Timeframe,
    atr_initial_mult: f64,
    allow_short: bool,

    // ── Streaming state ──
    fast: EmaState,
    prev_close: Option<f64>,
    prev_fast: Option<f64>,
    trend_ema: EmaState,
    htf_seen: usize,
    trend: Option<Direction>,
}

impl HtfTrend {
    pub const NAME: &'static str = "htf_trend";

    /// Parameters: `fast_period` (20), `trend_period` (50),
    /// `trend_timeframe_minutes` (240), `atr_initial_mult` (2.0),
    /// `allow_short` (true).
    pub fn from_params(params: &ParameterSet) -> Result<Self, CoreError> {
        let fast_period = params.usize_or("fast_period", 20)?;
        let trend_period = params.usize_or("trend_period", 50)?;
        let minutes = params.usize_or("trend_timeframe_minutes", 240)?;
        let trend_timeframe = Timeframe::from_minutes(minutes as i64).ok_or_else(|| {
            CoreError::invalid_param(
                "trend_timeframe_minutes",
                format!("{minutes} minutes is not a supported timeframe"),
            )
        })?;
        if fast_period == 0 || trend_period == 0 {
            return Err(CoreError::invalid_param(
                "fast_period",
                "EMA periods must be >= 1",
            ));
        }
        Ok(Self {
            trend_timeframe,
            atr_initial_mult: params.f64_or("atr_initial_mult", 2.0)?,
            allow_short: params.bool_or("allow_short", true)?,
            fast: EmaState::new(fast_period),
            prev_close: None,
            prev_fast: None,
            trend_ema: EmaState::new(trend_period),
            htf_seen: 0,
            trend: None,
        })
    }

    pub fn trend_timeframe(&self) -> Timeframe {
        self.trend_timeframe
    }

    /// Feed HTF bars that closed since the last call.
    fn update_trend(&mut self, ctx: &StrategyContext<'_>) -> Result<(), CoreError> {
        let history = ctx.htf_history(self.trend_timeframe)?;
        for bar in history.iter().skip(self.htf_seen) {
            if let Some(ema) = self.trend_ema.update(bar.close) {
                self.trend = if bar.close > ema {
                    Some(Direction::Long)
                } else if bar.close < ema {
                    Some(Direction::Short)
                } else {
                    self.trend
                };
            }
        }
        self.htf_seen = history.len();
        Ok(())
    }
}

impl StrategyAdapter for HtfTrend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Intent, CoreError> {
        self.update_trend(ctx)?;

        let close = ctx.bar().close;
        let fast = self.fast.update(close);
        let cross = match (self.prev_close, self.prev_fast, fast) {
            (Some(pc), Some(pf), Some(f)) if pc <= pf && close > f => Some(Direction::Long),
            (Some(pc), Some(pf), Some(f)) if pc >= pf && close < f => Some(Direction::Short),
            _ => None,
        };
        self.prev_close = Some(close);
        self.prev_fast = fast;

        if let Some(position) = ctx.position() {
            return Ok(match self.trend {
                Some(trend) if trend != position.direction => {
                    Intent::ExitNow(ExitReason::TrendReversal)
                }
                _ => Intent::NoAction,
            });
        }

        let stop_distance = match ctx.atr() {
            Some(atr) => atr * self.atr_initial_mult,
            None => return Ok(Intent::NoAction),
        };
        Ok(match (self.trend, cross) {
            (Some(Direction::Long), Some(Direction::Long)) => Intent::EnterLong { stop_distance },
            (Some(Direction::Short), Some(Direction::Short)) if self.allow_short => {
                Intent::EnterShort { stop_distance }
            }
            _ => Intent::NoAction,
        })
    }
}
