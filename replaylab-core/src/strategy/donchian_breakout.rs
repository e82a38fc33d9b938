//! Donchian channel breakout on the base timeframe.
//!
//! Enter long when the close breaks the highest high of the previous
//! `channel_period` bars (short on the lowest low). An open position exits
//! with `trend_reversal` on a close through the opposite `exit_period` channel.

use crate::domain::{Bar, Direction, ExitReason, ParameterSet};
use crate::error::CoreError;

use super::{Intent, StrategyAdapter, StrategyContext};

#[derive(Debug, Clone)]
pub struct DonchianBreakout {
    channel_period: usize,
    exit_period: usize,
    atr_initial_mult: f64,
    allow_short: bool,
}

impl DonchianBreakout {
    pub const NAME: &'static str = "donchian_breakout";

    /// Parameters: `channel_period` (20), `exit_period` (half the channel),
    /// `atr_initial_mult` (2.0), `allow_short` (true).
    pub fn from_params(params: &ParameterSet) -> Result<Self, CoreError> {
        let channel_period = params.usize_or("channel_period", 20)?;
        if channel_period < 2 {
            return Err(CoreError::invalid_param(
                "channel_period",
                format!("must be >= 2, got {channel_period}"),
            ));
        }
        let exit_period = params.usize_or("exit_period", (channel_period / 2).max(1))?;
        if exit_period == 0 {
            return Err(CoreError::invalid_param("exit_period", "must be >= 1"));
        }
        Ok(Self {
            channel_period,
            exit_period,
            atr_initial_mult: params.f64_or("atr_initial_mult", 2.0)?,
            allow_short: params.bool_or("allow_short", true)?,
        })
    }
}

/// (highest high, lowest low) of the `period` bars before the last one.
fn prior_channel(history: &[Bar], period: usize) -> Option<(f64, f64)> {
    let n = history.len();
    if n <= period {
        return None;
    }
    let window = &history[n - 1 - period..n - 1];
    let upper = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lower = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some((upper, lower))
}

impl StrategyAdapter for DonchianBreakout {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Intent, CoreError> {
        let history = ctx.history();
        let close = ctx.bar().close;

        if let Some(position) = ctx.position() {
            let exit = match prior_channel(history, self.exit_period) {
                Some((upper, lower)) => match position.direction {
                    Direction::Long => close < lower,
                    Direction::Short => close > upper,
                },
                None => false,
            };
            return Ok(if exit {
                Intent::ExitNow(ExitReason::TrendReversal)
            } else {
                Intent::NoAction
            });
        }

        let (upper, lower) = match prior_channel(history, self.channel_period) {
            Some(channel) => channel,
            None => return Ok(Intent::NoAction),
        };
        let stop_distance = match ctx.atr() {
            Some(atr) => atr * self.atr_initial_mult,
            None => return Ok(Intent::NoAction),
        };
        Ok(if close > upper {
            Intent::EnterLong { stop_distance }
        } else if close < lower && self.allow_short {
            Intent::EnterShort { stop_distance }
        } else {
            Intent::NoAction
        })
    }
}
