//! Causal per-bar signals the engine hands to the risk manager and adapters.

use crate::domain::Bar;
use crate::indicators::{AtrState, RollingMean};
use crate::risk::{BarSignals, ClimaxConfig, RiskConfig};

/// Volume spike on a stalled close.
///
/// A bar is a climax when its volume exceeds `volume_mult` × the mean volume
/// of the last `lookback` bars, this one included, and its close moved less
/// than `stall_pct` from the previous close.
#[derive(Debug, Clone)]
pub struct VolumeClimax {
    config: ClimaxConfig,
    volume_mean: RollingMean,
    prev_close: Option<f64>,
}

impl VolumeClimax {
    pub fn new(config: ClimaxConfig) -> Self {
        Self {
            volume_mean: RollingMean::new(config.lookback),
            config,
            prev_close: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> bool {
        let spike = matches!(
            self.volume_mean.update(bar.volume),
            Some(avg) if avg > 0.0 && bar.volume > avg * self.config.volume_mult
        );
        let stalled = self
            .prev_close
            .map_or(false, |pc| ((bar.close - pc) / pc).abs() < self.config.stall_pct);
        self.prev_close = Some(bar.close);
        spike && stalled
    }
}

/// ATR plus climax detection, fed once per base bar.
#[derive(Debug, Clone)]
pub struct SignalTracker {
    atr: AtrState,
    climax: Option<VolumeClimax>,
}

impl SignalTracker {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            atr: AtrState::new(config.atr_period),
            climax: config.climax.clone().map(VolumeClimax::new),
        }
    }

    /// ATR as of this bar's close and the risk manager's bar signals.
    pub fn update(&mut self, bar: &Bar, bar_index: usize) -> (Option<f64>, BarSignals) {
        let atr = self.atr.update(bar);
        let volume_climax = self.climax.as_mut().map_or(false, |c| c.update(bar));
        (
            atr,
            BarSignals {
                bar_index,
                volume_climax,
            },
        )
    }
}
