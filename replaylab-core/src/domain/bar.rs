//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for one timeframe slot.
///
/// `open_time` is the inclusive start of the slot; the bar's close instant is
/// `open_time + timeframe duration`, which the bar itself does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is non-finite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// low <= open,close <= high, positive prices, non-negative volume.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    /// Describe the first sanity failure, if any.
    pub fn defect(&self) -> Option<String> {
        if self.is_void() {
            return Some(format!(
                "non-finite field (o={}, h={}, l={}, c={}, v={})",
                self.open, self.high, self.low, self.close, self.volume
            ));
        }
        if self.volume < 0.0 {
            return Some(format!("negative volume {}", self.volume));
        }
        if self.low <= 0.0 {
            return Some(format!("non-positive low {}", self.low));
        }
        if !self.is_sane() {
            return Some(format!(
                "OHLC out of order (o={}, h={}, l={}, c={})",
                self.open, self.high, self.low, self.close
            ));
        }
        None
    }
}
