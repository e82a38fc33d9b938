//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period). TR needs a previous close,
//! so the first bar only primes the state and the first ATR lands on bar
//! `period` (zero-based), seeded with the mean of the first `period` ranges.

use crate::domain::Bar;

fn range_with_prev(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Streaming Wilder ATR.
#[derive(Debug, Clone)]
pub struct AtrState {
    period: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl AtrState {
    /// A zero period is clamped to 1.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        if let Some(pc) = self.prev_close {
            let tr = range_with_prev(bar, pc);
            self.value = match self.value {
                Some(prev) => {
                    let alpha = 1.0 / self.period as f64;
                    Some(alpha * tr + (1.0 - alpha) * prev)
                }
                None => {
                    self.seed_sum += tr;
                    self.seed_count += 1;
                    (self.seed_count == self.period).then(|| self.seed_sum / self.period as f64)
                }
            };
        }
        self.prev_close = Some(bar.close);
        self.value
    }
}
