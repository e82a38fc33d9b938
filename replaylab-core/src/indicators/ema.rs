//! Exponential Moving Average (EMA).
//!
//! EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[period-1] = SMA of the first `period` values.

/// Streaming EMA with SMA seed.
#[derive(Debug, Clone)]
pub struct EmaState {
    period: usize,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.value = match self.value {
            Some(prev) => {
                let alpha = 2.0 / (self.period as f64 + 1.0);
                Some(alpha * x + (1.0 - alpha) * prev)
            }
            None => {
                self.seed_sum += x;
                self.seed_count += 1;
                (self.seed_count == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        self.value
    }
}
