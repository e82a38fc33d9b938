//! Boundary validation for the base-resolution input series.
//!
//! Everything downstream assumes finite, sane bars with strictly increasing
//! open times. Violations are rejected here, before any replay starts.

use tracing::debug;

use crate::domain::{Bar, Timeframe};
use crate::error::CoreError;

/// A validated base-resolution series for one symbol. Only constructible
/// through [`BaseSeries::new`].
#[derive(Debug, Clone)]
pub struct BaseSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BaseSeries {
    /// Validate and wrap a bar sequence.
    ///
    /// Fails with `MalformedBar` on a non-finite or out-of-order OHLC record
    /// and with `DataGap` on a duplicate or decreasing timestamp.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, CoreError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(CoreError::EmptySeries(format!("no bars for {symbol}")));
        }
        validate_bars(&bars)?;
        debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            bars = bars.len(),
            "validated base series"
        );
        Ok(Self {
            symbol,
            timeframe,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Check every bar for sanity and the sequence for strict time ordering.
pub fn validate_bars(bars: &[Bar]) -> Result<(), CoreError> {
    for (index, bar) in bars.iter().enumerate() {
        if let Some(reason) = bar.defect() {
            return Err(CoreError::MalformedBar { index, reason });
        }
        if index > 0 {
            let previous = bars[index - 1].open_time;
            if bar.open_time <= previous {
                return Err(CoreError::DataGap {
                    index,
                    previous,
                    current: bar.open_time,
                });
            }
        }
    }
    Ok(())
}
