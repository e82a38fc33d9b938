//! Bar Store: the base series plus every derived timeframe, built once.
//!
//! The store is immutable after `build` and holds no interior mutability, so
//! one instance can be shared by reference across parallel trials.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;

use super::ingest::BaseSeries;
use super::resample::{closed_counts, resample};
use crate::domain::{Bar, Timeframe};
use crate::error::CoreError;

/// One derived timeframe and its per-base-index visibility table.
#[derive(Debug, Clone)]
pub struct TimeframeSeries {
    timeframe: Timeframe,
    bars: Vec<Bar>,
    /// `closed[i]` = number of bars closed at or before base bar `i`'s open.
    closed: Vec<usize>,
}

impl TimeframeSeries {
    fn build(base: &[Bar], timeframe: Timeframe) -> Self {
        let bars = resample(base, timeframe);
        let closed = closed_counts(base, &bars, timeframe);
        Self {
            timeframe,
            bars,
            closed,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub(crate) fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub(crate) fn closed_count(&self, base_index: usize) -> Option<usize> {
        self.closed.get(base_index).copied()
    }
}

#[derive(Debug, Clone)]
pub struct BarStore {
    base: BaseSeries,
    series: BTreeMap<Timeframe, TimeframeSeries>,
}

impl BarStore {
    /// Aggregate every requested timeframe from the base series.
    ///
    /// Each timeframe must be a whole multiple of the base timeframe with a
    /// compatible anchor, otherwise `IncompatibleTimeframe`.
    pub fn build(base: BaseSeries, timeframes: &[Timeframe]) -> Result<Self, CoreError> {
        let mut series = BTreeMap::new();
        for &tf in timeframes {
            if !tf.is_derivable_from(base.timeframe()) {
                return Err(CoreError::IncompatibleTimeframe {
                    base: base.timeframe(),
                    requested: tf,
                });
            }
            let built = TimeframeSeries::build(base.bars(), tf);
            debug!(
                symbol = base.symbol(),
                timeframe = %tf,
                bars = built.len(),
                "built timeframe series"
            );
            series.insert(tf, built);
        }
        Ok(Self { base, series })
    }

    /// Rebuild a store from the base bars in `range` only.
    ///
    /// Bars outside the range never reach the aggregation, so a higher
    /// timeframe bucket straddling the range boundary is built from the
    /// in-range members alone.
    pub fn slice(&self, range: Range<usize>) -> Result<Self, CoreError> {
        if range.start >= range.end || range.end > self.base.len() {
            return Err(CoreError::IndexOutOfRange {
                index: range.end,
                len: self.base.len(),
            });
        }
        let bars = self.base.bars()[range].to_vec();
        let base = BaseSeries::new(self.base.symbol(), self.base.timeframe(), bars)?;
        let timeframes: Vec<Timeframe> = self.series.keys().copied().collect();
        Self::build(base, &timeframes)
    }

    pub fn symbol(&self) -> &str {
        self.base.symbol()
    }

    pub fn base_timeframe(&self) -> Timeframe {
        self.base.timeframe()
    }

    pub fn base_bars(&self) -> &[Bar] {
        self.base.bars()
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Timeframes available through the synchronizer.
    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.series.keys().copied().collect()
    }

    pub(crate) fn series(&self, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        self.series.get(&timeframe)
    }
}
