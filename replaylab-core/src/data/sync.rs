//! Timeframe Synchronizer: the only gateway to higher-timeframe bars.
//!
//! Every lookup re-checks that the served bar closed at or before the open
//! time of the requesting base bar. A failed check is a defect and surfaces
//! as `LookAheadViolation` instead of being corrected.

use crate::domain::{Bar, Timeframe};
use crate::error::CoreError;

use super::store::{BarStore, TimeframeSeries};

/// Read-only view over a `BarStore` answering "what was closed as of base bar i".
#[derive(Debug, Clone, Copy)]
pub struct TimeframeSync<'a> {
    store: &'a BarStore,
}

impl<'a> TimeframeSync<'a> {
    pub fn new(store: &'a BarStore) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &'a BarStore {
        self.store
    }

    /// Latest bar of `timeframe` whose close is <= base bar `as_of`'s open
    /// time, or `None` during warm-up.
    pub fn get_closed_bar(
        &self,
        timeframe: Timeframe,
        as_of: usize,
    ) -> Result<Option<&'a Bar>, CoreError> {
        let history = self.closed_history(timeframe, as_of)?;
        Ok(history.last())
    }

    /// Every closed bar of `timeframe` as of base bar `as_of`, oldest first.
    pub fn closed_history(
        &self,
        timeframe: Timeframe,
        as_of: usize,
    ) -> Result<&'a [Bar], CoreError> {
        let series = self.series(timeframe)?;
        let base_bars = self.store.base_bars();
        let base_bar = base_bars.get(as_of).ok_or(CoreError::IndexOutOfRange {
            index: as_of,
            len: base_bars.len(),
        })?;
        let count = series
            .closed_count(as_of)
            .ok_or(CoreError::IndexOutOfRange {
                index: as_of,
                len: base_bars.len(),
            })?;
        let history = &series.bars()[..count];
        if let Some(last) = history.last() {
            let bar_close = timeframe.close_time(last.open_time);
            if bar_close > base_bar.open_time {
                return Err(CoreError::LookAheadViolation {
                    timeframe,
                    base_index: as_of,
                    bar_close,
                    base_time: base_bar.open_time,
                });
            }
        }
        Ok(history)
    }

    /// Number of `timeframe` bars visible at base bar `as_of`.
    pub fn closed_count(&self, timeframe: Timeframe, as_of: usize) -> Result<usize, CoreError> {
        Ok(self.closed_history(timeframe, as_of)?.len())
    }

    fn series(&self, timeframe: Timeframe) -> Result<&'a TimeframeSeries, CoreError> {
        self.store
            .series(timeframe)
            .ok_or(CoreError::MissingTimeframe(timeframe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BaseSeries;
    use chrono::{Duration, TimeZone, Utc};

    fn store(n: usize) -> BarStore {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Bar {
                    open_time: t0 + Duration::minutes(15 * i as i64),
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 1.0,
                }
            })
            .collect();
        let base = BaseSeries::new("X", Timeframe::M15, bars).unwrap();
        BarStore::build(base, &[Timeframe::H1, Timeframe::H4]).unwrap()
    }

    #[test]
    fn warmup_returns_none() {
        let s = store(20);
        let sync = TimeframeSync::new(&s);
        for i in 0..4 {
            assert!(sync.get_closed_bar(Timeframe::H1, i).unwrap().is_none());
        }
        for i in 0..16 {
            assert!(sync.get_closed_bar(Timeframe::H4, i).unwrap().is_none());
        }
    }

    #[test]
    fn hour_becomes_visible_at_next_hour_open() {
        let s = store(20);
        let sync = TimeframeSync::new(&s);
        let bar = sync.get_closed_bar(Timeframe::H1, 4).unwrap().unwrap();
        // The first hour aggregates base bars 0..=3; close = bar 3's close.
        assert_eq!(bar.close, 103.0);
        assert_eq!(bar.high, 104.0);
        // Still the first hour while the second is forming.
        let same = sync.get_closed_bar(Timeframe::H1, 7).unwrap().unwrap();
        assert_eq!(same, bar);
        assert_eq!(sync.closed_history(Timeframe::H1, 8).unwrap().len(), 2);
    }

    #[test]
    fn missing_timeframe_is_an_error() {
        let s = store(8);
        let sync = TimeframeSync::new(&s);
        assert!(matches!(
            sync.get_closed_bar(Timeframe::D1, 0),
            Err(CoreError::MissingTimeframe(Timeframe::D1))
        ));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let s = store(8);
        let sync = TimeframeSync::new(&s);
        assert!(matches!(
            sync.get_closed_bar(Timeframe::H1, 8),
            Err(CoreError::IndexOutOfRange { index: 8, len: 8 })
        ));
    }
}
