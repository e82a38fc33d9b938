//! Strategy adapters: the pluggable decision function.
//!
//! The engine calls `decide` exactly once per base bar, at that bar's close.
//! The context exposes base bars up to and including the current one, and
//! higher-timeframe bars only through the synchronizer, so an adapter has no
//! path to data that was not available at the decision time.

pub mod donchian_breakout;
pub mod htf_trend;
pub mod registry;

pub use donchian_breakout::DonchianBreakout;
pub use htf_trend::HtfTrend;
pub use registry::StrategyRegistry;

use serde::{Deserialize, Serialize};

use crate::data::TimeframeSync;
use crate::domain::{Bar, ExitReason, Position, Timeframe};
use crate::error::CoreError;

/// What the adapter wants done after the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    NoAction,
    EnterLong { stop_distance: f64 },
    EnterShort { stop_distance: f64 },
    ExitNow(ExitReason),
}

impl Intent {
    pub fn is_entry(&self) -> bool {
        matches!(self, Intent::EnterLong { .. } | Intent::EnterShort { .. })
    }
}

/// Everything an adapter may see at base bar `index`.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    index: usize,
    sync: TimeframeSync<'a>,
    position: Option<&'a Position>,
    atr: Option<f64>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        index: usize,
        sync: TimeframeSync<'a>,
        position: Option<&'a Position>,
        atr: Option<f64>,
    ) -> Self {
        Self {
            index,
            sync,
            position,
            atr,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The base bar that just closed.
    pub fn bar(&self) -> &'a Bar {
        &self.history()[self.index]
    }

    /// Base bars `0..=index`.
    pub fn history(&self) -> &'a [Bar] {
        &self.sync.store().base_bars()[..=self.index]
    }

    pub fn position(&self) -> Option<&'a Position> {
        self.position
    }

    /// ATR of the base series as of this bar, once warmed up.
    pub fn atr(&self) -> Option<f64> {
        self.atr
    }

    /// Latest closed bar of `timeframe`.
    pub fn htf(&self, timeframe: Timeframe) -> Result<Option<&'a Bar>, CoreError> {
        self.sync.get_closed_bar(timeframe, self.index)
    }

    /// All closed bars of `timeframe`, oldest first.
    pub fn htf_history(&self, timeframe: Timeframe) -> Result<&'a [Bar], CoreError> {
        self.sync.closed_history(timeframe, self.index)
    }
}

/// A strategy's decision function.
///
/// Implementations may keep incremental indicator state, but that state must
/// only be fed from the contexts passed to `decide`.
pub trait StrategyAdapter: Send {
    fn name(&self) -> &str;

    /// Errors (e.g. a look-ahead violation from the synchronizer) halt the replay.
    fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Intent, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BarStore, BaseSeries};
    use chrono::{Duration, TimeZone, Utc};

    struct Always(Intent);

    impl StrategyAdapter for Always {
        fn name(&self) -> &str {
            "always"
        }

        fn decide(&mut self, _ctx: &StrategyContext<'_>) -> Result<Intent, CoreError> {
            Ok(self.0)
        }
    }

    fn store() -> BarStore {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..8)
            .map(|i| Bar {
                open_time: t0 + Duration::minutes(15 * i),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0 + i as f64 * 0.1,
                volume: 1.0,
            })
            .collect();
        BarStore::build(
            BaseSeries::new("X", Timeframe::M15, bars).unwrap(),
            &[Timeframe::H1],
        )
        .unwrap()
    }

    #[test]
    fn context_history_ends_at_current_bar() {
        let s = store();
        let ctx = StrategyContext::new(3, TimeframeSync::new(&s), None, None);
        assert_eq!(ctx.history().len(), 4);
        assert_eq!(ctx.bar().close, s.base_bars()[3].close);
        assert!(ctx.htf(Timeframe::H1).unwrap().is_none());
        let later = StrategyContext::new(4, TimeframeSync::new(&s), None, None);
        assert!(later.htf(Timeframe::H1).unwrap().is_some());
    }

    #[test]
    fn context_serves_only_closed_htf_bars() {
        let s = store();
        let mut seen = 0;
        for index in 0..s.len() {
            let ctx = StrategyContext::new(index, TimeframeSync::new(&s), None, None);
            let history = ctx.htf_history(Timeframe::H1).unwrap();
            assert!(history.len() >= seen);
            seen = history.len();
            for bar in history {
                assert!(Timeframe::H1.close_time(bar.open_time) <= ctx.bar().open_time);
            }
            assert_eq!(ctx.htf(Timeframe::H1).unwrap(), history.last());
        }
        assert_eq!(seen, 1);
    }

    #[test]
    fn context_rejects_timeframe_not_in_store() {
        let s = store();
        let ctx = StrategyContext::new(7, TimeframeSync::new(&s), None, None);
        assert!(matches!(
            ctx.htf(Timeframe::H4),
            Err(CoreError::MissingTimeframe(Timeframe::H4))
        ));
        assert!(ctx.htf_history(Timeframe::H4).is_err());
    }

    #[test]
    fn adapter_is_object_safe() {
        let s = store();
        let mut boxed: Box<dyn StrategyAdapter> = Box::new(Always(Intent::NoAction));
        let ctx = StrategyContext::new(0, TimeframeSync::new(&s), None, None);
        assert_eq!(boxed.decide(&ctx).unwrap(), Intent::NoAction);
        assert!(Intent::EnterLong { stop_distance: 1.0 }.is_entry());
        assert!(!Intent::ExitNow(ExitReason::TrendReversal).is_entry());
    }
}
