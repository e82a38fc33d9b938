//! Replay engine integration tests.
//!
//! A scripted adapter emits fixed intents at fixed bar indices so each test
//! pins down one routing rule: fill timing, cooldown, costs, rejections and
//! halting on adapter errors.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};

use replaylab_core::data::{BarStore, BaseSeries};
use replaylab_core::domain::{Bar, ExitReason, ParameterSet, Timeframe};
use replaylab_core::engine::{EngineConfig, FillModel, ReplayEngine, ReplayError};
use replaylab_core::risk::RiskManager;
use replaylab_core::strategy::{HtfTrend, Intent, StrategyAdapter, StrategyContext};
use replaylab_core::CoreError;

struct Script {
    intents: BTreeMap<usize, Intent>,
    fail_at: Option<usize>,
}

impl Script {
    fn new(intents: &[(usize, Intent)]) -> Self {
        Self {
            intents: intents.iter().copied().collect(),
            fail_at: None,
        }
    }
}

impl StrategyAdapter for Script {
    fn name(&self) -> &str {
        "script"
    }

    fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Intent, CoreError> {
        if self.fail_at == Some(ctx.index()) {
            return Err(CoreError::invalid_param("script", "scripted failure"));
        }
        Ok(self
            .intents
            .get(&ctx.index())
            .copied()
            .unwrap_or(Intent::NoAction))
    }
}

/// Adapter that asks for a timeframe the store was not built with.
struct WantsDaily;

impl StrategyAdapter for WantsDaily {
    fn name(&self) -> &str {
        "wants_daily"
    }

    fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Intent, CoreError> {
        ctx.htf(Timeframe::D1)?;
        Ok(Intent::NoAction)
    }
}

fn ohlc(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        open_time: Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap() + Duration::hours(i as i64),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// `n` quiet hourly bars around 100: never touch a 95 stop or a 105 target.
fn flat_store(n: usize) -> BarStore {
    let bars = (0..n).map(|i| ohlc(i, 100.0, 101.0, 99.0, 100.0)).collect();
    store_from(bars)
}

fn store_from(bars: Vec<Bar>) -> BarStore {
    let base = BaseSeries::new("TEST", Timeframe::H1, bars).unwrap();
    BarStore::build(base, &[Timeframe::H4]).unwrap()
}

fn engine(fill_model: FillModel, params: &ParameterSet) -> ReplayEngine {
    let config = EngineConfig {
        fill_model,
        ..EngineConfig::frictionless(10_000.0)
    };
    ReplayEngine::new(config, RiskManager::from_params(params).unwrap())
}

const LONG: Intent = Intent::EnterLong { stop_distance: 5.0 };
const EXIT: Intent = Intent::ExitNow(ExitReason::TrendReversal);

#[test]
fn cooldown_rejects_until_seventh_bar_after_exit() {
    let params = ParameterSet::new().with("cooldown_bars", 7.0);
    let mut intents = vec![(0, LONG), (2, EXIT)];
    intents.extend((3..=9).map(|i| (i, LONG)));
    let mut script = Script::new(&intents);

    let result = engine(FillModel::CurrentClose, &params)
        .run(&flat_store(15), &mut script)
        .unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_index, 2);
    assert_eq!(result.trades[0].reason, ExitReason::TrendReversal);
    // Bars 3..=8 are inside the cooldown; bar 9 is the seventh bar after the exit.
    assert_eq!(result.rejections.cooldown, 6);
    let open = result.open_position.expect("re-entry on bar 9");
    assert_eq!(open.entry_index, 9);
}

#[test]
fn zero_cooldown_allows_reentry_next_bar() {
    let mut script = Script::new(&[(0, LONG), (2, EXIT), (3, LONG)]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&flat_store(6), &mut script)
        .unwrap();
    assert_eq!(result.rejections.cooldown, 0);
    assert_eq!(result.open_position.map(|p| p.entry_index), Some(3));
}

#[test]
fn next_open_fills_on_following_bar() {
    let bars = vec![
        ohlc(0, 100.0, 101.0, 99.0, 100.0),
        ohlc(1, 100.5, 101.0, 99.5, 100.2),
        ohlc(2, 100.2, 101.0, 99.5, 100.8),
        ohlc(3, 100.9, 101.5, 100.0, 101.0),
    ];
    let mut script = Script::new(&[(0, LONG), (2, EXIT)]);
    let result = engine(FillModel::NextOpen, &ParameterSet::new())
        .run(&store_from(bars), &mut script)
        .unwrap();

    assert_eq!(result.trades.len(), 1);
    let t = &result.trades[0];
    assert_eq!(t.entry_index, 1);
    assert_eq!(t.entry_price, 100.5);
    assert_eq!(t.exit_index, 3);
    assert_eq!(t.exit_price, 100.9);
    assert_relative_eq!(t.fraction, 1.0);
}

#[test]
fn current_close_fills_on_deciding_bar() {
    let mut script = Script::new(&[(1, LONG)]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&flat_store(3), &mut script)
        .unwrap();
    let open = result.open_position.unwrap();
    assert_eq!(open.entry_index, 1);
    assert_eq!(open.entry_price(), 100.0);
    assert_relative_eq!(open.size(), 60.0);
}

#[test]
fn pending_entry_on_last_bar_is_dropped() {
    let mut script = Script::new(&[(4, LONG)]);
    let result = engine(FillModel::NextOpen, &ParameterSet::new())
        .run(&flat_store(5), &mut script)
        .unwrap();
    assert!(result.open_position.is_none());
    assert_eq!(result.rejections.no_next_bar, 1);
    assert_eq!(result.final_equity, 10_000.0);
}

#[test]
fn invalid_stop_distance_skips_entry() {
    let mut script = Script::new(&[(1, Intent::EnterLong { stop_distance: 0.0 })]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&flat_store(4), &mut script)
        .unwrap();
    assert!(result.trades.is_empty());
    assert!(result.open_position.is_none());
    assert_eq!(result.rejections.invalid_risk, 1);
}

#[test]
fn second_entry_while_open_is_rejected() {
    let mut script = Script::new(&[(0, LONG), (1, LONG), (2, Intent::EnterShort { stop_distance: 5.0 })]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&flat_store(4), &mut script)
        .unwrap();
    assert_eq!(result.rejections.already_in_position, 2);
    assert_eq!(result.open_position.map(|p| p.entry_index), Some(0));
}

#[test]
fn exit_while_flat_is_counted() {
    let mut script = Script::new(&[(1, EXIT)]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&flat_store(3), &mut script)
        .unwrap();
    assert_eq!(result.rejections.nothing_to_exit, 1);
}

#[test]
fn commission_charged_on_both_fills() {
    let config = EngineConfig {
        fill_model: FillModel::CurrentClose,
        commission_rate: 0.001,
        ..EngineConfig::frictionless(10_000.0)
    };
    let rm = RiskManager::from_params(&ParameterSet::new()).unwrap();
    let mut script = Script::new(&[(0, LONG), (1, EXIT)]);
    let result = ReplayEngine::new(config, rm)
        .run(&flat_store(3), &mut script)
        .unwrap();

    // 60 units at 100 in and out: 6.0 + 6.0
    let t = &result.trades[0];
    assert_relative_eq!(t.gross_pnl, 0.0);
    assert_relative_eq!(t.commission, 12.0, epsilon = 1e-9);
    assert_relative_eq!(result.final_equity, 9_988.0, epsilon = 1e-9);
}

#[test]
fn slippage_worsens_entry_price() {
    let config = EngineConfig {
        fill_model: FillModel::CurrentClose,
        slippage_bps: 10.0,
        ..EngineConfig::frictionless(10_000.0)
    };
    let rm = RiskManager::from_params(&ParameterSet::new()).unwrap();
    let mut script = Script::new(&[(0, LONG), (1, Intent::NoAction)]);
    let result = ReplayEngine::new(config, rm)
        .run(&flat_store(2), &mut script)
        .unwrap();
    let open = result.open_position.unwrap();
    assert_relative_eq!(open.entry_price(), 100.1, epsilon = 1e-9);
}

#[test]
fn partial_ladder_through_the_engine() {
    let bars = vec![
        ohlc(0, 99.0, 100.5, 98.5, 100.0),
        ohlc(1, 101.0, 105.5, 100.5, 104.0),
        ohlc(2, 104.0, 110.5, 103.0, 109.0),
        ohlc(3, 108.0, 108.5, 104.0, 104.5),
        ohlc(4, 104.5, 105.0, 103.0, 104.0),
    ];
    let mut script = Script::new(&[(0, LONG)]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&store_from(bars), &mut script)
        .unwrap();

    let summary: Vec<(ExitReason, f64)> = result
        .trades
        .iter()
        .map(|t| (t.reason, t.exit_price))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ExitReason::TakeProfitPartial, 105.0),
            (ExitReason::TakeProfitPartial, 110.0),
            (ExitReason::StopLoss, 105.0),
        ]
    );
    let fractions: Vec<f64> = result.trades.iter().map(|t| t.fraction).collect();
    assert_relative_eq!(fractions[0], 0.3);
    assert_relative_eq!(fractions[1], 0.3);
    assert_relative_eq!(fractions[2], 0.4, epsilon = 1e-12);
    assert_relative_eq!(result.final_equity, 10_390.0, epsilon = 1e-9);
    assert!(result.open_position.is_none());
}

#[test]
fn equity_curve_marks_open_position() {
    let bars = vec![
        ohlc(0, 100.0, 101.0, 99.0, 100.0),
        ohlc(1, 100.0, 103.0, 99.5, 102.0),
    ];
    let mut script = Script::new(&[(0, LONG)]);
    let result = engine(FillModel::CurrentClose, &ParameterSet::new())
        .run(&store_from(bars), &mut script)
        .unwrap();
    assert_eq!(result.equity_curve.len(), 2);
    assert_relative_eq!(result.equity_curve[0].equity, 10_000.0);
    assert_relative_eq!(result.equity_curve[1].equity, 10_120.0);
    assert_relative_eq!(result.final_equity, 10_120.0);
}

#[test]
fn adapter_error_halts_with_bar_index() {
    let mut script = Script::new(&[]);
    script.fail_at = Some(3);
    let err = engine(FillModel::NextOpen, &ParameterSet::new())
        .run(&flat_store(6), &mut script)
        .unwrap_err();
    assert_eq!(err.bar_index(), Some(3));
    assert!(err.to_string().contains("base bar 3"));
}

#[test]
fn missing_timeframe_halts_replay() {
    let err = engine(FillModel::NextOpen, &ParameterSet::new())
        .run(&flat_store(3), &mut WantsDaily)
        .unwrap_err();
    assert!(matches!(
        err,
        ReplayError::Halted {
            index: 0,
            source: CoreError::MissingTimeframe(Timeframe::D1),
        }
    ));
}

#[test]
fn invalid_engine_config_is_rejected_up_front() {
    let config = EngineConfig {
        initial_equity: -1.0,
        ..EngineConfig::default()
    };
    let rm = RiskManager::from_params(&ParameterSet::new()).unwrap();
    let err = ReplayEngine::new(config, rm)
        .run(&flat_store(3), &mut Script::new(&[]))
        .unwrap_err();
    assert!(matches!(err, ReplayError::Config(_)));
    assert_eq!(err.bar_index(), None);
}

#[test]
fn htf_trend_replay_is_deterministic_and_conserves_fractions() {
    let mut close = 100.0_f64;
    let bars: Vec<Bar> = (0..600)
        .map(|i| {
            let wave = ((i as f64) / 40.0).sin() * 1.2 + ((i * 7919 % 13) as f64 - 6.0) * 0.08;
            let open = close;
            close = (close + wave).max(5.0);
            ohlc(i, open, open.max(close) + 0.6, open.min(close) - 0.6, close)
        })
        .collect();
    let store = store_from(bars);
    let params = ParameterSet::new()
        .with("fast_period", 10.0)
        .with("trend_period", 8.0)
        .with("trend_timeframe_minutes", 240.0);

    let run = || {
        let mut strategy = HtfTrend::from_params(&params).unwrap();
        engine(FillModel::NextOpen, &params)
            .run(&store, &mut strategy)
            .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.final_equity, b.final_equity);
    assert_eq!(a.equity_curve.len(), 600);

    let mut by_entry: BTreeMap<usize, f64> = BTreeMap::new();
    for t in &a.trades {
        *by_entry.entry(t.entry_index).or_default() += t.fraction;
        assert!(t.exit_index >= t.entry_index);
    }
    let still_open = a.open_position.as_ref().map(|p| p.entry_index);
    for (entry, total) in by_entry {
        if Some(entry) != still_open {
            assert!((total - 1.0).abs() < 1e-9, "position at {entry} closed {total}");
        }
    }
}
