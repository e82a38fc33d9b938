//! Risk manager integration tests: sizing, same-bar precedence, stop ratchet
//! monotonicity, fraction conservation and the full partial-exit ladder.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use replaylab_core::domain::{Bar, Direction, ExitReason, ParameterSet, Position, TradeRecord};
use replaylab_core::risk::{size_position, BarSignals, EntryFill, RiskConfig, RiskManager};
use replaylab_core::CoreError;

fn t(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::hours(i)
}

fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        open_time: t(i),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

fn open_at(rm: &RiskManager, direction: Direction, entry: f64, stop_distance: f64) -> Position {
    let fill = EntryFill {
        price: entry,
        time: t(0),
        bar_index: 0,
        atr: None,
    };
    rm.open("TEST", direction, fill, stop_distance, 0.03, 10_000.0)
        .unwrap()
}

fn step(rm: &RiskManager, pos: &mut Position, b: &Bar, i: usize) -> Vec<TradeRecord> {
    rm.on_bar(
        pos,
        b,
        BarSignals {
            bar_index: i,
            volume_climax: false,
        },
    )
}

#[test]
fn sizing_is_dollar_risk_over_stop() {
    assert_eq!(size_position(10_000.0, 150.0, 0.03).unwrap(), 2.0);
}

#[test]
fn sizing_rejects_non_positive_inputs() {
    for (stop, risk) in [(0.0, 0.03), (-1.0, 0.03), (150.0, 0.0), (150.0, -0.01)] {
        let err = size_position(10_000.0, stop, risk).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRiskInput { .. }), "{err}");
    }
}

#[test]
fn stop_wins_same_bar_conflict_with_target() {
    let rm = RiskManager::new(RiskConfig::default());
    let mut pos = open_at(&rm, Direction::Long, 100.0, 5.0);
    // Range 94..106 crosses both the 95 stop and the 105 1R target.
    let records = step(&rm, &mut pos, &bar(1, 100.0, 106.0, 94.0, 100.0), 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, ExitReason::StopLoss);
    assert_eq!(records[0].exit_price, 95.0);
    assert_relative_eq!(records[0].fraction, 1.0);
    assert_relative_eq!(records[0].r_multiple, -1.0);
    assert!(pos.is_closed());
}

#[test]
fn partial_ladder_then_locked_stop() {
    // equity 10k, long at 100, R = 5, schedule 30/30/30.
    let params = ParameterSet::new().with("partial_schedule", vec![(1.0, 0.3), (2.0, 0.3), (3.0, 0.3)]);
    let rm = RiskManager::from_params(&params).unwrap();
    let mut pos = open_at(&rm, Direction::Long, 100.0, 5.0);
    assert_relative_eq!(pos.size(), 60.0);

    let first = step(&rm, &mut pos, &bar(1, 101.0, 105.5, 100.5, 104.0), 1);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].reason, ExitReason::TakeProfitPartial);
    assert_eq!(first[0].exit_price, 105.0);
    assert_relative_eq!(first[0].fraction, 0.3);
    assert_relative_eq!(pos.current_stop(), 100.0);

    let second = step(&rm, &mut pos, &bar(2, 104.0, 110.5, 103.0, 109.0), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].reason, ExitReason::TakeProfitPartial);
    assert_eq!(second[0].exit_price, 110.0);
    assert_relative_eq!(second[0].fraction, 0.3);
    assert_relative_eq!(pos.current_stop(), 105.0);

    let last = step(&rm, &mut pos, &bar(3, 108.0, 108.5, 104.0, 104.5), 3);
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].reason, ExitReason::StopLoss);
    assert_eq!(last[0].exit_price, 105.0);
    assert_relative_eq!(last[0].fraction, 0.4, epsilon = 1e-12);
    assert!(pos.is_closed());

    let pnl: f64 = first.iter().chain(&second).chain(&last).map(|r| r.pnl).sum();
    // 18 × 5 + 18 × 10 + 24 × 5
    assert_relative_eq!(pnl, 390.0, epsilon = 1e-9);
    assert_relative_eq!(pos.realized_pnl, 390.0, epsilon = 1e-9);
}

#[test]
fn gap_through_every_target_fills_all_rungs_then_trails() {
    let rm = RiskManager::new(RiskConfig::default());
    let mut pos = open_at(&rm, Direction::Long, 100.0, 5.0);
    let records = step(&rm, &mut pos, &bar(1, 100.0, 120.0, 99.0, 118.0), 1);
    let prices: Vec<f64> = records.iter().map(|r| r.exit_price).collect();
    assert_eq!(prices, vec![105.0, 110.0, 115.0]);
    assert_relative_eq!(pos.remaining_fraction(), 0.1, epsilon = 1e-12);
    // Locked at the 2R price, then trailed: 120 - (5 / 2.0) × 3.0 = 112.5.
    assert_relative_eq!(pos.current_stop(), 112.5);
    let exit = step(&rm, &mut pos, &bar(2, 118.0, 119.0, 112.0, 113.0), 2);
    assert_eq!(exit.len(), 1);
    assert_eq!(exit[0].reason, ExitReason::TrailingStop);
}

#[test]
fn short_position_mirrors_long() {
    let rm = RiskManager::new(RiskConfig::default());
    let mut pos = open_at(&rm, Direction::Short, 100.0, 5.0);
    assert_relative_eq!(pos.current_stop(), 105.0);
    let r = step(&rm, &mut pos, &bar(1, 99.0, 99.5, 94.5, 95.0), 1);
    assert_eq!(r.len(), 1);
    assert_eq!(r[0].exit_price, 95.0);
    assert_relative_eq!(r[0].r_multiple, 1.0);
    assert!(r[0].pnl > 0.0);
    assert_relative_eq!(pos.current_stop(), 100.0);
}

#[test]
fn time_exit_liquidates_at_close() {
    let params = ParameterSet::new().with("time_exit_bars", 2.0);
    let rm = RiskManager::from_params(&params).unwrap();
    let mut pos = open_at(&rm, Direction::Long, 100.0, 5.0);
    assert!(step(&rm, &mut pos, &bar(1, 100.0, 101.0, 99.0, 100.5), 1).is_empty());
    assert!(step(&rm, &mut pos, &bar(2, 100.5, 101.0, 99.0, 100.2), 2).is_empty());
    let r = step(&rm, &mut pos, &bar(3, 100.2, 101.0, 99.0, 100.7), 3);
    assert_eq!(r.len(), 1);
    assert_eq!(r[0].reason, ExitReason::TimeExit);
    assert_eq!(r[0].exit_price, 100.7);
    assert!(pos.is_closed());
}

#[test]
fn malformed_schedule_is_rejected() {
    let over = ParameterSet::new().with("partial_schedule", vec![(1.0, 0.6), (2.0, 0.6)]);
    assert!(RiskManager::from_params(&over).is_err());
    let descending = ParameterSet::new().with("partial_schedule", vec![(2.0, 0.3), (1.0, 0.3)]);
    assert!(RiskManager::from_params(&descending).is_err());
    let wrong_type = ParameterSet::new().with("risk_pct", true);
    assert!(RiskManager::from_params(&wrong_type).is_err());
}

fn arb_path() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    // (close change, upper wick, lower wick)
    prop::collection::vec((-4.0..4.0_f64, 0.0..3.0_f64, 0.0..3.0_f64), 1..80)
}

fn path_bars(path: &[(f64, f64, f64)]) -> Vec<Bar> {
    let mut close = 100.0_f64;
    path.iter()
        .enumerate()
        .map(|(i, &(change, up, down))| {
            let open = close;
            close = (close + change).max(20.0);
            let high = open.max(close) + up;
            let low = (open.min(close) - down).max(1.0);
            bar(i as i64 + 1, open, high, low, close)
        })
        .collect()
}

proptest! {
    #[test]
    fn stop_only_moves_in_profit_direction(
        path in arb_path(),
        short in prop::bool::ANY,
        stop_distance in 1.0..10.0_f64,
    ) {
        let direction = if short { Direction::Short } else { Direction::Long };
        let rm = RiskManager::new(RiskConfig::default());
        let mut pos = open_at(&rm, direction, 100.0, stop_distance);
        let mut prev = pos.current_stop();
        for (i, b) in path_bars(&path).iter().enumerate() {
            step(&rm, &mut pos, b, i + 1);
            let now = pos.current_stop();
            match direction {
                Direction::Long => prop_assert!(now >= prev, "long stop fell {prev} -> {now}"),
                Direction::Short => prop_assert!(now <= prev, "short stop rose {prev} -> {now}"),
            }
            prev = now;
            if pos.is_closed() {
                break;
            }
        }
    }

    #[test]
    fn closed_fractions_sum_to_one(
        path in arb_path(),
        short in prop::bool::ANY,
        stop_distance in 1.0..10.0_f64,
    ) {
        let direction = if short { Direction::Short } else { Direction::Long };
        let rm = RiskManager::new(RiskConfig::default());
        let mut pos = open_at(&rm, direction, 100.0, stop_distance);
        let bars = path_bars(&path);
        let mut records = Vec::new();
        let mut remaining = pos.remaining_fraction();
        for (i, b) in bars.iter().enumerate() {
            records.extend(step(&rm, &mut pos, b, i + 1));
            prop_assert!(pos.remaining_fraction() <= remaining);
            remaining = pos.remaining_fraction();
            if pos.is_closed() {
                break;
            }
        }
        if let Some(last) = bars.last() {
            records.extend(rm.liquidate(&mut pos, last.close, last.open_time, bars.len(), ExitReason::TimeExit));
        }
        let total: f64 = records.iter().map(|r| r.fraction).sum();
        prop_assert!((total - 1.0).abs() < 1e-9, "fractions sum to {total}");
        prop_assert!(pos.is_closed());
        prop_assert!(rm.liquidate(&mut pos, 100.0, t(0), 0, ExitReason::TimeExit).is_none());
    }
}
