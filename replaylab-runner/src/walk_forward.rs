//! Walk-forward validation: train/test split, parameter search, frozen OOS replay.
//!
//! The base series is split once at `train_fraction`. Each window gets its own
//! `BarStore` rebuilt from its own base bars, so no test bar is ever visible
//! while trials are scored. Trials run in parallel (one rayon task each) with
//! parameters drawn from per-trial seeds; the best train score wins, ties going
//! to the lowest trial index. The winner is replayed once on the test window.

use std::fmt;
use std::ops::Range;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use replaylab_core::data::BarStore;
use replaylab_core::domain::{ParameterSet, TradeRecord};
use replaylab_core::engine::ReplayError;
use replaylab_core::CoreError;

use crate::metrics::PerformanceMetrics;
use crate::objective::Objective;
use crate::rng::RngHierarchy;
use crate::sampler::ParamSpace;
use crate::trial::{StrategyFactory, TrialStatus, TrialSummary};

// ─── Configuration ───────────────────────────────────────────────────

/// Configuration for walk-forward validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Share of base bars in the train window (default 0.7).
    pub train_fraction: f64,
    /// Minimum base bars in each window (default 200).
    pub min_bars: usize,
    /// Trials sampled on the train window (default 50).
    pub max_trials: usize,
    /// Trials with fewer closed positions on train are not eligible (default 0).
    pub min_trades: usize,
    /// Master seed for per-trial parameter draws.
    pub seed: u64,
    /// Wall-clock budget for the trial phase. Unlimited when `None`.
    pub time_budget_secs: Option<f64>,
    pub objective: Objective,
    /// Fixed parameters every trial starts from.
    pub base_params: ParameterSet,
    pub space: ParamSpace,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            min_bars: 200,
            max_trials: 50,
            min_trades: 0,
            seed: 42,
            time_budget_secs: None,
            objective: Objective::NetReturn,
            base_params: ParameterSet::new(),
            space: ParamSpace::new(),
        }
    }
}

/// Longest accepted trial-phase budget: 30 days.
pub const MAX_TIME_BUDGET_SECS: f64 = 30.0 * 24.0 * 3600.0;

impl WalkForwardConfig {
    /// Checks the settings that can be judged without data.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(secs) = self.time_budget_secs {
            if !secs.is_finite() || !(0.0..=MAX_TIME_BUDGET_SECS).contains(&secs) {
                return Err(CoreError::invalid_param(
                    "time_budget_secs",
                    format!("must be between 0 and {MAX_TIME_BUDGET_SECS} seconds, got {secs}"),
                ));
            }
        }
        self.space.validate()
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Train,
    Test,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Train => f.write_str("train"),
            Window::Test => f.write_str("test"),
        }
    }
}

/// Disjoint train/test windows; train strictly precedes test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSplit {
    /// Base bar indices, half-open.
    pub train: Range<usize>,
    pub test: Range<usize>,
    pub train_start: DateTime<Utc>,
    pub train_end: DateTime<Utc>,
    pub test_start: DateTime<Utc>,
    pub test_end: DateTime<Utc>,
}

/// Complete result of walk-forward validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub symbol: String,
    pub strategy: String,
    pub objective: Objective,
    pub split: WindowSplit,
    pub best_trial: usize,
    pub best_params: ParameterSet,
    pub in_sample_score: f64,
    pub out_of_sample_score: f64,
    /// OOS / IS; `None` unless the in-sample score is positive.
    pub retention: Option<f64>,
    pub in_sample: PerformanceMetrics,
    pub out_of_sample: PerformanceMetrics,
    pub in_sample_trades: usize,
    pub out_of_sample_trades: usize,
    pub completed_trials: usize,
    pub failed_trials: usize,
    pub ineligible_trials: usize,
    pub discarded_trials: usize,
    pub trials: Vec<TrialSummary>,
    /// Ledger of the frozen test replay.
    pub test_trades: Vec<TradeRecord>,
}

/// Errors from walk-forward validation.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data in {window} window: {bars} bars < minimum {minimum}")]
    InsufficientData {
        window: Window,
        bars: usize,
        minimum: usize,
    },
    #[error("invalid split: {0}")]
    InvalidSplit(String),
    #[error("no eligible trial out of {attempted} ({failed} failed, {ineligible} ineligible, {discarded} discarded)")]
    NoCompletedTrials {
        attempted: usize,
        failed: usize,
        ineligible: usize,
        discarded: usize,
    },
    #[error("replay error in {window} window: {source}")]
    Replay {
        window: Window,
        #[source]
        source: ReplayError,
    },
}

// ─── Window split ────────────────────────────────────────────────────

/// Split the base series at `train_fraction`.
///
/// Fails with `InsufficientData` naming the first window shorter than `min_bars`.
pub fn split_windows(
    store: &BarStore,
    train_fraction: f64,
    min_bars: usize,
) -> Result<WindowSplit, WalkForwardError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(WalkForwardError::InvalidSplit(format!(
            "train_fraction must be in (0, 1), got {train_fraction}"
        )));
    }
    let n = store.len();
    let cut = (n as f64 * train_fraction).floor() as usize;
    let train = 0..cut;
    let test = cut..n;

    for (window, range) in [(Window::Train, &train), (Window::Test, &test)] {
        if range.len() < min_bars.max(1) {
            return Err(WalkForwardError::InsufficientData {
                window,
                bars: range.len(),
                minimum: min_bars.max(1),
            });
        }
    }

    let bars = store.base_bars();
    let tf = store.base_timeframe();
    Ok(WindowSplit {
        train_start: bars[train.start].open_time,
        train_end: tf.close_time(bars[train.end - 1].open_time),
        test_start: bars[test.start].open_time,
        test_end: tf.close_time(bars[test.end - 1].open_time),
        train,
        test,
    })
}

// ─── Walk-forward orchestration ──────────────────────────────────────

/// Split, search parameters on train, replay the frozen winner on test.
pub fn run_walk_forward(
    store: &BarStore,
    config: &WalkForwardConfig,
    factory: &StrategyFactory,
) -> Result<WalkForwardReport, WalkForwardError> {
    config
        .validate()
        .map_err(|e| WalkForwardError::InvalidSplit(e.to_string()))?;
    let split = split_windows(store, config.train_fraction, config.min_bars)?;
    let train_store = store
        .slice(split.train.clone())
        .map_err(|e| window_error(Window::Train, e))?;
    let test_store = store
        .slice(split.test.clone())
        .map_err(|e| window_error(Window::Test, e))?;

    info!(
        symbol = store.symbol(),
        strategy = factory.strategy(),
        train_bars = split.train.len(),
        test_bars = split.test.len(),
        trials = config.max_trials,
        "walk-forward started"
    );

    let trials = run_trials(&train_store, config, factory);

    let count = |pred: fn(&TrialStatus) -> bool| trials.iter().filter(|t| pred(&t.status)).count();
    let completed = count(|s| matches!(s, TrialStatus::Completed));
    let failed = count(|s| matches!(s, TrialStatus::Failed { .. }));
    let ineligible = count(|s| matches!(s, TrialStatus::TooFewTrades { .. }));
    let discarded = count(|s| matches!(s, TrialStatus::Discarded));

    let best = select_best(&trials, config.objective).ok_or(WalkForwardError::NoCompletedTrials {
        attempted: trials.len(),
        failed,
        ineligible,
        discarded,
    })?;
    let best_trial = best.index;
    let best_params = best.params.clone();
    let in_sample_score = best.score.unwrap_or(f64::NEG_INFINITY);
    let in_sample = best.metrics.clone().unwrap_or_default();

    debug!(
        best_trial,
        score = in_sample_score,
        params = %best_params,
        "train window winner"
    );

    // Frozen parameters, one replay, no further tuning.
    let test_result = factory
        .replay(&test_store, &best_params)
        .map_err(|source| WalkForwardError::Replay {
            window: Window::Test,
            source,
        })?;
    let out_of_sample = PerformanceMetrics::compute(&test_result);
    let out_of_sample_score = config.objective.score(&out_of_sample);
    let retention = retention_ratio(in_sample_score, out_of_sample_score);

    info!(
        in_sample_score,
        out_of_sample_score,
        retention = ?retention,
        completed,
        failed,
        discarded,
        "walk-forward finished"
    );

    Ok(WalkForwardReport {
        symbol: store.symbol().to_string(),
        strategy: factory.strategy().to_string(),
        objective: config.objective,
        split,
        best_trial,
        best_params,
        in_sample_score,
        out_of_sample_score,
        retention,
        in_sample_trades: in_sample.trade_count,
        out_of_sample_trades: out_of_sample.trade_count,
        in_sample,
        out_of_sample,
        completed_trials: completed,
        failed_trials: failed,
        ineligible_trials: ineligible,
        discarded_trials: discarded,
        trials,
        test_trades: test_result.trades,
    })
}

/// Parameters for every trial, drawn before any replay starts.
pub fn trial_params(symbol: &str, config: &WalkForwardConfig) -> Vec<ParameterSet> {
    let seeds = RngHierarchy::new(config.seed);
    (0..config.max_trials)
        .map(|i| {
            let mut rng = seeds.rng_for(symbol, i as u64);
            config.space.sample(&mut rng, &config.base_params)
        })
        .collect()
}

/// Run every trial on the train store. Output is in trial-index order.
fn run_trials(
    train: &BarStore,
    config: &WalkForwardConfig,
    factory: &StrategyFactory,
) -> Vec<TrialSummary> {
    let deadline = config
        .time_budget_secs
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .and_then(|budget| Instant::now().checked_add(budget));
    let past_deadline = || deadline.is_some_and(|d| Instant::now() >= d);

    trial_params(train.symbol(), config)
        .into_par_iter()
        .enumerate()
        .map(|(index, params)| {
            if past_deadline() {
                debug!(trial = index, "trial discarded before start");
                return summary(index, params, TrialStatus::Discarded, None);
            }
            let result = factory.replay(train, &params);
            if past_deadline() {
                debug!(trial = index, "trial discarded after budget expired");
                return summary(index, params, TrialStatus::Discarded, None);
            }
            match result {
                Err(e) => {
                    warn!(trial = index, error = %e, params = %params, "trial failed");
                    summary(index, params, TrialStatus::Failed { error: e.to_string() }, None)
                }
                Ok(r) => {
                    let metrics = PerformanceMetrics::compute(&r);
                    if metrics.trade_count < config.min_trades {
                        debug!(trial = index, trades = metrics.trade_count, "trial below minimum trade count");
                        let status = TrialStatus::TooFewTrades {
                            trades: metrics.trade_count,
                            minimum: config.min_trades,
                        };
                        return summary(index, params, status, Some(metrics));
                    }
                    let mut s = summary(index, params, TrialStatus::Completed, Some(metrics));
                    s.score = s.metrics.as_ref().map(|m| config.objective.score(m));
                    s
                }
            }
        })
        .collect()
}

fn summary(
    index: usize,
    params: ParameterSet,
    status: TrialStatus,
    metrics: Option<PerformanceMetrics>,
) -> TrialSummary {
    TrialSummary {
        index,
        params,
        status,
        score: None,
        metrics,
    }
}

/// Highest-scoring completed trial; the first in index order wins ties.
fn select_best(trials: &[TrialSummary], objective: Objective) -> Option<&TrialSummary> {
    let mut best: Option<(&TrialSummary, f64)> = None;
    for t in trials.iter().filter(|t| t.is_completed()) {
        let score = t.score.unwrap_or(f64::NEG_INFINITY);
        match best {
            Some((_, b)) if !objective.is_better(score, b) => {}
            _ => best = Some((t, score)),
        }
    }
    best.map(|(t, _)| t)
}

/// OOS / IS, only meaningful for a positive in-sample score.
pub fn retention_ratio(in_sample: f64, out_of_sample: f64) -> Option<f64> {
    if in_sample > 0.0 && out_of_sample.is_finite() {
        Some(out_of_sample / in_sample)
    } else {
        None
    }
}

fn window_error(window: Window, e: replaylab_core::CoreError) -> WalkForwardError {
    WalkForwardError::Replay {
        window,
        source: ReplayError::Config(e),
    }
}
