//! ReplayLab Runner: metrics, objectives and walk-forward validation.
//!
//! This crate builds on `replaylab-core` to provide:
//! - Performance metrics over a replay result
//! - Configurable trial objectives
//! - Seeded parameter sampling with per-trial sub-seeds
//! - Walk-forward validation with a parallel train search and a frozen test replay
//! - TOML run configuration

pub mod config;
pub mod metrics;
pub mod objective;
pub mod rng;
pub mod sampler;
pub mod trial;
pub mod walk_forward;

pub use config::{ConfigError, RunConfig};
pub use metrics::{compute_metrics, ClosedPosition, PerformanceMetrics};
pub use objective::Objective;
pub use rng::RngHierarchy;
pub use sampler::{ParamRange, ParamSpace};
pub use trial::{StrategyFactory, TrialStatus, TrialSummary};
pub use walk_forward::{
    run_walk_forward, split_windows, trial_params, WalkForwardConfig, WalkForwardError,
    WalkForwardReport, Window, WindowSplit,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    // Shared by reference across rayon workers.
    #[test]
    fn strategy_factory_is_sync() {
        assert_sync::<StrategyFactory>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<WalkForwardConfig>();
        assert_sync::<WalkForwardConfig>();
        assert_send::<ParamSpace>();
        assert_sync::<ParamSpace>();
    }

    #[test]
    fn trial_summary_is_send_sync() {
        assert_send::<TrialSummary>();
        assert_sync::<TrialSummary>();
    }

    #[test]
    fn walk_forward_report_is_send_sync() {
        assert_send::<WalkForwardReport>();
        assert_sync::<WalkForwardReport>();
    }

    #[test]
    fn walk_forward_error_is_send_sync() {
        assert_send::<WalkForwardError>();
        assert_sync::<WalkForwardError>();
    }
}
