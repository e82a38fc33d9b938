//! Trial runner: one replay of one `ParameterSet` over one window.
//!
//! Every call builds a fresh adapter and risk manager, so concurrent trials
//! share nothing but the read-only `BarStore`.

use serde::{Deserialize, Serialize};

use replaylab_core::data::BarStore;
use replaylab_core::domain::ParameterSet;
use replaylab_core::engine::{EngineConfig, ReplayEngine, ReplayError, ReplayResult};
use replaylab_core::risk::RiskManager;
use replaylab_core::strategy::StrategyRegistry;
use replaylab_core::CoreError;

use crate::metrics::PerformanceMetrics;

/// Builds and runs replays for one named strategy.
pub struct StrategyFactory {
    registry: StrategyRegistry,
    strategy: String,
    engine: EngineConfig,
}

impl StrategyFactory {
    /// Fails if `strategy` is not registered or the engine config is invalid.
    pub fn new(
        registry: StrategyRegistry,
        strategy: impl Into<String>,
        engine: EngineConfig,
    ) -> Result<Self, CoreError> {
        let strategy = strategy.into();
        if !registry.contains(&strategy) {
            return Err(CoreError::invalid_param(
                "strategy",
                format!("unknown strategy '{strategy}' (known: {})", registry.names().join(", ")),
            ));
        }
        engine.validate()?;
        Ok(Self {
            registry,
            strategy,
            engine,
        })
    }

    /// Factory over the built-in adapters.
    pub fn builtin(strategy: impl Into<String>, engine: EngineConfig) -> Result<Self, CoreError> {
        Self::new(StrategyRegistry::with_builtins(), strategy, engine)
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Replay `store` once with `params` driving both the adapter and the
    /// risk manager.
    pub fn replay(&self, store: &BarStore, params: &ParameterSet) -> Result<ReplayResult, ReplayError> {
        let mut adapter = self
            .registry
            .create(&self.strategy, params)
            .map_err(ReplayError::Config)?;
        let risk = RiskManager::from_params(params).map_err(ReplayError::Config)?;
        ReplayEngine::new(self.engine.clone(), risk).run(store, adapter.as_mut())
    }
}

/// How a trial ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialStatus {
    Completed,
    /// Fewer closed positions than the configured minimum.
    TooFewTrades { trades: usize, minimum: usize },
    Failed { error: String },
    /// Started or finished after the wall-clock budget ran out.
    Discarded,
}

/// One trial as reported by the walk-forward harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    pub index: usize,
    pub params: ParameterSet,
    #[serde(flatten)]
    pub status: TrialStatus,
    pub score: Option<f64>,
    pub metrics: Option<PerformanceMetrics>,
}

impl TrialSummary {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, TrialStatus::Completed)
    }
}
