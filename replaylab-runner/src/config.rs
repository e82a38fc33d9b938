//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! symbol = "BTCUSDT"
//! base_timeframe = "15m"
//! timeframes = ["1h", "4h"]
//! strategy = "htf_trend"
//!
//! [engine]
//! initial_equity = 10000.0
//! fill_model = "next_open"
//!
//! [params]
//! risk_pct = 0.03
//! partial_schedule = [[1.0, 0.3], [2.0, 0.3], [3.0, 0.3]]
//!
//! [walk_forward]
//! max_trials = 40
//!
//! [walk_forward.space.fast_period]
//! min = 5
//! max = 40
//! integer = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use replaylab_core::domain::{ParameterSet, Timeframe};
use replaylab_core::engine::EngineConfig;
use replaylab_core::risk::RiskConfig;
use replaylab_core::CoreError;

use crate::walk_forward::WalkForwardConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] CoreError),
}

/// Everything needed to reproduce a replay or a walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub symbol: String,
    pub base_timeframe: Timeframe,
    /// Higher timeframes to build in the bar store.
    #[serde(default)]
    pub timeframes: Vec<Timeframe>,
    pub strategy: String,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Strategy and risk parameters shared by every replay.
    #[serde(default)]
    pub params: ParameterSet,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject anything a replay would reject, before any data is loaded.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.engine.validate()?;
        RiskConfig::from_params(&self.params)?;
        for &tf in &self.timeframes {
            if !tf.is_derivable_from(self.base_timeframe) {
                return Err(CoreError::IncompatibleTimeframe {
                    base: self.base_timeframe,
                    requested: tf,
                });
            }
        }
        self.walk_forward.validate()
    }

    /// Walk-forward settings with `params` as the base every trial starts from.
    pub fn walk_forward_config(&self) -> WalkForwardConfig {
        let mut wf = self.walk_forward.clone();
        wf.base_params = self.params.merged(&wf.base_params);
        wf
    }
}
