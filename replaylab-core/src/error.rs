//! Error taxonomy for the core engine.
//!
//! Every variant carries enough context (bar index, timeframe, parameter name)
//! to reproduce the failure from the inputs alone.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Timeframe;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Non-positive stop distance or risk fraction. The entry is skipped.
    #[error("invalid risk input: stop_distance={stop_distance}, risk_pct={risk_pct}")]
    InvalidRiskInput { stop_distance: f64, risk_pct: f64 },

    /// A higher-timeframe bar closed after the base bar it was served to.
    /// This is a defect and halts replay.
    #[error(
        "look-ahead violation on {timeframe}: bar closing at {bar_close} served at base index \
         {base_index} ({base_time})"
    )]
    LookAheadViolation {
        timeframe: Timeframe,
        base_index: usize,
        bar_close: DateTime<Utc>,
        base_time: DateTime<Utc>,
    },

    /// Non-increasing or duplicate timestamp in the input series.
    #[error("data gap at bar {index}: {current} does not follow {previous}")]
    DataGap {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("malformed bar at index {index}: {reason}")]
    MalformedBar { index: usize, reason: String },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unknown timeframe '{0}'")]
    UnknownTimeframe(String),

    /// Requested timeframe is not a coarser multiple of the base timeframe.
    #[error("timeframe {requested} cannot be built from base timeframe {base}")]
    IncompatibleTimeframe {
        base: Timeframe,
        requested: Timeframe,
    },

    /// Timeframe was not built into the store.
    #[error("timeframe {0} is not available in the bar store")]
    MissingTimeframe(Timeframe),

    #[error("base index {index} out of range (series has {len} bars)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("empty series: {0}")]
    EmptySeries(String),
}

impl CoreError {
    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
