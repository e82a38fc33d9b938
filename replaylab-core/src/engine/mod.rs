//! Replay engine: drives the bar loop, routes intents, records outcomes.
//!
//! State machine per symbol: FLAT → ENTERING → OPEN → FLAT. The strategy is
//! called exactly once per base bar; the risk manager owns every stop and
//! partial-exit decision while a position is open.

pub mod config;
pub mod ledger;
pub mod replay;
pub mod signals;
pub mod state;

pub use config::{EngineConfig, FillModel};
pub use ledger::TradeLedger;
pub use replay::{EquityPoint, ReplayEngine, ReplayResult};
pub use signals::{SignalTracker, VolumeClimax};
pub use state::{EngineState, PendingEntry, PhaseState, Rejection, RejectionCounts};

use thiserror::Error;

use crate::error::CoreError;

#[derive(Debug, Clone, Error)]
pub enum ReplayError {
    #[error("invalid replay configuration: {0}")]
    Config(#[source] CoreError),

    #[error("replay halted at base bar {index}: {source}")]
    Halted {
        index: usize,
        #[source]
        source: CoreError,
    },
}

impl ReplayError {
    /// Base bar at which the replay stopped, if it got that far.
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            ReplayError::Config(_) => None,
            ReplayError::Halted { index, .. } => Some(*index),
        }
    }

    pub fn core(&self) -> &CoreError {
        match self {
            ReplayError::Config(e) => e,
            ReplayError::Halted { source, .. } => source,
        }
    }
}
