//! R-based risk management.
//!
//! - `sizing`: dollar-risk position sizing
//! - `ratchet`: stops may tighten, never loosen
//! - `config`: thresholds read from a `ParameterSet`
//! - `manager`: the per-bar partial-exit / stop-ratchet state machine

pub mod config;
pub mod manager;
pub mod ratchet;
pub mod sizing;

pub use config::{ClimaxConfig, PartialTarget, RiskConfig, DEFAULT_SCHEDULE};
pub use manager::{r_multiple, BarSignals, EntryFill, RTargets, RiskManager};
pub use ratchet::RatchetState;
pub use sizing::{cap_quantity, size_position};
