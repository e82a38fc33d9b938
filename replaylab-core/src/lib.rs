//! ReplayLab Core: bar store, timeframe synchronizer, risk manager, replay engine.
//!
//! This crate contains the engine:
//! - Domain types (bars, timeframes, positions, trade records, parameters)
//! - Bar Store with epoch-aligned higher-timeframe aggregation
//! - Timeframe Synchronizer enforcing no look-ahead
//! - R-based risk manager with partial exits and a ratcheting stop
//! - Strategy adapter trait and reference adapters
//! - Bar-by-bar replay loop with an append-only trade ledger

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod risk;
pub mod strategy;

pub use error::CoreError;
