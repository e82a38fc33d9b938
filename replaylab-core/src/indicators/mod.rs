//! Causal streaming indicators.
//!
//! Each state is fed one value or bar at a time and returns `None` until its
//! seed window is full, so no output can depend on input that has not been
//! passed in yet.

pub mod atr;
pub mod ema;
pub mod sma;

pub use atr::AtrState;
pub use ema::EmaState;
pub use sma::RollingMean;
