//! Domain types: bars, timeframes, positions, trade records, parameters.

pub mod bar;
pub mod params;
pub mod position;
pub mod timeframe;
pub mod trade;

pub use bar::Bar;
pub use params::{ParamValue, ParameterSet};
pub use position::{Direction, Position, StopSource, FRACTION_EPSILON};
pub use timeframe::Timeframe;
pub use trade::{ExitReason, TradeRecord};

/// Symbol type alias
pub type Symbol = String;
