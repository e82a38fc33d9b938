//! Base-series validation, the Bar Store and the Timeframe Synchronizer.

pub mod ingest;
pub mod resample;
pub mod store;
pub mod sync;

pub use ingest::{validate_bars, BaseSeries};
pub use resample::resample;
pub use store::{BarStore, TimeframeSeries};
pub use sync::TimeframeSync;
