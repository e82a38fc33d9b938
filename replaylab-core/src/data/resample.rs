//! Epoch-aligned aggregation of a base series into a coarser timeframe.
//!
//! A base bar belongs to bucket `k` when its open time falls in
//! `[k·Δ, (k+1)·Δ)`. Empty buckets produce no bar (no forward fill).

use crate::domain::{Bar, Timeframe};

/// Aggregate `base` bars into `timeframe` buckets.
///
/// open = first open, high/low = extrema, close = last close, volume = sum.
/// The output bar's `open_time` is the bucket start, not the first member's
/// open time.
pub fn resample(base: &[Bar], timeframe: Timeframe) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    let mut current_bucket: Option<i64> = None;

    for bar in base {
        let bucket = timeframe.bucket_index(bar.open_time);
        if current_bucket == Some(bucket) {
            if let Some(agg) = out.last_mut() {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                continue;
            }
        }
        out.push(Bar {
            open_time: timeframe.bucket_start(bar.open_time),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        });
        current_bucket = Some(bucket);
    }

    out
}

/// For each base bar, how many aggregated bars have closed by its open time.
///
/// `closed[i]` counts bars whose right edge is <= `base[i].open_time`, so
/// `aggregated[closed[i] - 1]` is the latest bar visible at base index `i`.
pub fn closed_counts(base: &[Bar], aggregated: &[Bar], timeframe: Timeframe) -> Vec<usize> {
    let mut counts = Vec::with_capacity(base.len());
    let mut ptr = 0;
    for bar in base {
        while ptr < aggregated.len()
            && timeframe.close_time(aggregated[ptr].open_time) <= bar.open_time
        {
            ptr += 1;
        }
        counts.push(ptr);
    }
    counts
}
