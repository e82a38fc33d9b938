//! Dollar-risk position sizing.
//!
//! ```text
//! risk_dollars = equity * risk_pct
//! quantity     = risk_dollars / stop_distance
//! ```
//!
//! Size depends only on the distance to the stop, never on price or leverage:
//! wide stops shrink the position, tight stops grow it.

use crate::error::CoreError;

/// Quantity that loses exactly `equity * risk_pct` if the stop is hit.
///
/// Fails with `InvalidRiskInput` if `stop_distance <= 0` or `risk_pct <= 0`.
///
/// # Example
/// ```
/// use replaylab_core::risk::size_position;
///
/// // $10,000 equity, 3% risk, $150 stop: $300 / $150 = 2 units
/// assert_eq!(size_position(10_000.0, 150.0, 0.03).unwrap(), 2.0);
/// ```
pub fn size_position(equity: f64, stop_distance: f64, risk_pct: f64) -> Result<f64, CoreError> {
    let valid = stop_distance.is_finite()
        && risk_pct.is_finite()
        && stop_distance > 0.0
        && risk_pct > 0.0;
    if !valid {
        return Err(CoreError::InvalidRiskInput {
            stop_distance,
            risk_pct,
        });
    }
    Ok((equity * risk_pct) / stop_distance)
}

/// Clamp `quantity` so its notional at `price` stays within
/// `max_position_pct` of `equity`.
pub fn cap_quantity(quantity: f64, equity: f64, price: f64, max_position_pct: Option<f64>) -> f64 {
    match max_position_pct {
        Some(cap) if price > 0.0 => quantity.min(cap * equity / price),
        _ => quantity,
    }
}
