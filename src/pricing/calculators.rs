//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no store access.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

const SECONDS_PER_HOUR: i64 = 3600;

/// Decimal places kept on a surge factor
pub const SURGE_FACTOR_PLACES: u32 = 4;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is exactly
/// halfway between two possibilities. This reduces cumulative rounding bias
/// across many hourly segments.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use spacerate::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Length of `[start, end)` in hours. Negative spans yield zero.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let seconds = (end - start).num_seconds().max(0);
    Decimal::from(seconds) / Decimal::from(SECONDS_PER_HOUR)
}

/// Price of `[start, end)` at an hourly rate.
///
/// Kept at full precision so that splitting a span never changes its total;
/// rounding to currency units is left to whoever bills the booking.
pub fn segment_total(price_per_hour: Decimal, start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let seconds = (end - start).num_seconds().max(0);
    price_per_hour * Decimal::from(seconds) / Decimal::from(SECONDS_PER_HOUR)
}

/// Convert a surge factor to Decimal.
///
/// Returns `None` for non-finite input.
pub fn surge_factor_to_decimal(factor: f64) -> Option<Decimal> {
    Decimal::from_f64(factor).map(|d| d.round_dp(SURGE_FACTOR_PLACES))
}

/// Apply a surge factor to a base hourly rate
pub fn apply_surge(base_price_per_hour: Decimal, factor: Decimal) -> Decimal {
    round_money(base_price_per_hour * factor, 2)
}
