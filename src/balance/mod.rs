//! Base-unit balance helpers
//!
//! Balances travel as arbitrary precision base-10 strings. Every string field
//! of an account has a float companion computed with [`to_float`].

use crate::constants::{DENOMINATION, FLOAT_BALANCE_DECIMALS};
use num::{BigInt, ToPrimitive, Zero};

/// Converts a base-unit balance string into its denominated float form.
///
/// Unparseable or empty input yields `0.0`. The result is rounded to
/// [`FLOAT_BALANCE_DECIMALS`] places (half away from zero) and never negative.
pub fn to_float(balance: &str) -> f64 {
    let Some(value) = parse(balance) else {
        return 0.0;
    };

    let value = value.to_f64().unwrap_or_default();
    let precision = 10f64.powi(FLOAT_BALANCE_DECIMALS);
    let denominated = value / 10f64.powi(DENOMINATION);
    let rounded = (denominated * precision).round() / precision;

    rounded.max(0.0)
}

/// Parses a base-10 big integer, `None` for empty or malformed input
pub fn parse(balance: &str) -> Option<BigInt> {
    if balance.is_empty() {
        return None;
    }
    balance.parse::<BigInt>().ok()
}

/// Sums balances into a `(string, float)` pair.
///
/// The float sum is accumulated addend by addend through [`to_float`], not
/// derived from the string sum. Unparseable addends contribute nothing.
pub fn sum_balances(balances: &[&str]) -> (String, f64) {
    if balances.is_empty() {
        return ("0".into(), 0.0);
    }

    let mut total = BigInt::zero();
    let mut total_float = 0.0;
    for balance in balances {
        if let Some(value) = parse(balance) {
            total += value;
            total_float += to_float(balance);
        }
    }

    (total.to_string(), total_float)
}

/// Pair form of a single balance
pub fn with_float(balance: String) -> (String, f64) {
    let float = to_float(&balance);
    (balance, float)
}
