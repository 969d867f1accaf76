//! Currency amounts
//!
//! Amounts are decimals normalized to 8 places before they enter any
//! hash pre-image, so two nodes always serialize the same value the
//! same way.

use rust_decimal::Decimal;

/// Currency amount with 8 decimal places of precision
pub type Amount = Decimal;

/// The smallest representable currency unit (10^-8)
pub fn smallest_unit() -> Amount {
    Decimal::new(1, 8)
}

/// Round to 8 decimal places and strip trailing zeros
pub fn normalize_amount(value: Amount) -> Amount {
    value.round_dp(8).normalize()
}
