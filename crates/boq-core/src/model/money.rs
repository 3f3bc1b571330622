//! Decimal arithmetic for amounts and percentages.
//!
//! Every derived money value is rounded to two decimal places with
//! half-away-from-zero rounding, so `2.005 -> 2.01` and `-2.005 -> -2.01`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{BoqError, Result};

/// Scale of every stored money value.
pub const MONEY_SCALE: u32 = 2;

fn out_of_range(field: &'static str) -> BoqError {
    BoqError::validation(field, "amount out of range")
}

/// Round a value to money precision.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `round(quantity * rate, 2)`.
///
/// # Errors
///
/// Returns [`BoqError::Validation`] when the product does not fit a
/// `Decimal`.
pub fn line_amount(quantity: Decimal, rate: Decimal) -> Result<Decimal> {
    quantity
        .checked_mul(rate)
        .map(round_money)
        .ok_or_else(|| out_of_range("amount"))
}

/// `round(subtotal * percentage / 100, 2)`.
///
/// # Errors
///
/// Returns [`BoqError::Validation`] when the intermediate product overflows.
pub fn contingency_amount(subtotal: Decimal, percentage: Decimal) -> Result<Decimal> {
    subtotal
        .checked_mul(percentage)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .map(round_money)
        .ok_or_else(|| out_of_range("contingency_amount"))
}

/// Overflow-checked sum of money values.
///
/// # Errors
///
/// Returns [`BoqError::Validation`] naming `field` when the sum overflows.
pub fn sum_money(
    field: &'static str,
    values: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(|| out_of_range(field))
}
