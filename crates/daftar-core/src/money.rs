//! Scale-2 decimal helpers for the money path.
//!
//! Every monetary value in daftar is a [`Decimal`] carried at scale 2 once
//! materialized. Intermediate products (`price × qty`) are rounded half-up to
//! scale 2 before they are summed; binary floating point never touches money.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Round to scale 2, half-up (midpoint away from zero).
///
/// This is the single rounding rule used when materializing line subtotals,
/// VAT amounts, and totals.
///
/// # Examples
///
/// ```
/// use daftar_core::money::round2;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round2(dec!(1.005)), dec!(1.01));
/// assert_eq!(round2(dec!(1.004)), dec!(1.00));
/// assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
/// ```
#[must_use]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// VAT amount for a net subtotal: `round2(subtotal × rate)`.
#[must_use]
pub fn vat_of(subtotal: Decimal, rate: Decimal) -> Decimal {
    round2(subtotal * rate)
}

/// Back out the net subtotal from an inc-VAT total: `round2(total / (1 + rate))`.
///
/// This is one of the two most error-prone sites on the money path (the other
/// is the VAT multiplication); both must stay on [`Decimal`].
#[must_use]
pub fn net_of(total_inc_vat: Decimal, rate: Decimal) -> Decimal {
    round2(total_inc_vat / (Decimal::ONE + rate))
}

/// Line subtotal for a quantity at a unit price: `round2(price × qty)`.
#[must_use]
pub fn line_subtotal(unit_price: Decimal, quantity: u32) -> Decimal {
    round2(unit_price * Decimal::from(quantity))
}

/// Check whether two amounts agree within a tolerance.
#[must_use]
pub fn is_near(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

/// The default VAT rate (15%).
#[must_use]
pub fn default_vat_rate() -> Decimal {
    dec!(0.15)
}
