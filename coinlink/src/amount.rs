//! Conversion between major-unit decimals and integer minor units.
//!
//! All arithmetic happens on the decimal mantissa as integers. Floating
//! point never touches an amount on its way to or from the daemon.

use rust_decimal::Decimal;

use crate::error::ErrorKind;

/// Rejected amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Amounts are never negative.
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),
    /// More fractional digits than the asset's smallest unit allows.
    #[error("amount {amount} has {scale} decimal places, at most {max} allowed")]
    TooPrecise {
        /// The rejected amount.
        amount: Decimal,
        /// Fractional digits it carries.
        scale: u32,
        /// Fractional digits the asset supports.
        max: u32,
    },
    /// Result does not fit the target integer or decimal.
    #[error("amount out of range")]
    Overflow,
    /// Input was not a decimal number.
    #[error("invalid amount {0:?}")]
    Parse(String),
}

impl AmountError {
    /// Every amount failure is caller input.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Parses a decimal string such as `"0.015"`.
///
/// # Errors
///
/// Returns [`AmountError::Parse`] when `s` is not a decimal and
/// [`AmountError::Negative`] for values below zero.
pub fn parse_amount(s: &str) -> Result<Decimal, AmountError> {
    let amount: Decimal = s
        .trim()
        .parse()
        .map_err(|_| AmountError::Parse(s.to_owned()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }
    Ok(amount)
}

/// Converts a major-unit amount into integer minor units.
///
/// `1.5` with 8 decimals becomes `150_000_000`.
///
/// # Errors
///
/// Fails for negative input, for input with more than `decimals`
/// fractional digits, and on overflow.
pub fn to_minor_units(amount: Decimal, decimals: u32) -> Result<u128, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }
    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return Err(AmountError::TooPrecise {
            amount,
            scale,
            max: decimals,
        });
    }
    let mantissa = normalized.mantissa().unsigned_abs();
    10u128
        .checked_pow(decimals - scale)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or(AmountError::Overflow)
}

/// Converts integer minor units back to a major-unit amount.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the value does not fit a
/// [`Decimal`] at the requested scale.
pub fn from_minor_units(units: u128, decimals: u32) -> Result<Decimal, AmountError> {
    let units = i128::try_from(units).map_err(|_| AmountError::Overflow)?;
    Decimal::try_from_i128_with_scale(units, decimals)
        .map(|d| d.normalize())
        .map_err(|_| AmountError::Overflow)
}
