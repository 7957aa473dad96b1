//! Validation of user-entered numeric text
//!
//! Raw field text is parsed here before it can reach the controller or the
//! calculator. Anything that does not parse to a usable number is rejected
//! with [`AtmError::InvalidInput`] instead of being coerced to zero.

use std::fmt;

use crate::AtmError;

/// A validated transaction amount in whole ledger units
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Create an amount from a non-zero unit count
    pub fn new(units: u64) -> Result<Self, AtmError> {
        if units == 0 {
            return Err(AtmError::invalid_input("amount must be greater than zero"));
        }
        Ok(Self(units))
    }

    pub fn units(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a transaction amount entered by the user
///
/// The text is read as a floating-point number, then required to be a
/// finite, positive whole number that fits the ledger's unsigned integer
/// argument.
pub fn parse_amount(raw: &str) -> Result<Amount, AtmError> {
    let value = parse_number("amount", raw)?;

    if value < 0.0 {
        return Err(AtmError::invalid_input(format!(
            "amount must not be negative, got {}",
            value
        )));
    }
    if value.fract() != 0.0 {
        return Err(AtmError::invalid_input(format!(
            "amount must be a whole number of units, got {}",
            value
        )));
    }
    // u64::MAX is not exactly representable; 2^64 as f64 is the first value out of range
    if value >= u64::MAX as f64 {
        return Err(AtmError::invalid_input(format!(
            "amount {} exceeds the ledger maximum",
            value
        )));
    }

    Amount::new(value as u64)
}

/// Parse one of the loan calculator fields
///
/// Returns a finite, non-negative value.
pub fn parse_loan_field(name: &str, raw: &str) -> Result<f64, AtmError> {
    let value = parse_number(name, raw)?;
    if value < 0.0 {
        return Err(AtmError::invalid_input(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(value)
}

fn parse_number(name: &str, raw: &str) -> Result<f64, AtmError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AtmError::invalid_input(format!("{} is required", name)));
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| AtmError::invalid_input(format!("{} '{}' is not a number", name, trimmed)))?;

    // "inf" and "NaN" parse successfully as f64
    if !value.is_finite() {
        return Err(AtmError::invalid_input(format!(
            "{} '{}' is not a finite number",
            name, trimmed
        )));
    }

    Ok(value)
}
