//! Loan amortization calculator
//!
//! Pure, local computation of a monthly payment. Independent of the wallet
//! and ledger components.
//!
//! The principal is compounded monthly over the whole term and the total is
//! spread evenly across the payments:
//!
//! ```text
//! r       = annual_rate_percent / 100 / 12
//! n       = term_years * 12
//! payment = principal * (1 + r)^n / n
//! ```

use crate::input::parse_loan_field;
use crate::AtmError;

/// Loan parameters for a single calculation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoanInputs {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub term_years: f64,
}

/// Result of a single calculation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoanResult {
    pub monthly_payment: f64,
}

impl LoanInputs {
    pub fn new(principal: f64, annual_rate_percent: f64, term_years: f64) -> Self {
        Self {
            principal,
            annual_rate_percent,
            term_years,
        }
    }

    /// Build inputs from the raw text of the three calculator fields
    pub fn parse(
        principal: &str,
        annual_rate_percent: &str,
        term_years: &str,
    ) -> Result<Self, AtmError> {
        Ok(Self {
            principal: parse_loan_field("principal", principal)?,
            annual_rate_percent: parse_loan_field("interest rate", annual_rate_percent)?,
            term_years: parse_loan_field("repayment term", term_years)?,
        })
    }

    /// Monthly interest rate as a fraction
    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate_percent / 100.0 / 12.0
    }

    /// Total number of monthly payments
    pub fn payment_count(&self) -> f64 {
        self.term_years * 12.0
    }
}

/// Compute the monthly payment for a loan
///
/// Rejects negative or non-finite inputs and a zero-length term with
/// [`AtmError::InvalidInput`]; never returns `NaN` or infinity.
pub fn monthly_payment(inputs: &LoanInputs) -> Result<LoanResult, AtmError> {
    validate("principal", inputs.principal)?;
    validate("interest rate", inputs.annual_rate_percent)?;
    validate("repayment term", inputs.term_years)?;

    let n = inputs.payment_count();
    if n == 0.0 {
        return Err(AtmError::invalid_input("repayment term must be greater than zero"));
    }

    let r = inputs.monthly_rate();
    let monthly_payment = if r == 0.0 {
        inputs.principal / n
    } else {
        inputs.principal * (1.0 + r).powf(n) / n
    };

    if !monthly_payment.is_finite() {
        return Err(AtmError::invalid_input(format!(
            "loan parameters overflow: principal {}, rate {}%, term {} years",
            inputs.principal, inputs.annual_rate_percent, inputs.term_years
        )));
    }

    log::debug!(
        "🧮 Loan: principal={}, rate={}%, term={}y → monthly payment {:.2}",
        inputs.principal,
        inputs.annual_rate_percent,
        inputs.term_years,
        monthly_payment
    );

    Ok(LoanResult { monthly_payment })
}

fn validate(name: &str, value: f64) -> Result<(), AtmError> {
    if !value.is_finite() {
        return Err(AtmError::invalid_input(format!("{} must be a finite number", name)));
    }
    if value < 0.0 {
        return Err(AtmError::invalid_input(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(())
}
