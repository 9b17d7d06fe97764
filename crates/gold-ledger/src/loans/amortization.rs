//! Equated monthly installment arithmetic.
//!
//! EMI = P × r × (1 + r)^n / ((1 + r)^n − 1) with `r = annual_rate / 100 / 12`. Every
//! published figure is rounded half-up to two decimals, and the totals are derived from the
//! rounded installment so `emi × n − principal == total_interest` holds to the cent.

use serde::{Deserialize, Serialize};

/// Round a currency figure half-up to two decimals.
pub fn round_currency(value: f64) -> f64 {
    let scaled = value * 100.0;
    // nudge past representation error so 2.675 rounds to 2.68
    ((scaled + scaled.signum() * 1e-7).round()) / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amortization {
    pub monthly_emi: f64,
    pub total_interest: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmortizationError {
    #[error("principal must be positive (found {0})")]
    NonPositivePrincipal(f64),
    #[error("annual rate must be zero or positive (found {0})")]
    NegativeRate(f64),
    #[error("term must be at least one month")]
    ZeroTerm,
}

/// Compute installment and totals for a fully amortising loan.
///
/// A zero rate degrades to straight-line repayment: `P / n` per month and no interest.
pub fn amortize(
    principal: f64,
    annual_rate: f64,
    term_months: u32,
) -> Result<Amortization, AmortizationError> {
    if !(principal.is_finite() && principal > 0.0) {
        return Err(AmortizationError::NonPositivePrincipal(principal));
    }
    if !(annual_rate.is_finite() && annual_rate >= 0.0) {
        return Err(AmortizationError::NegativeRate(annual_rate));
    }
    if term_months == 0 {
        return Err(AmortizationError::ZeroTerm);
    }

    let monthly_rate = annual_rate / 100.0 / 12.0;
    let n = term_months as f64;

    if monthly_rate == 0.0 {
        return Ok(Amortization {
            monthly_emi: round_currency(principal / n),
            total_interest: 0.0,
            total_amount: round_currency(principal),
        });
    }

    let factor = (1.0 + monthly_rate).powi(term_months as i32);
    let monthly_emi = round_currency(principal * monthly_rate * factor / (factor - 1.0));
    let total_interest = round_currency(monthly_emi * n - principal);
    let total_amount = round_currency(principal + total_interest);

    Ok(Amortization {
        monthly_emi,
        total_interest,
        total_amount,
    })
}

/// One row of the repayment plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub month_index: u32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub closing_balance: f64,
}

/// Month-by-month split of each installment. The last row absorbs rounding drift so the
/// balance closes at exactly zero.
pub fn schedule(
    principal: f64,
    annual_rate: f64,
    term_months: u32,
) -> Result<Vec<Installment>, AmortizationError> {
    let plan = amortize(principal, annual_rate, term_months)?;
    let monthly_rate = annual_rate / 100.0 / 12.0;
    let mut balance = round_currency(principal);
    let mut rows = Vec::with_capacity(term_months as usize);

    for month_index in 1..=term_months {
        let interest = round_currency(balance * monthly_rate);
        let (payment, principal_part) = if month_index == term_months {
            (round_currency(balance + interest), balance)
        } else {
            let principal_part = round_currency(plan.monthly_emi - interest).min(balance);
            (plan.monthly_emi, principal_part)
        };
        balance = round_currency(balance - principal_part);

        rows.push(Installment {
            month_index,
            payment,
            interest,
            principal: principal_part,
            closing_balance: balance,
        });
    }

    Ok(rows)
}
