use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::amortization::round_currency;
use super::domain::{ActorId, LoanStatus, PaymentEntry, PaymentMethod};
use super::intake::FieldError;
use super::record::LoanRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
    pub method: PaymentMethod,
    /// Defaults to the day the payment is recorded.
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    #[error("payments are accepted on approved loans only (loan is {})", .0.label())]
    NotApproved(LoanStatus),
    #[error("payment rejected")]
    Invalid(Vec<FieldError>),
}

/// Append a repayment to the loan's history. Earlier entries are never touched.
pub fn append_payment(
    record: &mut LoanRecord,
    request: PaymentRequest,
    recorded_by: ActorId,
    today: NaiveDate,
) -> Result<PaymentEntry, PaymentError> {
    if record.status != LoanStatus::Approved {
        return Err(PaymentError::NotApproved(record.status));
    }

    let PaymentRequest {
        amount,
        method,
        paid_on,
        notes,
    } = request;

    let outstanding = record.outstanding_amount();
    if !(amount.is_finite() && amount > 0.0) {
        return Err(PaymentError::Invalid(vec![FieldError::new(
            "amount",
            "must be positive",
        )]));
    }
    if round_currency(amount) > outstanding {
        return Err(PaymentError::Invalid(vec![FieldError::new(
            "amount",
            format!("exceeds outstanding amount of {outstanding:.2}"),
        )]));
    }

    let entry = PaymentEntry {
        month_index: record.payments.len() as u32 + 1,
        amount: round_currency(amount),
        paid_on: paid_on.unwrap_or(today),
        method,
        recorded_by,
        notes,
    };
    record.payments.push(entry.clone());
    Ok(entry)
}
