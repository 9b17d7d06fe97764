use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::access::Actor;
use super::amortization::round_currency;
use super::domain::{ClosureReason, ClosureRecord, LoanStatus};
use super::intake::FieldError;
use super::record::LoanRecord;

/// Settlement details supplied when closing a loan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureRequest {
    pub reason: Option<ClosureReason>,
    pub notes: Option<String>,
    /// Defaults to the outstanding amount (total payable less recorded payments).
    pub final_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClosureError {
    #[error("only approved loans can be closed (loan is {})", .0.label())]
    NotApproved(LoanStatus),
    #[error("loan is {}; only closed loans carry closure notes", .0.label())]
    NotClosed(LoanStatus),
    #[error("closure request is incomplete")]
    Invalid(Vec<FieldError>),
}

/// Terminal settlement of an approved loan.
pub fn close(
    record: &mut LoanRecord,
    actor: &Actor,
    request: ClosureRequest,
    now: DateTime<Utc>,
) -> Result<ClosureRecord, ClosureError> {
    if record.status != LoanStatus::Approved {
        return Err(ClosureError::NotApproved(record.status));
    }

    let ClosureRequest {
        reason,
        notes,
        final_amount,
    } = request;

    let mut errors = Vec::new();
    if reason.is_none() {
        errors.push(FieldError::new("reason", "closure reason is required"));
    }
    if let Some(amount) = final_amount {
        if !(amount.is_finite() && amount >= 0.0) {
            errors.push(FieldError::new("final_amount", "cannot be negative"));
        }
    }
    let reason = match reason {
        Some(reason) if errors.is_empty() => reason,
        _ => return Err(ClosureError::Invalid(errors)),
    };

    let closure = ClosureRecord {
        closed_at: now,
        closed_by: actor.id.clone(),
        reason,
        notes,
        final_amount: round_currency(final_amount.unwrap_or_else(|| record.outstanding_amount())),
    };

    record.push_status_change(
        LoanStatus::Closed,
        actor.id.clone(),
        now,
        Some(format!("closed: {}", reason.label())),
    );
    record.closure = Some(closure.clone());
    record.updated_at = now;
    Ok(closure)
}

/// Closure notes remain editable after the loan is closed; nothing else does.
pub fn amend_notes(
    record: &mut LoanRecord,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), ClosureError> {
    match record.closure.as_mut() {
        Some(closure) => {
            closure.notes = notes;
            record.updated_at = now;
            Ok(())
        }
        None => Err(ClosureError::NotClosed(record.status)),
    }
}
