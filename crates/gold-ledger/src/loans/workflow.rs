use chrono::{DateTime, Utc};

use super::access::Actor;
use super::domain::LoanStatus;
use super::record::LoanRecord;

/// Legal lifecycle moves reachable through the generic transition call.
///
/// `approved → closed` exists in the lifecycle but is only reachable through closure, which
/// needs settlement fields. `closed` never reopens.
pub const fn allowed_targets(from: LoanStatus) -> &'static [LoanStatus] {
    match from {
        LoanStatus::Pending => &[
            LoanStatus::Approved,
            LoanStatus::Rejected,
            LoanStatus::UnderReview,
        ],
        LoanStatus::UnderReview => &[LoanStatus::Approved, LoanStatus::Rejected],
        LoanStatus::Approved | LoanStatus::Rejected | LoanStatus::Closed => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("loan is closed; no further transitions are permitted")]
    Closed,
    #[error("closing a loan requires the closure operation with a settlement reason")]
    ClosureRequiresSettlement,
    #[error("cannot move loan from {} to {}", .from.label(), .to.label())]
    IllegalTransition { from: LoanStatus, to: LoanStatus },
}

/// Validate and apply a status change. Authorization happens before this is called.
pub fn apply_transition(
    record: &mut LoanRecord,
    actor: &Actor,
    target: LoanStatus,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let from = record.status;
    if from == LoanStatus::Closed {
        return Err(WorkflowError::Closed);
    }
    if target == LoanStatus::Closed {
        return Err(WorkflowError::ClosureRequiresSettlement);
    }
    if !allowed_targets(from).contains(&target) {
        return Err(WorkflowError::IllegalTransition { from, to: target });
    }

    if target == LoanStatus::Approved {
        record.approved_at = Some(now);
        record.approved_by = Some(actor.id.clone());
    }
    record.push_status_change(target, actor.id.clone(), now, note);
    record.updated_at = now;
    Ok(())
}
