//! Gold loan lifecycle: terms derivation, status workflow, outsourcing and closure.
//!
//! Pure engines (`amortization`, `collateral`, `workflow`, `outsourcing`, `closure`,
//! `payments`) operate on a [`LoanRecord`] in memory. [`LoanService`] wraps them with
//! authorization, validation and a single versioned write per operation.

pub mod access;
pub mod amortization;
pub mod closure;
pub mod collateral;
pub mod domain;
pub mod export;
pub mod intake;
pub mod outsourcing;
pub mod payments;
pub mod query;
pub mod record;
pub mod repository;
pub mod router;
pub mod service;
pub mod stats;
pub mod workflow;

#[cfg(test)]
pub(crate) mod tests;

pub use access::{AccessDenied, AccessPolicy, Actor, DenialKind, LoanAction, Role, RoleAccessPolicy};
pub use amortization::{amortize, schedule, Amortization, AmortizationError, Installment};
pub use closure::{ClosureError, ClosureRequest};
pub use collateral::{aggregate, CollateralTotals};
pub use domain::{
    AccountBucket, ActorId, Applicant, ClosureReason, ClosureRecord, CollateralItem,
    DocumentRef, LoanAmendment, LoanCode, LoanStatus, LoanSubmission, LoanTerms,
    OutsourceAssignment, PaymentEntry, PaymentMethod, PictureRef, PostalAddress, Purity,
    StatusChange,
};
pub use export::{export_ledger_to_path, write_ledger, ExportError};
pub use intake::{FieldError, IntakeGuard, TermBounds};
pub use outsourcing::{
    EntityContact, EntityId, EntityKind, EntityStatus, NewOutsourceEntity, OutsourceEntity,
    OutsourceRequest, OutsourcingError, OutsourcingFilter,
};
pub use payments::{PaymentError, PaymentRequest};
pub use query::LoanQuery;
pub use record::{DerivationError, DerivedTerms, LoanRecord, LoanSummaryView};
pub use repository::{EntityRepository, LoanRepository, RepositoryError};
pub use router::loan_router;
pub use service::{LoanService, LoanServiceError};
pub use stats::DashboardStats;
pub use workflow::WorkflowError;
