use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::LendingConfig;
use crate::documents::{
    DocumentError, DocumentId, DocumentRecord, DocumentStore, NewDocument, Verification,
};

use super::access::{AccessDenied, AccessPolicy, Actor, LoanAction, RoleAccessPolicy};
use super::closure::{self, ClosureError, ClosureRequest};
use super::domain::{DocumentRef, LoanAmendment, LoanCode, LoanStatus, LoanSubmission};
use super::intake::{FieldError, IntakeGuard};
use super::outsourcing::{
    self, EntityId, NewOutsourceEntity, OutsourceEntity, OutsourceRequest, OutsourcingError,
    OutsourcingFilter,
};
use super::payments::{self, PaymentError, PaymentRequest};
use super::query::LoanQuery;
use super::record::{DerivationError, LoanRecord};
use super::repository::{EntityRepository, LoanRepository, RepositoryError};
use super::stats::DashboardStats;
use super::workflow::{self, WorkflowError};

const CODE_ATTEMPTS: usize = 3;

/// Facade composing authorization, validation, the lifecycle engines and persistence.
///
/// Every mutating call is one read-modify-write of a single loan guarded by its version, so
/// concurrent writers fail with a stale-version error instead of silently overwriting.
pub struct LoanService<R, E, D> {
    policy: Arc<dyn AccessPolicy>,
    guard: IntakeGuard,
    repository: Arc<R>,
    entities: Arc<E>,
    documents: Arc<D>,
    config: LendingConfig,
    loan_sequence: AtomicU64,
    entity_sequence: AtomicU64,
    document_sequence: AtomicU64,
    dashboard: TtlCache<String, DashboardStats>,
}

impl<R, E, D> LoanService<R, E, D>
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    pub fn new(repository: Arc<R>, entities: Arc<E>, documents: Arc<D>, config: LendingConfig) -> Self {
        let dashboard = TtlCache::new(config.dashboard_cache_ttl);
        Self {
            policy: Arc::new(RoleAccessPolicy),
            guard: IntakeGuard::default(),
            repository,
            entities,
            documents,
            config,
            loan_sequence: AtomicU64::new(1),
            entity_sequence: AtomicU64::new(1),
            document_sequence: AtomicU64::new(1),
            dashboard,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Resume loan numbering after an existing book.
    pub fn with_next_loan_sequence(self, next: u64) -> Self {
        self.loan_sequence.store(next, Ordering::Relaxed);
        self
    }

    pub fn with_guard(mut self, guard: IntakeGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    /// Submit a new loan application with derived figures populated.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: LoanSubmission,
    ) -> Result<LoanRecord, LoanServiceError> {
        self.authorize(actor, None, LoanAction::Create)?;
        self.guard.validate(
            &submission.applicant,
            &submission.terms,
            &submission.collateral,
        )
        .map_err(LoanServiceError::Validation)?;

        let now = Utc::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let sequence = self.loan_sequence.fetch_add(1, Ordering::Relaxed);
            let code = LoanCode::from_sequence(&self.config.loan_code_prefix, sequence)
                .ok_or_else(|| {
                    LoanServiceError::InvalidState(format!(
                        "loan code space for prefix {} is exhausted",
                        self.config.loan_code_prefix
                    ))
                })?;
            let record = LoanRecord::from_submission(
                code.clone(),
                submission.clone(),
                actor.id.clone(),
                self.config.initial_status,
                now,
            )?;

            match self.repository.insert(record) {
                Ok(stored) => {
                    info!(
                        loan = %stored.code,
                        actor = %actor.id,
                        status = stored.status.label(),
                        emi = stored.derived.monthly_emi,
                        "loan submitted"
                    );
                    return Ok(stored);
                }
                Err(RepositoryError::Conflict) if attempts < CODE_ATTEMPTS => {
                    debug!(loan = %code, "loan code taken, drawing the next one");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn get(&self, actor: &Actor, code: &LoanCode) -> Result<LoanRecord, LoanServiceError> {
        let record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::Read)?;
        Ok(record)
    }

    /// Active loans matching `query`; employees only ever see loans they submitted.
    pub fn list(
        &self,
        actor: &Actor,
        query: LoanQuery,
    ) -> Result<Vec<LoanRecord>, LoanServiceError> {
        self.authorize(actor, None, LoanAction::Read)?;
        let query = self.scoped(actor, query);
        let mut records = self.repository.list(&query)?;
        records.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(records)
    }

    /// Update applicant data or terms on a loan that is not closed.
    pub fn update(
        &self,
        actor: &Actor,
        code: &LoanCode,
        amendment: LoanAmendment,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::Update)?;
        ensure_open(&record)?;
        if amendment.is_empty() {
            return Err(LoanServiceError::Validation(vec![FieldError::new(
                "amendment",
                "no fields to update",
            )]));
        }

        let expected = record.version;
        let recomputed = record.apply_amendment(amendment)?;
        self.guard
            .validate(&record.applicant, &record.terms, &record.collateral)
            .map_err(LoanServiceError::Validation)?;
        let violations = record.invariant_violations();
        if !violations.is_empty() {
            return Err(LoanServiceError::InvalidState(format!(
                "amendment leaves loan {code} inconsistent: {}",
                violations.join(", ")
            )));
        }
        record.updated_at = Utc::now();

        let stored = self.repository.update(record, expected)?;
        info!(loan = %stored.code, actor = %actor.id, recomputed, "loan updated");
        Ok(stored)
    }

    /// Role-gated lifecycle move. Closure has its own operation.
    pub fn transition(
        &self,
        actor: &Actor,
        code: &LoanCode,
        target: LoanStatus,
        note: Option<String>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::Transition)?;

        let expected = record.version;
        let from = record.status;
        workflow::apply_transition(&mut record, actor, target, note, Utc::now())?;

        let stored = self.repository.update(record, expected)?;
        info!(
            loan = %stored.code,
            actor = %actor.id,
            from = from.label(),
            to = target.label(),
            "loan status changed"
        );
        Ok(stored)
    }

    /// Terminal settlement. Not safe to retry blindly: re-read the loan first.
    pub fn close(
        &self,
        actor: &Actor,
        code: &LoanCode,
        request: ClosureRequest,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::Close)?;

        let expected = record.version;
        let closure = closure::close(&mut record, actor, request, Utc::now())?;

        let stored = self.repository.update(record, expected)?;
        info!(
            loan = %stored.code,
            actor = %actor.id,
            reason = closure.reason.label(),
            final_amount = closure.final_amount,
            "loan closed"
        );
        Ok(stored)
    }

    pub fn amend_closure_notes(
        &self,
        actor: &Actor,
        code: &LoanCode,
        notes: Option<String>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::AmendClosure)?;

        let expected = record.version;
        closure::amend_notes(&mut record, notes, Utc::now())?;
        Ok(self.repository.update(record, expected)?)
    }

    pub fn record_payment(
        &self,
        actor: &Actor,
        code: &LoanCode,
        request: PaymentRequest,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::RecordPayment)?;

        let expected = record.version;
        let now = Utc::now();
        let entry = payments::append_payment(&mut record, request, actor.id.clone(), now.date_naive())?;
        record.updated_at = now;

        let stored = self.repository.update(record, expected)?;
        info!(
            loan = %stored.code,
            actor = %actor.id,
            month = entry.month_index,
            amount = entry.amount,
            outstanding = stored.outstanding_amount(),
            "payment recorded"
        );
        Ok(stored)
    }

    /// Delegate an approved loan to an outsource entity. Not safe to retry blindly.
    pub fn assign_outsource(
        &self,
        actor: &Actor,
        code: &LoanCode,
        entity_id: &EntityId,
        request: OutsourceRequest,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::Outsource)?;
        let entity = self
            .entities
            .fetch(entity_id)?
            .ok_or_else(|| LoanServiceError::NotFound(format!("outsource entity {entity_id}")))?;

        let expected = record.version;
        let assignment = outsourcing::assign(
            &mut record,
            &entity,
            request,
            self.guard.bounds(),
            Utc::now(),
        )?;

        let stored = self.repository.update(record, expected)?;
        info!(
            loan = %stored.code,
            actor = %actor.id,
            entity = %assignment.entity_id,
            amount = assignment.amount,
            margin = assignment.profit_margin,
            "loan outsourced"
        );
        if assignment.profit_margin < 0.0 {
            warn!(
                loan = %stored.code,
                margin = assignment.profit_margin,
                "outsourced at a negative margin"
            );
        }
        Ok(stored)
    }

    /// Approved loans in the configured bucket that have not been outsourced yet.
    pub fn available_for_outsourcing(
        &self,
        actor: &Actor,
    ) -> Result<Vec<LoanRecord>, LoanServiceError> {
        self.authorize(actor, None, LoanAction::ViewOutsourcing)?;
        let filter = OutsourcingFilter {
            account: self.config.outsourcing_account,
        };
        let query = LoanQuery {
            status: Some(LoanStatus::Approved),
            ..LoanQuery::default()
        };
        let mut records: Vec<LoanRecord> = self
            .repository
            .list(&query)?
            .into_iter()
            .filter(|record| filter.is_available(record))
            .collect();
        records.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(records)
    }

    pub fn outsourced_loans(&self, actor: &Actor) -> Result<Vec<LoanRecord>, LoanServiceError> {
        self.authorize(actor, None, LoanAction::ViewOutsourcing)?;
        let mut records: Vec<LoanRecord> = self
            .repository
            .list(&LoanQuery::default())?
            .into_iter()
            .filter(LoanRecord::is_outsourced)
            .collect();
        records.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(records)
    }

    pub fn register_entity(
        &self,
        actor: &Actor,
        entity: NewOutsourceEntity,
    ) -> Result<OutsourceEntity, LoanServiceError> {
        self.authorize(actor, None, LoanAction::ManageEntities)?;
        entity
            .validate(self.guard.bounds())
            .map_err(LoanServiceError::Validation)?;

        let sequence = self.entity_sequence.fetch_add(1, Ordering::Relaxed);
        let id = EntityId(format!("ent-{sequence:06}"));
        let stored = self
            .entities
            .insert(entity.into_entity(id, actor.id.clone(), Utc::now()))?;
        info!(entity = %stored.id, name = %stored.name, rate = stored.interest_rate, "outsource entity registered");
        Ok(stored)
    }

    pub fn list_entities(&self, actor: &Actor) -> Result<Vec<OutsourceEntity>, LoanServiceError> {
        self.authorize(actor, None, LoanAction::ViewOutsourcing)?;
        Ok(self.entities.list()?)
    }

    /// Soft-delete: the record stays in storage but disappears from every read.
    pub fn deactivate(&self, actor: &Actor, code: &LoanCode) -> Result<(), LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::Deactivate)?;

        let expected = record.version;
        record.is_active = false;
        record.updated_at = Utc::now();
        self.repository.update(record, expected)?;
        info!(loan = %code, actor = %actor.id, "loan deactivated");
        Ok(())
    }

    /// Store the document, then reference it from the loan. When the loan write fails the
    /// stored document is deleted again.
    pub fn attach_document(
        &self,
        actor: &Actor,
        code: &LoanCode,
        document: NewDocument,
    ) -> Result<DocumentRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::AttachDocument)?;

        let sequence = self.document_sequence.fetch_add(1, Ordering::Relaxed);
        let id = DocumentId(format!("doc-{sequence:06}"));
        let now = Utc::now();
        let stored = self.documents.save(DocumentRecord::new(
            id.clone(),
            code.clone(),
            actor.id.clone(),
            document,
            now,
        ))?;

        let expected = record.version;
        record.documents.push(DocumentRef {
            document_id: id.clone(),
            category: stored.category,
            verified: false,
        });
        record.updated_at = now;

        if let Err(err) = self.repository.update(record, expected) {
            warn!(loan = %code, document = %id, error = %err, "loan write failed, removing stored document");
            if let Err(cleanup) = self.documents.delete(&id) {
                warn!(document = %id, error = %cleanup, "compensation failed; left for the orphan sweep");
            }
            return Err(err.into());
        }

        info!(loan = %code, document = %id, actor = %actor.id, "document attached");
        Ok(stored)
    }

    /// Flip the loan's reference first, then the document store. A store failure restores the
    /// loan flag so both sides keep agreeing.
    pub fn verify_document(
        &self,
        actor: &Actor,
        code: &LoanCode,
        document_id: &DocumentId,
        verified: bool,
    ) -> Result<DocumentRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::VerifyDocument)?;
        let position = document_position(&record, document_id)?;

        let now = Utc::now();
        let expected = record.version;
        let previous = record.documents[position].verified;
        record.documents[position].verified = verified;
        record.updated_at = now;
        let mut stored = self.repository.update(record, expected)?;

        let verification = Verification {
            verified,
            verified_by: actor.id.clone(),
            verified_at: now,
        };
        match self.documents.set_verification(document_id, verification) {
            Ok(document) => {
                info!(loan = %code, document = %document_id, verified, "document verification recorded");
                Ok(document)
            }
            Err(err) => {
                warn!(loan = %code, document = %document_id, error = %err, "document store rejected verification, restoring loan flag");
                let version = stored.version;
                stored.documents[position].verified = previous;
                stored.updated_at = Utc::now();
                if let Err(revert) = self.repository.update(stored, version) {
                    warn!(loan = %code, document = %document_id, error = %revert, "verification flag left out of step");
                }
                Err(err.into())
            }
        }
    }

    /// Drop the loan's reference, then delete the document. A failed delete leaves an orphan
    /// for `reconcile_orphan_documents`.
    pub fn remove_document(
        &self,
        actor: &Actor,
        code: &LoanCode,
        document_id: &DocumentId,
    ) -> Result<LoanRecord, LoanServiceError> {
        let mut record = self.load(code)?;
        self.authorize(actor, Some(&record), LoanAction::RemoveDocument)?;
        let position = document_position(&record, document_id)?;

        let expected = record.version;
        record.documents.remove(position);
        record.updated_at = Utc::now();
        let stored = self.repository.update(record, expected)?;

        if let Err(err) = self.documents.delete(document_id) {
            warn!(document = %document_id, error = %err, "document delete failed; left for the orphan sweep");
        }
        Ok(stored)
    }

    /// Delete stored documents no loan references. Documents younger than `grace` are skipped
    /// because their loan write may still be in flight.
    pub fn reconcile_orphan_documents(
        &self,
        actor: &Actor,
        grace: chrono::Duration,
    ) -> Result<Vec<DocumentId>, LoanServiceError> {
        self.authorize(actor, None, LoanAction::Maintenance)?;

        let query = LoanQuery {
            include_inactive: true,
            ..LoanQuery::default()
        };
        let referenced: HashSet<(LoanCode, DocumentId)> = self
            .repository
            .list(&query)?
            .into_iter()
            .flat_map(|record| {
                let code = record.code;
                record
                    .documents
                    .into_iter()
                    .map(move |reference| (code.clone(), reference.document_id))
            })
            .collect();

        let cutoff = Utc::now() - grace;
        let mut removed = Vec::new();
        for document in self.documents.all()? {
            if document.uploaded_at > cutoff {
                continue;
            }
            if referenced.contains(&(document.loan.clone(), document.id.clone())) {
                continue;
            }
            match self.documents.delete(&document.id) {
                Ok(()) | Err(DocumentError::NotFound(_)) => removed.push(document.id),
                Err(err) => return Err(err.into()),
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "orphaned documents removed");
        }
        Ok(removed)
    }

    /// Portfolio statistics, served from a TTL cache and therefore possibly stale.
    pub fn dashboard(&self, actor: &Actor) -> Result<DashboardStats, LoanServiceError> {
        self.authorize(actor, None, LoanAction::ViewDashboard)?;
        let scope = if actor.role.is_privileged() {
            "all".to_string()
        } else {
            format!("owner:{}", actor.id)
        };
        let query = self.scoped(actor, LoanQuery::default());

        self.dashboard.get_or_try_insert_with(scope, || {
            let records = self.repository.list(&query)?;
            Ok(DashboardStats::from_records(&records))
        })
    }

    fn load(&self, code: &LoanCode) -> Result<LoanRecord, LoanServiceError> {
        self.repository
            .fetch(code)?
            .filter(|record| record.is_active)
            .ok_or_else(|| LoanServiceError::NotFound(format!("loan {code}")))
    }

    fn authorize(
        &self,
        actor: &Actor,
        loan: Option<&LoanRecord>,
        action: LoanAction,
    ) -> Result<(), LoanServiceError> {
        self.policy.check(actor, loan, action).map_err(|denied| {
            debug!(actor = %actor.id, action = action.label(), "access denied");
            LoanServiceError::Forbidden(denied)
        })
    }

    fn scoped(&self, actor: &Actor, mut query: LoanQuery) -> LoanQuery {
        query.include_inactive = false;
        query.created_by = if actor.role.is_privileged() {
            None
        } else {
            Some(actor.id.clone())
        };
        query
    }
}

fn ensure_open(record: &LoanRecord) -> Result<(), LoanServiceError> {
    if record.status == LoanStatus::Closed {
        return Err(LoanServiceError::InvalidState(format!(
            "loan {} is closed",
            record.code
        )));
    }
    Ok(())
}

fn document_position(
    record: &LoanRecord,
    document_id: &DocumentId,
) -> Result<usize, LoanServiceError> {
    record
        .documents
        .iter()
        .position(|reference| &reference.document_id == document_id)
        .ok_or_else(|| {
            LoanServiceError::NotFound(format!("document {document_id} on loan {}", record.code))
        })
}

/// Error raised by the loan service.
#[derive(Debug, thiserror::Error)]
pub enum LoanServiceError {
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(AccessDenied),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("loan {0} is already outsourced")]
    AlreadyOutsourced(LoanCode),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl LoanServiceError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) | Self::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidState(_)
            | Self::AlreadyOutsourced(_)
            | Self::Repository(RepositoryError::Conflict | RepositoryError::StaleVersion { .. }) => {
                StatusCode::CONFLICT
            }
            Self::Repository(RepositoryError::Unavailable(_)) | Self::Document(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::AlreadyOutsourced(_) => "ALREADY_OUTSOURCED",
            Self::Repository(RepositoryError::Conflict | RepositoryError::StaleVersion { .. }) => {
                "CONFLICT"
            }
            Self::Repository(RepositoryError::NotFound) => "NOT_FOUND",
            Self::Repository(RepositoryError::Unavailable(_)) | Self::Document(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<DerivationError> for LoanServiceError {
    fn from(value: DerivationError) -> Self {
        Self::Validation(vec![FieldError::new("terms", value.to_string())])
    }
}

impl From<WorkflowError> for LoanServiceError {
    fn from(value: WorkflowError) -> Self {
        Self::InvalidState(value.to_string())
    }
}

impl From<ClosureError> for LoanServiceError {
    fn from(value: ClosureError) -> Self {
        match value {
            ClosureError::Invalid(errors) => Self::Validation(errors),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<PaymentError> for LoanServiceError {
    fn from(value: PaymentError) -> Self {
        match value {
            PaymentError::Invalid(errors) => Self::Validation(errors),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<OutsourcingError> for LoanServiceError {
    fn from(value: OutsourcingError) -> Self {
        match value {
            OutsourcingError::AlreadyOutsourced(code) => Self::AlreadyOutsourced(LoanCode(code)),
            OutsourcingError::InvalidTerms(errors) => Self::Validation(errors),
            OutsourcingError::InactiveEntity(id) => Self::Validation(vec![FieldError::new(
                "entity_id",
                format!("entity {id} is inactive"),
            )]),
            other @ OutsourcingError::NotApproved(_) => Self::InvalidState(other.to_string()),
        }
    }
}
