use chrono::NaiveDate;
use gold_ledger::documents::{DocumentError, DocumentId, DocumentRecord, DocumentStore, Verification};
use gold_ledger::loans::{
    EntityId, EntityRepository, LoanCode, LoanQuery, LoanRecord, LoanRepository, LoanStatus,
    OutsourceEntity, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("storage mutex poisoned".to_string()))
}

/// Process-local loan book with per-record version checks.
#[derive(Default, Clone)]
pub(crate) struct InMemoryLoanRepository {
    records: Arc<Mutex<HashMap<LoanCode, LoanRecord>>>,
}

impl LoanRepository for InMemoryLoanRepository {
    fn insert(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&record.code) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.code.clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        mut record: LoanRecord,
        expected_version: u64,
    ) -> Result<LoanRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let found = match guard.get(&record.code) {
            Some(stored) => stored.version,
            None => return Err(RepositoryError::NotFound),
        };
        if found != expected_version {
            return Err(RepositoryError::StaleVersion {
                expected: expected_version,
                found,
            });
        }
        record.version = found + 1;
        guard.insert(record.code.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, code: &LoanCode) -> Result<Option<LoanRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(code).cloned())
    }

    fn list(&self, query: &LoanQuery) -> Result<Vec<LoanRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEntityRepository {
    entities: Arc<Mutex<HashMap<EntityId, OutsourceEntity>>>,
}

impl EntityRepository for InMemoryEntityRepository {
    fn insert(&self, entity: OutsourceEntity) -> Result<OutsourceEntity, RepositoryError> {
        let mut guard = lock(&self.entities)?;
        if guard.contains_key(&entity.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    fn fetch(&self, id: &EntityId) -> Result<Option<OutsourceEntity>, RepositoryError> {
        let guard = lock(&self.entities)?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<OutsourceEntity>, RepositoryError> {
        let guard = lock(&self.entities)?;
        let mut entities: Vec<_> = guard.values().cloned().collect();
        entities.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(entities)
    }
}

/// Metadata-only document store; blobs live wherever `storage_path` points.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    documents: Arc<Mutex<HashMap<DocumentId, DocumentRecord>>>,
}

impl InMemoryDocumentStore {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<DocumentId, DocumentRecord>>, DocumentError> {
        self.documents
            .lock()
            .map_err(|_| DocumentError::Unavailable("document mutex poisoned".to_string()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn save(&self, document: DocumentRecord) -> Result<DocumentRecord, DocumentError> {
        self.guard()?.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, DocumentError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn set_verification(
        &self,
        id: &DocumentId,
        verification: Verification,
    ) -> Result<DocumentRecord, DocumentError> {
        let mut guard = self.guard()?;
        let document = guard
            .get_mut(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        document.verification = Some(verification);
        Ok(document.clone())
    }

    fn delete(&self, id: &DocumentId) -> Result<(), DocumentError> {
        self.guard()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DocumentError::NotFound(id.clone()))
    }

    fn all(&self) -> Result<Vec<DocumentRecord>, DocumentError> {
        Ok(self.guard()?.values().cloned().collect())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_status(raw: &str) -> Result<LoanStatus, String> {
    match LoanStatus::parse(raw) {
        Some(status @ (LoanStatus::Pending | LoanStatus::UnderReview | LoanStatus::Approved)) => {
            Ok(status)
        }
        Some(status) => Err(format!("'{}' cannot be an intake status", status.label())),
        None => Err(format!("unknown loan status '{raw}'")),
    }
}
