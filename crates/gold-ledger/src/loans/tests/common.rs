use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::config::LendingConfig;
use crate::documents::{DocumentError, DocumentId, DocumentRecord, DocumentStore, Verification};
use crate::loans::access::{Actor, Role};
use crate::loans::domain::{
    AccountBucket, ActorId, Applicant, CollateralItem, LoanCode, LoanStatus, LoanSubmission,
    LoanTerms, PostalAddress, Purity,
};
use crate::loans::outsourcing::{
    EntityContact, EntityId, EntityKind, EntityStatus, NewOutsourceEntity, OutsourceEntity,
};
use crate::loans::query::LoanQuery;
use crate::loans::record::LoanRecord;
use crate::loans::repository::{EntityRepository, LoanRepository, RepositoryError};
use crate::loans::service::LoanService;

pub(crate) type TestService =
    LoanService<MemoryLoanRepository, MemoryEntityRepository, MemoryDocumentStore>;

pub(crate) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(crate) fn officer() -> Actor {
    Actor::new("officer-1", Role::LoanOfficer)
}

pub(crate) fn employee(id: &str) -> Actor {
    Actor::new(id, Role::Employee)
}

pub(crate) fn applicant() -> Applicant {
    Applicant {
        name: "Meera Pillai".to_string(),
        phone: "+91 98470 12345".to_string(),
        email: Some("meera.pillai@example.in".to_string()),
        address: Some(PostalAddress {
            street: "14 Temple Road".to_string(),
            city: "Thrissur".to_string(),
            state: "Kerala".to_string(),
            zip: "680001".to_string(),
            country: "IN".to_string(),
        }),
    }
}

pub(crate) fn terms() -> LoanTerms {
    LoanTerms {
        loan_amount: 100_000.0,
        net_weight: 15.0,
        gross_weight: 17.0,
        purity: Purity::K22,
        interest_rate: 12.0,
        term_months: 12,
        account: AccountBucket::Secondary,
    }
}

pub(crate) fn collateral() -> Vec<CollateralItem> {
    vec![
        CollateralItem {
            name: "Bangle".to_string(),
            kind: "bangle".to_string(),
            net_weight: 10.0,
            gross_weight: 11.0,
            purity: Purity::K22,
            estimated_value: 62_000.0,
            description: "Plain band, hallmark visible".to_string(),
            pictures: Vec::new(),
        },
        CollateralItem {
            name: "Chain".to_string(),
            kind: "chain".to_string(),
            net_weight: 5.0,
            gross_weight: 6.0,
            purity: Purity::K22,
            estimated_value: 31_000.0,
            description: String::new(),
            pictures: Vec::new(),
        },
    ]
}

pub(crate) fn submission() -> LoanSubmission {
    LoanSubmission {
        applicant: applicant(),
        terms: terms(),
        collateral: collateral(),
        application_date: NaiveDate::from_ymd_opt(2025, 1, 31),
    }
}

pub(crate) fn approved_loan(code: &str, created_by: &str) -> LoanRecord {
    LoanRecord::from_submission(
        LoanCode(code.to_string()),
        submission(),
        ActorId(created_by.to_string()),
        LoanStatus::Approved,
        Utc::now(),
    )
    .expect("fixture terms derive")
}

pub(crate) fn new_entity(interest_rate: f64) -> NewOutsourceEntity {
    NewOutsourceEntity {
        name: "Sunrise Capital".to_string(),
        kind: EntityKind::Organization,
        contact: EntityContact {
            person: Some("R. Nair".to_string()),
            phone: Some("+91 484 220 1100".to_string()),
            email: Some("desk@sunrise.example".to_string()),
        },
        address: None,
        interest_rate,
        max_loan_amount: 500_000.0,
    }
}

pub(crate) fn outsource_entity(id: &str, interest_rate: f64) -> OutsourceEntity {
    new_entity(interest_rate).into_entity(
        EntityId(id.to_string()),
        ActorId("admin-1".to_string()),
        Utc::now(),
    )
}

pub(crate) fn lending_config(initial_status: LoanStatus) -> LendingConfig {
    LendingConfig {
        initial_status,
        dashboard_cache_ttl: Duration::from_secs(60),
        ..LendingConfig::default()
    }
}

pub(crate) struct Harness {
    pub(crate) service: TestService,
    pub(crate) loans: Arc<MemoryLoanRepository>,
    pub(crate) entities: Arc<MemoryEntityRepository>,
    pub(crate) documents: Arc<MemoryDocumentStore>,
}

pub(crate) fn harness(initial_status: LoanStatus) -> Harness {
    let loans = Arc::new(MemoryLoanRepository::default());
    let entities = Arc::new(MemoryEntityRepository::default());
    let documents = Arc::new(MemoryDocumentStore::default());
    let service = LoanService::new(
        loans.clone(),
        entities.clone(),
        documents.clone(),
        lending_config(initial_status),
    );
    Harness {
        service,
        loans,
        entities,
        documents,
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryLoanRepository {
    pub(crate) records: Arc<Mutex<HashMap<LoanCode, LoanRecord>>>,
    pub(crate) fail_updates: Arc<AtomicBool>,
}

impl MemoryLoanRepository {
    pub(crate) fn stored(&self, code: &LoanCode) -> LoanRecord {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(code)
            .cloned()
            .expect("record stored")
    }

    pub(crate) fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

impl LoanRepository for MemoryLoanRepository {
    fn insert(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
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
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("write rejected".to_string()));
        }
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let found = guard
            .get(&record.code)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound)?;
        if found != expected_version {
            return Err(RepositoryError::StaleVersion {
                expected: expected_version,
                found,
            });
        }
        record.version = expected_version + 1;
        guard.insert(record.code.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, code: &LoanCode) -> Result<Option<LoanRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(code).cloned())
    }

    fn list(&self, query: &LoanQuery) -> Result<Vec<LoanRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryEntityRepository {
    pub(crate) entities: Arc<Mutex<HashMap<EntityId, OutsourceEntity>>>,
}

impl MemoryEntityRepository {
    pub(crate) fn set_status(&self, id: &EntityId, status: EntityStatus) {
        if let Some(entity) = self
            .entities
            .lock()
            .expect("entity mutex poisoned")
            .get_mut(id)
        {
            entity.status = status;
        }
    }
}

impl EntityRepository for MemoryEntityRepository {
    fn insert(&self, entity: OutsourceEntity) -> Result<OutsourceEntity, RepositoryError> {
        let mut guard = self.entities.lock().expect("entity mutex poisoned");
        if guard.contains_key(&entity.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    fn fetch(&self, id: &EntityId) -> Result<Option<OutsourceEntity>, RepositoryError> {
        Ok(self
            .entities
            .lock()
            .expect("entity mutex poisoned")
            .get(id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<OutsourceEntity>, RepositoryError> {
        let mut entities: Vec<_> = self
            .entities
            .lock()
            .expect("entity mutex poisoned")
            .values()
            .cloned()
            .collect();
        entities.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(entities)
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryDocumentStore {
    pub(crate) documents: Arc<Mutex<HashMap<DocumentId, DocumentRecord>>>,
    pub(crate) fail_deletes: Arc<AtomicBool>,
    pub(crate) fail_verifications: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    pub(crate) fn ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self
            .documents
            .lock()
            .expect("document mutex poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_verifications(&self) {
        self.fail_verifications.store(true, Ordering::SeqCst);
    }

    /// Store a document that no loan refers to, as left behind by a crashed attach.
    pub(crate) fn plant_orphan(&self, record: DocumentRecord) {
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .insert(record.id.clone(), record);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn save(&self, document: DocumentRecord) -> Result<DocumentRecord, DocumentError> {
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .insert(document.id.clone(), document.clone());
        Ok(document)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, DocumentError> {
        Ok(self
            .documents
            .lock()
            .expect("document mutex poisoned")
            .get(id)
            .cloned())
    }

    fn set_verification(
        &self,
        id: &DocumentId,
        verification: Verification,
    ) -> Result<DocumentRecord, DocumentError> {
        if self.fail_verifications.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable("blob store offline".to_string()));
        }
        let mut guard = self.documents.lock().expect("document mutex poisoned");
        let document = guard
            .get_mut(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        document.verification = Some(verification);
        Ok(document.clone())
    }

    fn delete(&self, id: &DocumentId) -> Result<(), DocumentError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable("blob store offline".to_string()));
        }
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DocumentError::NotFound(id.clone()))
    }

    fn all(&self) -> Result<Vec<DocumentRecord>, DocumentError> {
        Ok(self
            .documents
            .lock()
            .expect("document mutex poisoned")
            .values()
            .cloned()
            .collect())
    }
}

pub(crate) struct UnavailableRepository;

impl LoanRepository for UnavailableRepository {
    fn insert(&self, _record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _record: LoanRecord,
        _expected_version: u64,
    ) -> Result<LoanRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _code: &LoanCode) -> Result<Option<LoanRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _query: &LoanQuery) -> Result<Vec<LoanRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(crate) fn unavailable_service(
) -> LoanService<UnavailableRepository, MemoryEntityRepository, MemoryDocumentStore> {
    LoanService::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryEntityRepository::default()),
        Arc::new(MemoryDocumentStore::default()),
        LendingConfig::default(),
    )
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
