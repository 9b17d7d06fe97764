use super::domain::LoanCode;
use super::outsourcing::{EntityId, OutsourceEntity};
use super::query::LoanQuery;
use super::record::LoanRecord;

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Each call is one atomic per-record operation; there are no cross-record transactions.
pub trait LoanRepository: Send + Sync {
    fn insert(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError>;
    /// Replace the stored record if its version still equals `expected_version`, storing the
    /// record with the version bumped by one.
    fn update(
        &self,
        record: LoanRecord,
        expected_version: u64,
    ) -> Result<LoanRecord, RepositoryError>;
    fn fetch(&self, code: &LoanCode) -> Result<Option<LoanRecord>, RepositoryError>;
    fn list(&self, query: &LoanQuery) -> Result<Vec<LoanRecord>, RepositoryError>;
}

/// Registry of outsource partners.
pub trait EntityRepository: Send + Sync {
    fn insert(&self, entity: OutsourceEntity) -> Result<OutsourceEntity, RepositoryError>;
    fn fetch(&self, id: &EntityId) -> Result<Option<OutsourceEntity>, RepositoryError>;
    fn list(&self) -> Result<Vec<OutsourceEntity>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion { expected: u64, found: u64 },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
