//! Contract with the external document store.
//!
//! Storage mechanics (uploads, blobs, paths) live outside the loan engine. The engine keeps a
//! reference on the loan plus the verification flag it is told about.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::loans::domain::{ActorId, LoanCode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Identity,
    AddressProof,
    IncomeProof,
    CollateralPhoto,
    Agreement,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub verified_by: ActorId,
    pub verified_at: DateTime<Utc>,
}

/// Metadata supplied when a document is attached to a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub original_name: String,
    pub storage_path: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub category: DocumentCategory,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub loan: LoanCode,
    pub uploaded_by: ActorId,
    pub uploaded_at: DateTime<Utc>,
    pub filename: String,
    pub original_name: String,
    pub storage_path: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub category: DocumentCategory,
    pub tags: Vec<String>,
    pub verification: Option<Verification>,
}

impl DocumentRecord {
    pub fn new(
        id: DocumentId,
        loan: LoanCode,
        uploaded_by: ActorId,
        document: NewDocument,
        now: DateTime<Utc>,
    ) -> Self {
        let NewDocument {
            filename,
            original_name,
            storage_path,
            size_bytes,
            mime_type,
            category,
            tags,
        } = document;

        Self {
            id,
            loan,
            uploaded_by,
            uploaded_at: now,
            filename,
            original_name,
            storage_path,
            size_bytes,
            mime_type,
            category,
            tags,
            verification: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification
            .as_ref()
            .map_or(false, |verification| verification.verified)
    }
}

/// Storage abstraction for document metadata. Implementations own the blobs.
pub trait DocumentStore: Send + Sync {
    fn save(&self, document: DocumentRecord) -> Result<DocumentRecord, DocumentError>;
    fn fetch(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, DocumentError>;
    fn set_verification(
        &self,
        id: &DocumentId,
        verification: Verification,
    ) -> Result<DocumentRecord, DocumentError>;
    fn delete(&self, id: &DocumentId) -> Result<(), DocumentError>;
    fn all(&self) -> Result<Vec<DocumentRecord>, DocumentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document {0} not found")]
    NotFound(DocumentId),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}
