use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::documents::{DocumentCategory, DocumentId};

use super::outsourcing::EntityId;

/// Human-readable loan code: configured prefix followed by six digits (e.g. `GL000042`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanCode(pub String);

impl LoanCode {
    pub const MAX_SEQUENCE: u64 = 999_999;

    /// `None` once the sequence no longer fits in six digits.
    pub fn from_sequence(prefix: &str, sequence: u64) -> Option<Self> {
        (sequence <= Self::MAX_SEQUENCE).then(|| Self(format!("{prefix}{sequence:06}")))
    }
}

impl fmt::Display for LoanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identity handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    Approved,
    UnderReview,
    Rejected,
    Closed,
}

impl LoanStatus {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Pending,
            Self::UnderReview,
            Self::Approved,
            Self::Rejected,
            Self::Closed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::UnderReview => "under_review",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ordered()
            .into_iter()
            .find(|status| status.label() == normalized)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Closed)
    }
}

/// Operational bookkeeping bucket. Has no bearing on lifecycle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountBucket {
    Primary,
    Secondary,
    Reserve,
}

impl AccountBucket {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Reserve => "reserve",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "reserve" => Some(Self::Reserve),
            _ => None,
        }
    }
}

/// Fixed gold purity grades accepted at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purity {
    #[serde(rename = "24k")]
    K24,
    #[serde(rename = "22k")]
    K22,
    #[serde(rename = "20k")]
    K20,
    #[serde(rename = "18k")]
    K18,
    #[serde(rename = "14k")]
    K14,
}

impl Purity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::K24 => "24k",
            Self::K22 => "22k",
            Self::K20 => "20k",
            Self::K18 => "18k",
            Self::K14 => "14k",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<PostalAddress>,
}

/// Financial terms captured at submission. Weights are grams; rate is an annual percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount: f64,
    pub net_weight: f64,
    pub gross_weight: f64,
    pub purity: Purity,
    pub interest_rate: f64,
    pub term_months: u32,
    pub account: AccountBucket,
}

/// Reference to a picture held by the external document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureRef(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub net_weight: f64,
    pub gross_weight: f64,
    pub purity: Purity,
    pub estimated_value: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pictures: Vec<PictureRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
    Card,
    Other,
}

/// Immutable payment history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub month_index: u32,
    pub amount: f64,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    pub recorded_by: ActorId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: LoanStatus,
    pub to: LoanStatus,
    pub at: DateTime<Utc>,
    pub by: ActorId,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureReason {
    FullyPaid,
    Settlement,
    WriteOff,
    CollateralAuction,
    Other,
}

impl ClosureReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullyPaid => "fully_paid",
            Self::Settlement => "settlement",
            Self::WriteOff => "write_off",
            Self::CollateralAuction => "collateral_auction",
            Self::Other => "other",
        }
    }
}

/// Settlement metadata. Present exactly when the loan is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub closed_at: DateTime<Utc>,
    pub closed_by: ActorId,
    pub reason: ClosureReason,
    pub notes: Option<String>,
    pub final_amount: f64,
}

/// Delegation of a loan to an outsource entity.
///
/// `entity_name` is a display copy taken at assignment time; it goes stale when the entity is
/// renamed and is never consulted for decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutsourceAssignment {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub assigned_at: DateTime<Utc>,
    pub amount: f64,
    pub interest_rate: f64,
    pub profit_margin: f64,
    pub notes: Option<String>,
}

/// Loan-side pointer to a document owned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: DocumentId,
    pub category: DocumentCategory,
    pub verified: bool,
}

/// Payload accepted from the submitting actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSubmission {
    pub applicant: Applicant,
    pub terms: LoanTerms,
    #[serde(default)]
    pub collateral: Vec<CollateralItem>,
    /// Defaults to the submission date.
    #[serde(default)]
    pub application_date: Option<NaiveDate>,
}

/// Partial update of a pre-closure loan. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanAmendment {
    pub applicant: Option<Applicant>,
    pub loan_amount: Option<f64>,
    pub net_weight: Option<f64>,
    pub gross_weight: Option<f64>,
    pub purity: Option<Purity>,
    pub interest_rate: Option<f64>,
    pub term_months: Option<u32>,
    pub account: Option<AccountBucket>,
    pub collateral: Option<Vec<CollateralItem>>,
}

impl LoanAmendment {
    pub fn touches_financial_terms(&self) -> bool {
        self.loan_amount.is_some()
            || self.interest_rate.is_some()
            || self.term_months.is_some()
            || self.net_weight.is_some()
            || self.gross_weight.is_some()
            || self.collateral.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
