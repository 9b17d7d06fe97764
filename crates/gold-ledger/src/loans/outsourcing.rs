use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amortization::round_currency;
use super::domain::{AccountBucket, ActorId, LoanStatus, OutsourceAssignment};
use super::intake::{FieldError, TermBounds};
use super::record::LoanRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Individual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityContact {
    #[serde(default)]
    pub person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Third party that takes over collection of a loan at its own rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutsourceEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub contact: EntityContact,
    pub address: Option<String>,
    pub interest_rate: f64,
    pub max_loan_amount: f64,
    pub status: EntityStatus,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

/// Registration payload for a new outsource entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutsourceEntity {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub contact: EntityContact,
    #[serde(default)]
    pub address: Option<String>,
    pub interest_rate: f64,
    pub max_loan_amount: f64,
}

impl NewOutsourceEntity {
    pub fn validate(&self, bounds: &TermBounds) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "name is required"));
        }
        let (min_rate, max_rate) = bounds.interest_rate;
        if !self.interest_rate.is_finite()
            || self.interest_rate < min_rate
            || self.interest_rate > max_rate
        {
            errors.push(FieldError::new(
                "interest_rate",
                format!("must be between {min_rate} and {max_rate}"),
            ));
        }
        if !(self.max_loan_amount.is_finite() && self.max_loan_amount > 0.0) {
            errors.push(FieldError::new("max_loan_amount", "must be positive"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn into_entity(self, id: EntityId, created_by: ActorId, now: DateTime<Utc>) -> OutsourceEntity {
        OutsourceEntity {
            id,
            name: self.name.trim().to_string(),
            kind: self.kind,
            contact: self.contact,
            address: self.address,
            interest_rate: self.interest_rate,
            max_loan_amount: self.max_loan_amount,
            status: EntityStatus::Active,
            created_by,
            created_at: now,
        }
    }
}

/// Optional overrides supplied when delegating a loan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutsourceRequest {
    pub custom_amount: Option<f64>,
    pub custom_interest_rate: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutsourcingError {
    #[error("loan {0} is already outsourced")]
    AlreadyOutsourced(String),
    #[error("only approved loans can be outsourced (loan is {})", .0.label())]
    NotApproved(LoanStatus),
    #[error("entity {0} is inactive")]
    InactiveEntity(EntityId),
    #[error("invalid outsourcing terms")]
    InvalidTerms(Vec<FieldError>),
}

/// Delegate an approved loan to `entity`, computing the rate spread it earns.
///
/// The loan status is untouched: outsourcing is orthogonal to the approval lifecycle. The
/// margin may be negative; it is reported, not forbidden.
pub fn assign(
    record: &mut LoanRecord,
    entity: &OutsourceEntity,
    request: OutsourceRequest,
    bounds: &TermBounds,
    now: DateTime<Utc>,
) -> Result<OutsourceAssignment, OutsourcingError> {
    if record.is_outsourced() {
        return Err(OutsourcingError::AlreadyOutsourced(record.code.0.clone()));
    }
    if record.status != LoanStatus::Approved {
        return Err(OutsourcingError::NotApproved(record.status));
    }
    if entity.status == EntityStatus::Inactive {
        return Err(OutsourcingError::InactiveEntity(entity.id.clone()));
    }

    let OutsourceRequest {
        custom_amount,
        custom_interest_rate,
        notes,
    } = request;
    let amount = custom_amount.unwrap_or(record.terms.loan_amount);
    let interest_rate = custom_interest_rate.unwrap_or(entity.interest_rate);

    let mut errors = Vec::new();
    if !(amount.is_finite() && amount > 0.0) {
        errors.push(FieldError::new("custom_amount", "must be positive"));
    } else if amount > entity.max_loan_amount {
        errors.push(FieldError::new(
            "custom_amount",
            format!(
                "exceeds {}'s maximum of {}",
                entity.name, entity.max_loan_amount
            ),
        ));
    }
    let (min_rate, max_rate) = bounds.interest_rate;
    if !interest_rate.is_finite() || interest_rate < min_rate || interest_rate > max_rate {
        errors.push(FieldError::new(
            "custom_interest_rate",
            format!("must be between {min_rate} and {max_rate}"),
        ));
    }
    if !errors.is_empty() {
        return Err(OutsourcingError::InvalidTerms(errors));
    }

    let assignment = OutsourceAssignment {
        entity_id: entity.id.clone(),
        entity_name: entity.name.clone(),
        assigned_at: now,
        amount: round_currency(amount),
        interest_rate,
        profit_margin: round_currency(record.terms.interest_rate - interest_rate),
        notes,
    };

    record.outsourcing = Some(assignment.clone());
    record.updated_at = now;
    Ok(assignment)
}

/// Business rule selecting loans offered to outsource partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutsourcingFilter {
    pub account: Option<AccountBucket>,
}

impl OutsourcingFilter {
    pub fn is_available(&self, record: &LoanRecord) -> bool {
        record.is_active
            && record.status == LoanStatus::Approved
            && !record.is_outsourced()
            && self
                .account
                .map_or(true, |account| record.account() == account)
    }
}
