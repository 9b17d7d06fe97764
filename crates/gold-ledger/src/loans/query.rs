use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{AccountBucket, ActorId, LoanStatus};
use super::record::LoanRecord;

/// Read-side filter shared by repositories and the HTTP listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub account: Option<AccountBucket>,
    /// Inclusive bounds on the application date.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case-insensitive match on applicant name, email or loan code.
    pub search: Option<String>,
    #[serde(skip)]
    pub created_by: Option<ActorId>,
    #[serde(skip)]
    pub include_inactive: bool,
}

impl LoanQuery {
    pub fn matches(&self, record: &LoanRecord) -> bool {
        if !self.include_inactive && !record.is_active {
            return false;
        }
        if self.status.is_some_and(|status| record.status != status) {
            return false;
        }
        if self.account.is_some_and(|account| record.account() != account) {
            return false;
        }
        if self.from.is_some_and(|from| record.application_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.application_date > to) {
            return false;
        }
        if let Some(owner) = &self.created_by {
            if &record.created_by != owner {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                record.applicant.name.to_lowercase().contains(&needle)
                    || record.code.0.to_lowercase().contains(&needle)
                    || record
                        .applicant
                        .email
                        .as_deref()
                        .is_some_and(|email| email.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}
