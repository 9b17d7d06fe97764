use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amortization::{amortize, round_currency, Amortization, AmortizationError};
use super::collateral::{aggregate, due_date};
use super::domain::{
    AccountBucket, ActorId, Applicant, ClosureRecord, CollateralItem, DocumentRef, LoanAmendment,
    LoanCode, LoanStatus, LoanSubmission, LoanTerms, OutsourceAssignment, PaymentEntry,
    StatusChange,
};

/// Figures recomputed from terms and collateral; never accepted from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTerms {
    pub monthly_emi: f64,
    pub total_interest: f64,
    pub total_amount: f64,
    pub total_net_weight: f64,
    pub total_gross_weight: f64,
    pub total_estimated_value: f64,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DerivationError {
    #[error(transparent)]
    Amortization(#[from] AmortizationError),
    #[error("due date overflows the calendar ({application_date} + {term_months} months)")]
    DueDateOverflow {
        application_date: NaiveDate,
        term_months: u32,
    },
}

impl DerivedTerms {
    pub fn compute(
        terms: &LoanTerms,
        collateral: &[CollateralItem],
        application_date: NaiveDate,
    ) -> Result<Self, DerivationError> {
        let Amortization {
            monthly_emi,
            total_interest,
            total_amount,
        } = amortize(terms.loan_amount, terms.interest_rate, terms.term_months)?;

        // Legacy single-item loans carry their weight on the terms.
        let (total_net_weight, total_gross_weight, total_estimated_value) = if collateral.is_empty()
        {
            (terms.net_weight, terms.gross_weight, 0.0)
        } else {
            let totals = aggregate(collateral);
            (totals.net_weight, totals.gross_weight, totals.estimated_value)
        };

        let due_date = due_date(application_date, terms.term_months).ok_or(
            DerivationError::DueDateOverflow {
                application_date,
                term_months: terms.term_months,
            },
        )?;

        Ok(Self {
            monthly_emi,
            total_interest,
            total_amount,
            total_net_weight,
            total_gross_weight,
            total_estimated_value,
            due_date,
        })
    }
}

/// Aggregate root for one gold loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub code: LoanCode,
    pub applicant: Applicant,
    pub terms: LoanTerms,
    pub collateral: Vec<CollateralItem>,
    pub application_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub created_by: ActorId,
    pub status: LoanStatus,
    pub approved_at: Option<DateTime<Utc>>,
    /// `None` with `approved_at` set means the loan was approved automatically on intake.
    pub approved_by: Option<ActorId>,
    pub derived: DerivedTerms,
    pub payments: Vec<PaymentEntry>,
    pub status_history: Vec<StatusChange>,
    pub outsourcing: Option<OutsourceAssignment>,
    pub closure: Option<ClosureRecord>,
    pub documents: Vec<DocumentRef>,
    pub is_active: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl LoanRecord {
    pub fn from_submission(
        code: LoanCode,
        submission: LoanSubmission,
        created_by: ActorId,
        initial_status: LoanStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, DerivationError> {
        let LoanSubmission {
            applicant,
            terms,
            collateral,
            application_date,
        } = submission;
        let application_date = application_date.unwrap_or_else(|| now.date_naive());
        let derived = DerivedTerms::compute(&terms, &collateral, application_date)?;
        let approved_at = (initial_status == LoanStatus::Approved).then_some(now);

        Ok(Self {
            code,
            applicant,
            terms,
            collateral,
            application_date,
            submitted_at: now,
            created_by,
            status: initial_status,
            approved_at,
            approved_by: None,
            derived,
            payments: Vec::new(),
            status_history: Vec::new(),
            outsourcing: None,
            closure: None,
            documents: Vec::new(),
            is_active: true,
            version: 0,
            updated_at: now,
        })
    }

    pub fn recompute(&mut self) -> Result<(), DerivationError> {
        self.derived = DerivedTerms::compute(&self.terms, &self.collateral, self.application_date)?;
        Ok(())
    }

    /// Apply a partial update and return whether derived figures had to be recomputed.
    pub fn apply_amendment(&mut self, amendment: LoanAmendment) -> Result<bool, DerivationError> {
        let recompute = amendment.touches_financial_terms();
        let LoanAmendment {
            applicant,
            loan_amount,
            net_weight,
            gross_weight,
            purity,
            interest_rate,
            term_months,
            account,
            collateral,
        } = amendment;

        if let Some(applicant) = applicant {
            self.applicant = applicant;
        }
        if let Some(value) = loan_amount {
            self.terms.loan_amount = value;
        }
        if let Some(value) = net_weight {
            self.terms.net_weight = value;
        }
        if let Some(value) = gross_weight {
            self.terms.gross_weight = value;
        }
        if let Some(value) = purity {
            self.terms.purity = value;
        }
        if let Some(value) = interest_rate {
            self.terms.interest_rate = value;
            if let Some(assignment) = self.outsourcing.as_mut() {
                assignment.profit_margin = round_currency(value - assignment.interest_rate);
            }
        }
        if let Some(value) = term_months {
            self.terms.term_months = value;
        }
        if let Some(value) = account {
            self.terms.account = value;
        }
        if let Some(items) = collateral {
            self.collateral = items;
        }

        if recompute {
            self.recompute()?;
        }
        Ok(recompute)
    }

    pub fn account(&self) -> AccountBucket {
        self.terms.account
    }

    pub fn is_outsourced(&self) -> bool {
        self.outsourcing.is_some()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closure.as_ref().map(|closure| closure.closed_at)
    }

    pub fn total_paid(&self) -> f64 {
        round_currency(self.payments.iter().map(|payment| payment.amount).sum())
    }

    /// Total payable less recorded payments, never negative.
    pub fn outstanding_amount(&self) -> f64 {
        round_currency((self.derived.total_amount - self.total_paid()).max(0.0))
    }

    pub fn push_status_change(
        &mut self,
        to: LoanStatus,
        by: ActorId,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            at,
            by,
            note,
        });
        self.status = to;
    }

    /// Structural invariants; an empty list means the record is consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.terms.gross_weight < self.terms.net_weight {
            violations.push("gross weight below net weight".to_string());
        }
        for (index, item) in self.collateral.iter().enumerate() {
            if item.gross_weight < item.net_weight {
                violations.push(format!("collateral[{index}] gross weight below net weight"));
            }
        }

        if !self.collateral.is_empty() {
            let totals = aggregate(&self.collateral);
            if totals.net_weight != self.derived.total_net_weight
                || totals.gross_weight != self.derived.total_gross_weight
            {
                violations.push("collateral totals out of date".to_string());
            }
        }

        let n = self.terms.term_months as f64;
        let interest = self.derived.monthly_emi * n - self.terms.loan_amount;
        if (interest - self.derived.total_interest).abs() > 0.01 {
            violations.push("total interest does not match installment".to_string());
        }
        if (self.terms.loan_amount + self.derived.total_interest - self.derived.total_amount).abs()
            > 0.01
        {
            violations.push("total amount does not match principal plus interest".to_string());
        }

        match (self.status == LoanStatus::Closed, self.closure.is_some()) {
            (true, false) => violations.push("closed loan without closure record".to_string()),
            (false, true) => violations.push("closure record on open loan".to_string()),
            _ => {}
        }

        if let Some(assignment) = &self.outsourcing {
            let expected = round_currency(self.terms.interest_rate - assignment.interest_rate);
            if (expected - assignment.profit_margin).abs() > 0.0001 {
                violations.push("profit margin does not match rate spread".to_string());
            }
        }

        violations
    }

    pub fn summary_view(&self) -> LoanSummaryView {
        LoanSummaryView {
            code: self.code.clone(),
            applicant_name: self.applicant.name.clone(),
            status: self.status.label(),
            account: self.terms.account.label(),
            loan_amount: self.terms.loan_amount,
            interest_rate: self.terms.interest_rate,
            term_months: self.terms.term_months,
            monthly_emi: self.derived.monthly_emi,
            total_amount: self.derived.total_amount,
            outstanding_amount: self.outstanding_amount(),
            due_date: self.derived.due_date,
            outsourced_to: self
                .outsourcing
                .as_ref()
                .map(|assignment| assignment.entity_name.clone()),
            closed_at: self.closed_at(),
        }
    }
}

/// Compact listing row for dashboards and search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanSummaryView {
    pub code: LoanCode,
    pub applicant_name: String,
    pub status: &'static str,
    pub account: &'static str,
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub term_months: u32,
    pub monthly_emi: f64,
    pub total_amount: f64,
    pub outstanding_amount: f64,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outsourced_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}
