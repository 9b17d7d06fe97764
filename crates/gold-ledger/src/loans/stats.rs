use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::amortization::round_currency;
use super::domain::LoanStatus;
use super::record::LoanRecord;

/// Portfolio figures shown on the operations dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_loans: usize,
    pub by_status: BTreeMap<String, usize>,
    pub total_principal: f64,
    pub total_outstanding: f64,
    pub total_collected: f64,
    pub outsourced_loans: usize,
    pub total_profit_margin: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_profit_margin: Option<f64>,
}

impl DashboardStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LoanRecord>) -> Self {
        let mut stats = Self {
            by_status: LoanStatus::ordered()
                .into_iter()
                .map(|status| (status.label().to_string(), 0))
                .collect(),
            ..Self::default()
        };

        for record in records {
            stats.total_loans += 1;
            *stats
                .by_status
                .entry(record.status.label().to_string())
                .or_insert(0) += 1;
            stats.total_principal += record.terms.loan_amount;
            stats.total_collected += record.total_paid();
            if record.status != LoanStatus::Closed && record.status != LoanStatus::Rejected {
                stats.total_outstanding += record.outstanding_amount();
            }
            if let Some(assignment) = &record.outsourcing {
                stats.outsourced_loans += 1;
                stats.total_profit_margin += assignment.profit_margin;
            }
        }

        stats.total_principal = round_currency(stats.total_principal);
        stats.total_outstanding = round_currency(stats.total_outstanding);
        stats.total_collected = round_currency(stats.total_collected);
        stats.total_profit_margin = round_currency(stats.total_profit_margin);
        if stats.outsourced_loans > 0 {
            stats.average_profit_margin = Some(round_currency(
                stats.total_profit_margin / stats.outsourced_loans as f64,
            ));
        }
        stats
    }
}
