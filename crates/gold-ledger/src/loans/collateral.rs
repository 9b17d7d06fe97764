use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::amortization::round_currency;
use super::domain::CollateralItem;

/// Aggregated weights (grams) and valuation across pledged items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollateralTotals {
    pub net_weight: f64,
    pub gross_weight: f64,
    pub estimated_value: f64,
}

/// Sum the pledged items. An empty list yields zeros.
pub fn aggregate(items: &[CollateralItem]) -> CollateralTotals {
    let (net, gross, value) = items.iter().fold((0.0, 0.0, 0.0), |(net, gross, value), item| {
        (
            net + item.net_weight,
            gross + item.gross_weight,
            value + item.estimated_value,
        )
    });

    CollateralTotals {
        net_weight: round_currency(net),
        gross_weight: round_currency(gross),
        estimated_value: round_currency(value),
    }
}

/// Calendar-month due date; month-end dates clamp (Jan 31 + 1 month = Feb 28/29).
pub fn due_date(application_date: NaiveDate, term_months: u32) -> Option<NaiveDate> {
    application_date.checked_add_months(Months::new(term_months))
}
