use serde::{Deserialize, Serialize};

use super::domain::{Applicant, CollateralItem, LoanTerms};

/// Field-level validation failure reported back to the submitting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Inclusive limits applied to submitted and amended terms.
#[derive(Debug, Clone, PartialEq)]
pub struct TermBounds {
    pub loan_amount: (f64, f64),
    pub weight_grams: (f64, f64),
    pub interest_rate: (f64, f64),
    pub term_months: (u32, u32),
}

impl Default for TermBounds {
    fn default() -> Self {
        Self {
            loan_amount: (1_000.0, 10_000_000.0),
            weight_grams: (0.1, 10_000.0),
            interest_rate: (0.1, 36.0),
            term_months: (1, 60),
        }
    }
}

/// Guard that collects every field problem before a record is created or amended.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    bounds: TermBounds,
}

impl IntakeGuard {
    pub fn with_bounds(bounds: TermBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &TermBounds {
        &self.bounds
    }

    pub fn validate(
        &self,
        applicant: &Applicant,
        terms: &LoanTerms,
        collateral: &[CollateralItem],
    ) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        self.check_applicant(applicant, &mut errors);
        self.check_terms(terms, &mut errors);
        for (index, item) in collateral.iter().enumerate() {
            self.check_item(index, item, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn check_applicant(&self, applicant: &Applicant, errors: &mut Vec<FieldError>) {
        if applicant.name.trim().is_empty() {
            errors.push(FieldError::new("applicant.name", "name is required"));
        }

        let digits = applicant.phone.chars().filter(char::is_ascii_digit).count();
        if digits < 7 {
            errors.push(FieldError::new(
                "applicant.phone",
                "phone must contain at least 7 digits",
            ));
        }

        if let Some(email) = applicant.email.as_deref() {
            let email = email.trim();
            let valid = email
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false);
            if !valid {
                errors.push(FieldError::new("applicant.email", "email is malformed"));
            }
        }
    }

    fn check_terms(&self, terms: &LoanTerms, errors: &mut Vec<FieldError>) {
        let bounds = &self.bounds;
        check_range(
            "terms.loan_amount",
            terms.loan_amount,
            bounds.loan_amount,
            errors,
        );
        check_range(
            "terms.net_weight",
            terms.net_weight,
            bounds.weight_grams,
            errors,
        );
        check_range(
            "terms.gross_weight",
            terms.gross_weight,
            bounds.weight_grams,
            errors,
        );
        if terms.gross_weight < terms.net_weight {
            errors.push(FieldError::new(
                "terms.gross_weight",
                "gross weight cannot be below net weight",
            ));
        }
        check_range(
            "terms.interest_rate",
            terms.interest_rate,
            bounds.interest_rate,
            errors,
        );

        let (min_term, max_term) = bounds.term_months;
        if terms.term_months < min_term || terms.term_months > max_term {
            errors.push(FieldError::new(
                "terms.term_months",
                format!("must be between {min_term} and {max_term} months"),
            ));
        }
    }

    fn check_item(&self, index: usize, item: &CollateralItem, errors: &mut Vec<FieldError>) {
        let prefix = format!("collateral[{index}]");
        if item.name.trim().is_empty() {
            errors.push(FieldError::new(format!("{prefix}.name"), "name is required"));
        }
        check_range(
            &format!("{prefix}.net_weight"),
            item.net_weight,
            self.bounds.weight_grams,
            errors,
        );
        check_range(
            &format!("{prefix}.gross_weight"),
            item.gross_weight,
            self.bounds.weight_grams,
            errors,
        );
        if item.gross_weight < item.net_weight {
            errors.push(FieldError::new(
                format!("{prefix}.gross_weight"),
                "gross weight cannot be below net weight",
            ));
        }
        if !(item.estimated_value.is_finite() && item.estimated_value >= 0.0) {
            errors.push(FieldError::new(
                format!("{prefix}.estimated_value"),
                "estimated value cannot be negative",
            ));
        }
    }
}

fn check_range(field: &str, value: f64, (min, max): (f64, f64), errors: &mut Vec<FieldError>) {
    if !value.is_finite() || value < min || value > max {
        errors.push(FieldError::new(
            field,
            format!("must be between {min} and {max}"),
        ));
    }
}
