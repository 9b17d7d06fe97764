use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use super::record::LoanRecord;

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(err) => write!(f, "failed to write ledger export: {}", err),
            ExportError::Csv(err) => write!(f, "could not encode ledger row: {}", err),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            ExportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// One bookkeeping row per loan.
#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    code: &'a str,
    account: &'static str,
    status: &'static str,
    applicant: &'a str,
    application_date: NaiveDate,
    due_date: NaiveDate,
    loan_amount: f64,
    interest_rate: f64,
    term_months: u32,
    monthly_emi: f64,
    total_amount: f64,
    total_paid: f64,
    outstanding: f64,
    outsourced_to: Option<&'a str>,
    outsourced_amount: Option<f64>,
    profit_margin: Option<f64>,
}

impl<'a> From<&'a LoanRecord> for LedgerRow<'a> {
    fn from(record: &'a LoanRecord) -> Self {
        let assignment = record.outsourcing.as_ref();
        Self {
            code: &record.code.0,
            account: record.account().label(),
            status: record.status.label(),
            applicant: &record.applicant.name,
            application_date: record.application_date,
            due_date: record.derived.due_date,
            loan_amount: record.terms.loan_amount,
            interest_rate: record.terms.interest_rate,
            term_months: record.terms.term_months,
            monthly_emi: record.derived.monthly_emi,
            total_amount: record.derived.total_amount,
            total_paid: record.total_paid(),
            outstanding: record.outstanding_amount(),
            outsourced_to: assignment.map(|assignment| assignment.entity_name.as_str()),
            outsourced_amount: assignment.map(|assignment| assignment.amount),
            profit_margin: assignment.map(|assignment| assignment.profit_margin),
        }
    }
}

/// Write the loan book as CSV, one row per loan in the order given.
pub fn write_ledger<'a, W: Write>(
    writer: W,
    records: impl IntoIterator<Item = &'a LoanRecord>,
) -> Result<usize, ExportError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    let mut rows = 0;
    for record in records {
        csv_writer.serialize(LedgerRow::from(record))?;
        rows += 1;
    }
    csv_writer.flush()?;
    Ok(rows)
}

pub fn export_ledger_to_path<'a, P: AsRef<Path>>(
    path: P,
    records: impl IntoIterator<Item = &'a LoanRecord>,
) -> Result<usize, ExportError> {
    let file = std::fs::File::create(path)?;
    write_ledger(file, records)
}
