use crate::infra::{
    parse_date, parse_status, InMemoryDocumentStore, InMemoryEntityRepository,
    InMemoryLoanRepository,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use gold_ledger::config::LendingConfig;
use gold_ledger::error::AppError;
use gold_ledger::loans::{
    amortize, export_ledger_to_path, schedule, write_ledger, AccountBucket, Actor, Applicant,
    ClosureReason, ClosureRequest, CollateralItem, DashboardStats, EntityContact, EntityKind,
    LoanCode, LoanQuery, LoanRecord, LoanService, LoanStatus, LoanSubmission, LoanTerms,
    NewOutsourceEntity, OutsourceRequest, PaymentMethod, PaymentRequest, Purity, Role,
};
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = LoanService<InMemoryLoanRepository, InMemoryEntityRepository, InMemoryDocumentStore>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Status new submissions start in (pending, under_review or approved). Defaults to approved.
    #[arg(long, value_parser = parse_status)]
    pub(crate) initial_status: Option<LoanStatus>,
    /// Application date stamped on the demo loans (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) application_date: Option<NaiveDate>,
    /// Print the repayment schedule of the first demo loan.
    #[arg(long)]
    pub(crate) schedule: bool,
}

#[derive(Args, Debug)]
pub(crate) struct EmiArgs {
    /// Principal amount
    #[arg(long)]
    pub(crate) principal: f64,
    /// Annual interest rate in percent
    #[arg(long)]
    pub(crate) rate: f64,
    /// Term in months
    #[arg(long)]
    pub(crate) term: u32,
    /// Print the month-by-month schedule
    #[arg(long)]
    pub(crate) schedule: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct LedgerExportArgs {
    /// Write the CSV to this path instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Application date stamped on the demo loans (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) application_date: Option<NaiveDate>,
}

pub(crate) fn run_emi_calculator(args: EmiArgs) -> Result<(), AppError> {
    let EmiArgs {
        principal,
        rate,
        term,
        schedule: list_schedule,
    } = args;

    let plan = amortize(principal, rate, term)?;
    println!("EMI for {principal:.2} at {rate}% over {term} months");
    println!("- Monthly installment: {:.2}", plan.monthly_emi);
    println!("- Total interest: {:.2}", plan.total_interest);
    println!("- Total payable: {:.2}", plan.total_amount);

    if list_schedule {
        println!("\nMonth | Payment | Interest | Principal | Balance");
        for row in schedule(principal, rate, term)? {
            println!(
                "{:>5} | {:>9.2} | {:>9.2} | {:>9.2} | {:>10.2}",
                row.month_index, row.payment, row.interest, row.principal, row.closing_balance
            );
        }
    }

    Ok(())
}

pub(crate) fn run_ledger_export(args: LedgerExportArgs) -> Result<(), AppError> {
    let LedgerExportArgs {
        output,
        application_date,
    } = args;

    let book = DemoBook::seed(LendingConfig::default(), application_date)?;
    let records = book.service.list(&book.admin, LoanQuery::default())?;

    match output {
        Some(path) => {
            let rows = export_ledger_to_path(&path, &records)?;
            println!("Wrote {rows} loans to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_ledger(stdout.lock(), &records)?;
        }
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        initial_status,
        application_date,
        schedule: list_schedule,
    } = args;

    let mut config = LendingConfig::default();
    if let Some(status) = initial_status {
        config.initial_status = status;
    }

    println!("Gold loan ledger demo");
    println!("- New submissions start as '{}'", config.initial_status.label());

    let book = DemoBook::seed(config, application_date)?;
    println!("\nSeeded {} loans", book.codes.len());
    for code in &book.codes {
        let record = book.service.get(&book.admin, code)?;
        render_loan(&record);
    }

    if list_schedule {
        if let Some(code) = book.codes.first() {
            let record = book.service.get(&book.admin, code)?;
            println!("\nRepayment plan for {}", record.code);
            for row in schedule(
                record.terms.loan_amount,
                record.terms.interest_rate,
                record.terms.term_months,
            )? {
                println!(
                    "  month {:>2}: pay {:.2} (interest {:.2}, principal {:.2}) -> balance {:.2}",
                    row.month_index,
                    row.payment,
                    row.interest,
                    row.principal,
                    row.closing_balance
                );
            }
        }
    }

    let available = book.service.available_for_outsourcing(&book.officer)?;
    println!("\nAvailable for outsourcing: {}", available.len());
    for record in &available {
        println!("  - {} ({:.2})", record.code, record.terms.loan_amount);
    }

    let employee_view = book.service.list(&book.employee, LoanQuery::default())?;
    println!(
        "\nEmployee {} sees {} of {} loans",
        book.employee.id,
        employee_view.len(),
        book.codes.len()
    );

    let stats = book.service.dashboard(&book.admin)?;
    render_dashboard(&stats);

    Ok(())
}

struct DemoBook {
    service: DemoService,
    admin: Actor,
    officer: Actor,
    employee: Actor,
    codes: Vec<LoanCode>,
}

impl DemoBook {
    fn seed(config: LendingConfig, application_date: Option<NaiveDate>) -> Result<Self, AppError> {
        let application_date = application_date.unwrap_or_else(|| Local::now().date_naive());
        let service = LoanService::new(
            Arc::new(InMemoryLoanRepository::default()),
            Arc::new(InMemoryEntityRepository::default()),
            Arc::new(InMemoryDocumentStore::default()),
            config,
        );
        let admin = Actor::new("admin-demo", Role::Admin);
        let officer = Actor::new("officer-demo", Role::LoanOfficer);
        let employee = Actor::new("employee-demo", Role::Employee);

        let partner = service.register_entity(
            &admin,
            NewOutsourceEntity {
                name: "Coastal Finance".to_string(),
                kind: EntityKind::Organization,
                contact: EntityContact {
                    person: Some("R. Menon".to_string()),
                    phone: Some("9845000000".to_string()),
                    email: None,
                },
                address: None,
                interest_rate: 9.0,
                max_loan_amount: 300_000.0,
            },
        )?;

        let mut codes = Vec::new();
        for (submitter, name, amount, account) in [
            (&officer, "Anjali Rao", 100_000.0, AccountBucket::Primary),
            (&employee, "Farhan Sheikh", 150_000.0, AccountBucket::Secondary),
            (&officer, "Lakshmi Iyer", 60_000.0, AccountBucket::Secondary),
        ] {
            let record = service.submit(submitter, demo_submission(name, amount, account, application_date))?;
            codes.push(record.code);
        }

        for code in &codes {
            let record = service.get(&admin, code)?;
            if record.status != LoanStatus::Approved {
                service.transition(&officer, code, LoanStatus::Approved, Some("demo approval".to_string()))?;
            }
        }

        service.record_payment(
            &officer,
            &codes[0],
            PaymentRequest {
                amount: 8_884.88,
                method: PaymentMethod::Upi,
                paid_on: Some(application_date),
                notes: Some("first installment".to_string()),
            },
        )?;

        service.assign_outsource(
            &officer,
            &codes[1],
            &partner.id,
            OutsourceRequest {
                notes: Some("handed to partner for collection".to_string()),
                ..OutsourceRequest::default()
            },
        )?;

        service.close(
            &officer,
            &codes[2],
            ClosureRequest {
                reason: Some(ClosureReason::FullyPaid),
                notes: Some("collateral returned".to_string()),
                final_amount: None,
            },
        )?;

        Ok(Self {
            service,
            admin,
            officer,
            employee,
            codes,
        })
    }
}

fn demo_submission(
    name: &str,
    amount: f64,
    account: AccountBucket,
    application_date: NaiveDate,
) -> LoanSubmission {
    LoanSubmission {
        applicant: Applicant {
            name: name.to_string(),
            phone: "9000012345".to_string(),
            email: None,
            address: None,
        },
        terms: LoanTerms {
            loan_amount: amount,
            net_weight: amount / 6_000.0,
            gross_weight: amount / 5_500.0,
            purity: Purity::K22,
            interest_rate: 12.0,
            term_months: 12,
            account,
        },
        collateral: vec![CollateralItem {
            name: "Chain".to_string(),
            kind: "necklace".to_string(),
            net_weight: amount / 6_000.0,
            gross_weight: amount / 5_500.0,
            purity: Purity::K22,
            estimated_value: amount * 1.25,
            description: String::new(),
            pictures: Vec::new(),
        }],
        application_date: Some(application_date),
    }
}

fn render_loan(record: &LoanRecord) {
    println!(
        "- {} | {} | {} | EMI {:.2} x {} | outstanding {:.2}",
        record.code,
        record.applicant.name,
        record.status.label(),
        record.derived.monthly_emi,
        record.terms.term_months,
        record.outstanding_amount()
    );
    if let Some(assignment) = &record.outsourcing {
        println!(
            "    outsourced to {} at {}% (margin {:.2} points)",
            assignment.entity_name, assignment.interest_rate, assignment.profit_margin
        );
    }
    if let Some(closure) = &record.closure {
        println!("    closed with final amount {:.2}", closure.final_amount);
    }
}

fn render_dashboard(stats: &DashboardStats) {
    println!("\nPortfolio dashboard");
    println!("- Loans: {}", stats.total_loans);
    for (status, count) in &stats.by_status {
        println!("  - {status}: {count}");
    }
    println!("- Principal booked: {:.2}", stats.total_principal);
    println!("- Outstanding: {:.2}", stats.total_outstanding);
    println!("- Collected: {:.2}", stats.total_collected);
    println!(
        "- Outsourced: {} (margin total {:.2}{})",
        stats.outsourced_loans,
        stats.total_profit_margin,
        stats
            .average_profit_margin
            .map(|average| format!(", average {average:.2}"))
            .unwrap_or_default()
    );
}
