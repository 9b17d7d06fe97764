use super::common::*;
use crate::loans::domain::{
    ActorId, LoanAmendment, LoanCode, LoanStatus, PaymentMethod,
};
use crate::loans::payments::PaymentRequest;
use crate::loans::query::LoanQuery;
use crate::loans::repository::{LoanRepository, RepositoryError};
use crate::loans::service::LoanServiceError;
use chrono::NaiveDate;

fn payment(amount: f64) -> PaymentRequest {
    PaymentRequest {
        amount,
        method: PaymentMethod::Upi,
        paid_on: NaiveDate::from_ymd_opt(2025, 2, 28),
        notes: None,
    }
}

#[test]
fn submit_populates_derived_terms() {
    let harness = harness(LoanStatus::Approved);

    let record = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert_eq!(record.code, LoanCode("GL000001".to_string()));
    assert_eq!(record.status, LoanStatus::Approved);
    assert!(record.approved_at.is_some());
    assert_eq!(record.approved_by, None);
    assert_eq!(record.created_by, ActorId("officer-1".to_string()));
    assert_eq!(record.derived.monthly_emi, 8884.88);
    assert_eq!(record.derived.total_interest, 6618.56);
    assert_eq!(record.derived.total_amount, 106618.56);
    assert_eq!(record.derived.total_net_weight, 15.0);
    assert_eq!(record.derived.total_gross_weight, 17.0);
    assert_eq!(
        record.derived.due_date,
        NaiveDate::from_ymd_opt(2026, 1, 31).expect("valid date")
    );
    assert!(record.invariant_violations().is_empty());
}

#[test]
fn submit_honours_configured_initial_status() {
    let harness = harness(LoanStatus::Pending);

    let record = harness
        .service
        .submit(&employee("emp-7"), submission())
        .expect("submission succeeds");

    assert_eq!(record.status, LoanStatus::Pending);
    assert!(record.approved_at.is_none());
}

#[test]
fn submit_collects_every_field_error() {
    let harness = harness(LoanStatus::Approved);
    let mut submission = submission();
    submission.applicant.name = "  ".to_string();
    submission.terms.interest_rate = 40.0;
    submission.collateral[1].gross_weight = 4.0;

    match harness.service.submit(&officer(), submission) {
        Err(LoanServiceError::Validation(errors)) => {
            let fields: Vec<_> = errors.iter().map(|error| error.field.as_str()).collect();
            assert!(fields.contains(&"applicant.name"));
            assert!(fields.contains(&"terms.interest_rate"));
            assert!(fields.contains(&"collateral[1].gross_weight"));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
    assert!(harness
        .loans
        .list(&LoanQuery::default())
        .expect("list succeeds")
        .is_empty());
}

#[test]
fn submit_skips_codes_that_are_already_taken() {
    let harness = harness(LoanStatus::Approved);
    harness
        .loans
        .insert(approved_loan("GL000001", "officer-1"))
        .expect("seed succeeds");

    let record = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert_eq!(record.code.0, "GL000002");
}

#[test]
fn submit_refuses_codes_beyond_six_digits() {
    let Harness { service, .. } = harness(LoanStatus::Approved);
    let service = service.with_next_loan_sequence(999_999);

    let last = service
        .submit(&officer(), submission())
        .expect("last six-digit code is issued");
    assert_eq!(last.code.0, "GL999999");

    assert!(matches!(
        service.submit(&officer(), submission()),
        Err(LoanServiceError::InvalidState(_))
    ));
}

#[test]
fn officer_approves_pending_loan() {
    let harness = harness(LoanStatus::Pending);
    let loan = harness
        .service
        .submit(&employee("emp-7"), submission())
        .expect("submission succeeds");

    let approved = harness
        .service
        .transition(&officer(), &loan.code, LoanStatus::Approved, None)
        .expect("officer may approve");

    assert_eq!(approved.status, LoanStatus::Approved);
    assert!(approved.approved_at.is_some());
    assert_eq!(approved.approved_by, Some(ActorId("officer-1".to_string())));
    assert_eq!(approved.status_history.len(), 1);
    assert_eq!(approved.status_history[0].from, LoanStatus::Pending);
    assert_eq!(approved.version, loan.version + 1);
}

#[test]
fn submitting_employee_cannot_approve() {
    let harness = harness(LoanStatus::Pending);
    let submitter = employee("emp-7");
    let loan = harness
        .service
        .submit(&submitter, submission())
        .expect("submission succeeds");

    match harness
        .service
        .transition(&submitter, &loan.code, LoanStatus::Approved, None)
    {
        Err(LoanServiceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
    assert_eq!(harness.loans.stored(&loan.code).status, LoanStatus::Pending);
}

#[test]
fn review_path_reaches_rejection_and_stops() {
    let harness = harness(LoanStatus::Pending);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    harness
        .service
        .transition(&officer(), &loan.code, LoanStatus::UnderReview, None)
        .expect("pending may go to review");
    let rejected = harness
        .service
        .transition(
            &officer(),
            &loan.code,
            LoanStatus::Rejected,
            Some("purity below declaration".to_string()),
        )
        .expect("review may reject");
    assert_eq!(rejected.status_history.len(), 2);

    match harness
        .service
        .transition(&admin(), &loan.code, LoanStatus::Approved, None)
    {
        Err(LoanServiceError::InvalidState(_)) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn generic_transition_cannot_close() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert!(matches!(
        harness
            .service
            .transition(&officer(), &loan.code, LoanStatus::Closed, None),
        Err(LoanServiceError::InvalidState(_))
    ));
}

#[test]
fn employees_only_see_their_own_loans() {
    let harness = harness(LoanStatus::Approved);
    let owner = employee("emp-7");
    let other = employee("emp-9");
    let loan = harness
        .service
        .submit(&owner, submission())
        .expect("submission succeeds");
    harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert!(harness.service.get(&owner, &loan.code).is_ok());
    assert!(matches!(
        harness.service.get(&other, &loan.code),
        Err(LoanServiceError::Forbidden(_))
    ));

    let visible = harness
        .service
        .list(&owner, LoanQuery::default())
        .expect("list succeeds");
    assert_eq!(visible.len(), 1);
    assert!(harness
        .service
        .list(&other, LoanQuery::default())
        .expect("list succeeds")
        .is_empty());
    assert_eq!(
        harness
            .service
            .list(&officer(), LoanQuery::default())
            .expect("list succeeds")
            .len(),
        2
    );
}

#[test]
fn list_filters_by_search_and_status() {
    let harness = harness(LoanStatus::Pending);
    let first = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");
    let mut other = submission();
    other.applicant.name = "Arjun Menon".to_string();
    other.applicant.email = None;
    let second = harness
        .service
        .submit(&officer(), other)
        .expect("submission succeeds");
    harness
        .service
        .transition(&officer(), &second.code, LoanStatus::Approved, None)
        .expect("approval succeeds");

    let by_name = harness
        .service
        .list(
            &officer(),
            LoanQuery {
                search: Some("MENON".to_string()),
                ..LoanQuery::default()
            },
        )
        .expect("list succeeds");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].code, second.code);

    let pending = harness
        .service
        .list(
            &officer(),
            LoanQuery {
                status: Some(LoanStatus::Pending),
                ..LoanQuery::default()
            },
        )
        .expect("list succeeds");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].code, first.code);
}

#[test]
fn update_recomputes_derived_terms() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    let updated = harness
        .service
        .update(
            &officer(),
            &loan.code,
            LoanAmendment {
                loan_amount: Some(200_000.0),
                ..LoanAmendment::default()
            },
        )
        .expect("update succeeds");

    assert_eq!(updated.derived.monthly_emi, 17769.76);
    assert_eq!(updated.derived.total_amount, 213237.12);
    assert!(updated.invariant_violations().is_empty());
}

#[test]
fn update_rejects_empty_and_invalid_amendments() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert!(matches!(
        harness
            .service
            .update(&officer(), &loan.code, LoanAmendment::default()),
        Err(LoanServiceError::Validation(_))
    ));
    assert!(matches!(
        harness.service.update(
            &officer(),
            &loan.code,
            LoanAmendment {
                term_months: Some(72),
                ..LoanAmendment::default()
            },
        ),
        Err(LoanServiceError::Validation(_))
    ));
    assert_eq!(harness.loans.stored(&loan.code).terms.term_months, 12);
}

#[test]
fn concurrent_writer_gets_stale_version() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");
    let snapshot = harness
        .service
        .get(&officer(), &loan.code)
        .expect("read succeeds");

    harness
        .service
        .record_payment(&officer(), &loan.code, payment(5_000.0))
        .expect("payment succeeds");

    match harness.loans.update(snapshot.clone(), snapshot.version) {
        Err(RepositoryError::StaleVersion { expected, found }) => {
            assert_eq!(expected, snapshot.version);
            assert_eq!(found, snapshot.version + 1);
        }
        other => panic!("expected stale version, got {other:?}"),
    }
}

#[test]
fn payment_of_exact_outstanding_settles_balance() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert!(matches!(
        harness
            .service
            .record_payment(&officer(), &loan.code, payment(106_618.57)),
        Err(LoanServiceError::Validation(fields)) if fields[0].field == "amount"
    ));
    let record = harness
        .service
        .record_payment(&officer(), &loan.code, payment(106_618.56))
        .expect("exact settlement accepted");
    assert_eq!(record.outstanding_amount(), 0.0);
}

#[test]
fn payments_append_and_reduce_outstanding() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    harness
        .service
        .record_payment(&officer(), &loan.code, payment(8_884.88))
        .expect("first payment");
    let record = harness
        .service
        .record_payment(&officer(), &loan.code, payment(8_884.88))
        .expect("second payment");

    assert_eq!(record.payments.len(), 2);
    assert_eq!(record.payments[1].month_index, 2);
    assert_eq!(record.total_paid(), 17769.76);
    assert_eq!(record.outstanding_amount(), 88848.8);

    assert!(matches!(
        harness
            .service
            .record_payment(&officer(), &loan.code, payment(100_000.0)),
        Err(LoanServiceError::Validation(_))
    ));
    assert!(matches!(
        harness
            .service
            .record_payment(&employee("emp-7"), &loan.code, payment(10.0)),
        Err(LoanServiceError::Forbidden(_))
    ));
}

#[test]
fn payments_require_an_approved_loan() {
    let harness = harness(LoanStatus::Pending);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert!(matches!(
        harness
            .service
            .record_payment(&officer(), &loan.code, payment(1_000.0)),
        Err(LoanServiceError::InvalidState(_))
    ));
}

#[test]
fn deactivated_loans_disappear() {
    let harness = harness(LoanStatus::Approved);
    let loan = harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    assert!(matches!(
        harness.service.deactivate(&officer(), &loan.code),
        Err(LoanServiceError::Forbidden(_))
    ));
    harness
        .service
        .deactivate(&admin(), &loan.code)
        .expect("admin may deactivate");

    assert!(!harness.loans.stored(&loan.code).is_active);
    assert!(matches!(
        harness.service.get(&admin(), &loan.code),
        Err(LoanServiceError::NotFound(_))
    ));
    assert!(harness
        .service
        .list(&admin(), LoanQuery::default())
        .expect("list succeeds")
        .is_empty());
    assert!(matches!(
        harness
            .service
            .record_payment(&admin(), &loan.code, payment(1_000.0)),
        Err(LoanServiceError::NotFound(_))
    ));
}

#[test]
fn dashboard_is_served_from_cache() {
    let harness = harness(LoanStatus::Approved);
    harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");

    let first = harness.service.dashboard(&admin()).expect("stats");
    assert_eq!(first.total_loans, 1);
    assert_eq!(first.by_status.get("approved"), Some(&1));
    assert_eq!(first.total_principal, 100_000.0);
    assert_eq!(first.total_outstanding, 106618.56);

    harness
        .service
        .submit(&officer(), submission())
        .expect("submission succeeds");
    let cached = harness.service.dashboard(&admin()).expect("stats");
    assert_eq!(cached.total_loans, 1, "stale within the ttl");

    let scoped = harness
        .service
        .dashboard(&employee("emp-7"))
        .expect("employees see their own figures");
    assert_eq!(scoped.total_loans, 0);
}

#[test]
fn repository_outage_is_reported() {
    let service = unavailable_service();

    match service.submit(&officer(), submission()) {
        Err(LoanServiceError::Repository(RepositoryError::Unavailable(reason))) => {
            assert!(reason.contains("offline"));
        }
        other => panic!("expected unavailable repository, got {other:?}"),
    }
}
