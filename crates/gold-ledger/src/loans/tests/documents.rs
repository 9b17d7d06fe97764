use chrono::{Duration, Utc};

use super::common::*;
use crate::documents::{DocumentCategory, DocumentId, DocumentRecord, DocumentStore, NewDocument};
use crate::loans::domain::{ActorId, LoanCode, LoanStatus};
use crate::loans::repository::RepositoryError;
use crate::loans::service::LoanServiceError;

fn identity_scan() -> NewDocument {
    NewDocument {
        filename: "b7e1c0-aadhaar.pdf".to_string(),
        original_name: "aadhaar.pdf".to_string(),
        storage_path: "loans/GL000001/b7e1c0-aadhaar.pdf".to_string(),
        size_bytes: 184_320,
        mime_type: "application/pdf".to_string(),
        category: DocumentCategory::Identity,
        tags: vec!["kyc".to_string()],
    }
}

fn loan(harness: &Harness) -> LoanCode {
    harness
        .service
        .submit(&employee("emp-7"), submission())
        .expect("submission succeeds")
        .code
}

#[test]
fn submitter_attaches_and_officer_verifies() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);

    let document = harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
        .expect("attach succeeds");
    assert_eq!(document.loan, code);
    assert!(!document.is_verified());

    let stored = harness.loans.stored(&code);
    assert_eq!(stored.documents.len(), 1);
    assert_eq!(stored.documents[0].document_id, document.id);
    assert!(!stored.documents[0].verified);

    assert!(matches!(
        harness
            .service
            .verify_document(&employee("emp-7"), &code, &document.id, true),
        Err(LoanServiceError::Forbidden(_))
    ));
    let verified = harness
        .service
        .verify_document(&officer(), &code, &document.id, true)
        .expect("officer verifies");
    assert!(verified.is_verified());
    assert_eq!(
        verified
            .verification
            .as_ref()
            .map(|verification| verification.verified_by.clone()),
        Some(ActorId("officer-1".to_string()))
    );
    assert!(harness.loans.stored(&code).documents[0].verified);
}

#[test]
fn remove_drops_reference_and_document() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);
    let document = harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
        .expect("attach succeeds");

    let record = harness
        .service
        .remove_document(&employee("emp-7"), &code, &document.id)
        .expect("remove succeeds");

    assert!(record.documents.is_empty());
    assert!(harness.documents.ids().is_empty());
    assert!(matches!(
        harness
            .service
            .remove_document(&officer(), &code, &document.id),
        Err(LoanServiceError::NotFound(_))
    ));
}

#[test]
fn failed_loan_write_deletes_the_stored_document() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);
    harness.loans.fail_updates();

    match harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
    {
        Err(LoanServiceError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository failure, got {other:?}"),
    }

    assert!(harness.documents.ids().is_empty());
    assert!(harness.loans.stored(&code).documents.is_empty());
}

#[test]
fn sweep_removes_old_orphans_only() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);
    let kept = harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
        .expect("attach succeeds");

    let mut stale = DocumentRecord::new(
        DocumentId("doc-orphan-old".to_string()),
        code.clone(),
        ActorId("emp-7".to_string()),
        identity_scan(),
        Utc::now() - Duration::hours(3),
    );
    stale.tags.push("crashed-upload".to_string());
    harness.documents.plant_orphan(stale);
    harness.documents.plant_orphan(DocumentRecord::new(
        DocumentId("doc-orphan-new".to_string()),
        code.clone(),
        ActorId("emp-7".to_string()),
        identity_scan(),
        Utc::now(),
    ));

    assert!(matches!(
        harness
            .service
            .reconcile_orphan_documents(&officer(), Duration::hours(1)),
        Err(LoanServiceError::Forbidden(_))
    ));

    let removed = harness
        .service
        .reconcile_orphan_documents(&admin(), Duration::hours(1))
        .expect("sweep succeeds");

    assert_eq!(removed, vec![DocumentId("doc-orphan-old".to_string())]);
    assert_eq!(
        harness.documents.ids(),
        vec![kept.id.clone(), DocumentId("doc-orphan-new".to_string())]
    );
    assert!(harness
        .documents
        .fetch(&kept.id)
        .expect("fetch succeeds")
        .is_some());
}

#[test]
fn failed_delete_is_picked_up_by_the_sweep() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);
    let document = harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
        .expect("attach succeeds");

    harness.documents.fail_deletes(true);
    harness
        .service
        .remove_document(&officer(), &code, &document.id)
        .expect("reference is dropped even when the delete fails");
    assert_eq!(harness.documents.ids(), vec![document.id.clone()]);

    harness.documents.fail_deletes(false);
    let removed = harness
        .service
        .reconcile_orphan_documents(&admin(), Duration::zero())
        .expect("sweep succeeds");
    assert_eq!(removed, vec![document.id]);
    assert!(harness.documents.ids().is_empty());
}

#[test]
fn failed_loan_write_leaves_verification_untouched() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);
    let document = harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
        .expect("attach succeeds");
    harness.loans.fail_updates();

    assert!(matches!(
        harness
            .service
            .verify_document(&officer(), &code, &document.id, true),
        Err(LoanServiceError::Repository(RepositoryError::Unavailable(_)))
    ));

    let stored = harness
        .documents
        .fetch(&document.id)
        .expect("fetch succeeds")
        .expect("document kept");
    assert!(!stored.is_verified());
    assert!(!harness.loans.stored(&code).documents[0].verified);
}

#[test]
fn failed_store_write_restores_loan_flag() {
    let harness = harness(LoanStatus::Approved);
    let code = loan(&harness);
    let document = harness
        .service
        .attach_document(&employee("emp-7"), &code, identity_scan())
        .expect("attach succeeds");
    harness.documents.fail_verifications();

    assert!(matches!(
        harness
            .service
            .verify_document(&officer(), &code, &document.id, true),
        Err(LoanServiceError::Document(_))
    ));

    assert!(!harness.loans.stored(&code).documents[0].verified);
    let stored = harness
        .documents
        .fetch(&document.id)
        .expect("fetch succeeds")
        .expect("document kept");
    assert!(!stored.is_verified());
}
