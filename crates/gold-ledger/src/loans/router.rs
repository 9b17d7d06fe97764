use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::documents::{DocumentId, DocumentStore, NewDocument};

use super::access::{Actor, Role};
use super::closure::ClosureRequest;
use super::domain::{LoanAmendment, LoanCode, LoanStatus, LoanSubmission};
use super::outsourcing::{EntityId, NewOutsourceEntity, OutsourceRequest};
use super::payments::PaymentRequest;
use super::query::LoanQuery;
use super::record::LoanSummaryView;
use super::repository::{EntityRepository, LoanRepository};
use super::service::{LoanService, LoanServiceError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type SharedService<R, E, D> = State<Arc<LoanService<R, E, D>>>;

/// Router builder exposing the loan book over HTTP.
///
/// The caller's identity comes from the authentication layer in front of this router via the
/// `x-actor-id` and `x-actor-role` headers.
pub fn loan_router<R, E, D>(service: Arc<LoanService<R, E, D>>) -> Router
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/loans",
            post(submit_handler::<R, E, D>).get(list_handler::<R, E, D>),
        )
        .route(
            "/api/v1/loans/:code",
            get(get_handler::<R, E, D>)
                .patch(update_handler::<R, E, D>)
                .delete(deactivate_handler::<R, E, D>),
        )
        .route(
            "/api/v1/loans/:code/status",
            post(transition_handler::<R, E, D>),
        )
        .route("/api/v1/loans/:code/close", post(close_handler::<R, E, D>))
        .route(
            "/api/v1/loans/:code/closure",
            patch(closure_notes_handler::<R, E, D>),
        )
        .route(
            "/api/v1/loans/:code/payments",
            post(payment_handler::<R, E, D>),
        )
        .route(
            "/api/v1/loans/:code/outsource",
            post(outsource_handler::<R, E, D>),
        )
        .route(
            "/api/v1/loans/:code/documents",
            post(attach_document_handler::<R, E, D>),
        )
        .route(
            "/api/v1/loans/:code/documents/:document_id",
            patch(verify_document_handler::<R, E, D>)
                .delete(remove_document_handler::<R, E, D>),
        )
        .route(
            "/api/v1/outsourcing/available",
            get(available_handler::<R, E, D>),
        )
        .route(
            "/api/v1/outsourcing/assigned",
            get(outsourced_handler::<R, E, D>),
        )
        .route(
            "/api/v1/outsource-entities",
            post(register_entity_handler::<R, E, D>).get(list_entities_handler::<R, E, D>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<R, E, D>))
        .route(
            "/api/v1/maintenance/orphan-documents",
            post(orphan_sweep_handler::<R, E, D>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionBody {
    pub status: LoanStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClosureNotesBody {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutsourceBody {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub request: OutsourceRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationBody {
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SweepParams {
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
}

fn default_grace_minutes() -> i64 {
    60
}

/// Resolve the calling actor from the authentication headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let id = read(ACTOR_ID_HEADER);
    let role = read(ACTOR_ROLE_HEADER).and_then(Role::parse);
    match (id, role) {
        (Some(id), Some(role)) => Ok(Actor::new(id, role)),
        _ => {
            debug!("request without a recognised actor");
            let payload = json!({
                "error": "missing or unrecognised actor",
                "code": "FORBIDDEN",
            });
            Err((StatusCode::FORBIDDEN, axum::Json(payload)).into_response())
        }
    }
}

impl IntoResponse for LoanServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "loan request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "loan request rejected");
        }

        let mut payload = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Self::Validation(fields) = &self {
            payload["fields"] = json!(fields);
        }
        (status, axum::Json(payload)).into_response()
    }
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, LoanServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn submit_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<LoanSubmission>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(StatusCode::CREATED, service.submit(&actor, submission))
}

pub(crate) async fn list_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Query(query): Query<LoanQuery>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service.list(&actor, query).map(|records| {
        records
            .iter()
            .map(|record| record.summary_view())
            .collect::<Vec<LoanSummaryView>>()
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.get(&actor, &LoanCode(code)))
}

pub(crate) async fn update_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(amendment): axum::Json<LoanAmendment>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.update(&actor, &LoanCode(code), amendment),
    )
}

pub(crate) async fn deactivate_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.deactivate(&actor, &LoanCode(code)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn transition_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(body): axum::Json<TransitionBody>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.transition(&actor, &LoanCode(code), body.status, body.note),
    )
}

pub(crate) async fn close_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(request): axum::Json<ClosureRequest>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.close(&actor, &LoanCode(code), request),
    )
}

pub(crate) async fn closure_notes_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(body): axum::Json<ClosureNotesBody>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.amend_closure_notes(&actor, &LoanCode(code), body.notes),
    )
}

pub(crate) async fn payment_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(request): axum::Json<PaymentRequest>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.record_payment(&actor, &LoanCode(code), request),
    )
}

pub(crate) async fn outsource_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(body): axum::Json<OutsourceBody>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.assign_outsource(&actor, &LoanCode(code), &body.entity_id, body.request),
    )
}

pub(crate) async fn attach_document_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path(code): Path<String>,
    axum::Json(document): axum::Json<NewDocument>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.attach_document(&actor, &LoanCode(code), document),
    )
}

pub(crate) async fn verify_document_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path((code, document_id)): Path<(String, String)>,
    axum::Json(body): axum::Json<VerificationBody>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.verify_document(
            &actor,
            &LoanCode(code),
            &DocumentId(document_id),
            body.verified,
        ),
    )
}

pub(crate) async fn remove_document_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Path((code, document_id)): Path<(String, String)>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.remove_document(&actor, &LoanCode(code), &DocumentId(document_id)),
    )
}

pub(crate) async fn available_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .available_for_outsourcing(&actor)
        .map(|records| records.iter().map(|record| record.summary_view()).collect::<Vec<_>>());
    respond(StatusCode::OK, result)
}

pub(crate) async fn outsourced_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .outsourced_loans(&actor)
        .map(|records| records.iter().map(|record| record.summary_view()).collect::<Vec<_>>());
    respond(StatusCode::OK, result)
}

pub(crate) async fn register_entity_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    axum::Json(entity): axum::Json<NewOutsourceEntity>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(StatusCode::CREATED, service.register_entity(&actor, entity))
}

pub(crate) async fn list_entities_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.list_entities(&actor))
}

pub(crate) async fn dashboard_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(StatusCode::OK, service.dashboard(&actor))
}

pub(crate) async fn orphan_sweep_handler<R, E, D>(
    State(service): SharedService<R, E, D>,
    headers: HeaderMap,
    Query(params): Query<SweepParams>,
) -> Response
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let grace = chrono::Duration::minutes(params.grace_minutes.max(0));
    let result = service
        .reconcile_orphan_documents(&actor, grace)
        .map(|removed| json!({ "removed": removed }));
    respond(StatusCode::OK, result)
}
