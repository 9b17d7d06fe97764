use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use gold_ledger::documents::DocumentStore;
use gold_ledger::error::AppError;
use gold_ledger::loans::{
    amortize, loan_router, schedule, EntityRepository, Installment, LoanRepository, LoanService,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct EmiRequest {
    pub(crate) principal: f64,
    pub(crate) annual_rate: f64,
    pub(crate) term_months: u32,
    #[serde(default)]
    pub(crate) include_schedule: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmiResponse {
    pub(crate) monthly_emi: f64,
    pub(crate) total_interest: f64,
    pub(crate) total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) schedule: Option<Vec<Installment>>,
}

pub(crate) fn with_loan_routes<R, E, D>(service: Arc<LoanService<R, E, D>>) -> axum::Router
where
    R: LoanRepository + 'static,
    E: EntityRepository + 'static,
    D: DocumentStore + 'static,
{
    loan_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/calculator/emi",
            axum::routing::post(emi_calculator_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn emi_calculator_endpoint(
    Json(payload): Json<EmiRequest>,
) -> Result<Json<EmiResponse>, AppError> {
    let EmiRequest {
        principal,
        annual_rate,
        term_months,
        include_schedule,
    } = payload;

    let plan = amortize(principal, annual_rate, term_months)?;
    let schedule = if include_schedule {
        Some(schedule(principal, annual_rate, term_months)?)
    } else {
        None
    };

    Ok(Json(EmiResponse {
        monthly_emi: plan.monthly_emi,
        total_interest: plan.total_interest,
        total_amount: plan.total_amount,
        schedule,
    }))
}
