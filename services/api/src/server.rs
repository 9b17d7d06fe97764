use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDocumentStore, InMemoryEntityRepository, InMemoryLoanRepository};
use crate::routes::with_loan_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gold_ledger::config::AppConfig;
use gold_ledger::error::AppError;
use gold_ledger::loans::LoanService;
use gold_ledger::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let loan_service = Arc::new(LoanService::new(
        Arc::new(InMemoryLoanRepository::default()),
        Arc::new(InMemoryEntityRepository::default()),
        Arc::new(InMemoryDocumentStore::default()),
        config.lending.clone(),
    ));

    let app = with_loan_routes(loan_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        initial_status = config.lending.initial_status.label(),
        "gold loan ledger ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
