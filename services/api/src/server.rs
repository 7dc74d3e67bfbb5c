use crate::cli::ServeArgs;
use crate::infra::{
    seed_banks, seed_invitations, seed_surveys, AppState, InMemoryCatalog,
    InMemoryResponseRepository,
};
use crate::routes::with_survey_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use survey_engine::config::AppConfig;
use survey_engine::error::AppError;
use survey_engine::surveys::{InMemoryInvitationGate, SurveyService};
use survey_engine::telemetry;
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

    let catalog = Arc::new(InMemoryCatalog::with(seed_surveys(), seed_banks()));
    let responses = Arc::new(InMemoryResponseRepository::default());
    let gate = Arc::new(InMemoryInvitationGate::with_invitations(seed_invitations()));
    let survey_service = Arc::new(
        SurveyService::new(catalog, responses, gate)
            .with_default_page_size(config.statistics.default_page_size),
    );

    let app = with_survey_routes(survey_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "survey scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
