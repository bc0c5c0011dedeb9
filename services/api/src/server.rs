use crate::cli::ServeArgs;
use crate::infra::{memory_repository, AppState};
use crate::routes::with_follow_up_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use crm_desk::config::{AppConfig, StorageConfig};
use crm_desk::customers::follow_ups::{
    FollowUpRepository, FollowUpService, PgFollowUpRepository,
};
use crm_desk::error::AppError;
use crm_desk::telemetry;
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

    match &config.storage {
        StorageConfig::Postgres(postgres) => {
            let repository = PgFollowUpRepository::connect(postgres).await?;
            repository.ensure_schema().await?;
            info!(max_connections = postgres.max_connections, "using postgres storage");
            serve(&config, Arc::new(repository)).await
        }
        StorageConfig::InMemory { customers } => {
            info!(customers = customers.len(), "using in-memory storage");
            serve(&config, Arc::new(memory_repository(customers))).await
        }
    }
}

async fn serve<R>(config: &AppConfig, repository: Arc<R>) -> Result<(), AppError>
where
    R: FollowUpRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let follow_up_service = Arc::new(FollowUpService::new(repository, config.follow_ups));

    let app = with_follow_up_routes(follow_up_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "follow-up service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
