use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredFileStore, LogEventPublisher};
use crate::routes::with_collection_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_docs::collection::{CollectionService, InMemoryCollectionStore, UploadPolicy};
use loan_docs::config::AppConfig;
use loan_docs::error::AppError;
use loan_docs::telemetry;
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

    let store = Arc::new(InMemoryCollectionStore::default());
    let files = Arc::new(ConfiguredFileStore::from_config(&config.uploads));
    let events = Arc::new(LogEventPublisher);
    let collection_service = Arc::new(CollectionService::new(
        store,
        files,
        events,
        UploadPolicy::from(&config.uploads),
    ));

    let app = with_collection_routes(collection_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        storage = ?config.uploads.storage,
        upload_dir = %config.uploads.upload_dir.display(),
        "loan document collection service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
