use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loan_docs::collection::{
    collection_router, CollectionService, CollectionStore, EventPublisher, FileStore,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_collection_routes<S, F, P>(
    service: Arc<CollectionService<S, F, P>>,
) -> axum::Router
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    collection_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::RecordingEventPublisher;
    use axum::body::Body;
    use axum::http::Request;
    use loan_docs::collection::{InMemoryCollectionStore, InMemoryFileStore, UploadPolicy};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let service = Arc::new(CollectionService::new(
            Arc::new(InMemoryCollectionStore::default()),
            Arc::new(InMemoryFileStore::default()),
            Arc::new(RecordingEventPublisher::default()),
            UploadPolicy::default(),
        ));
        let recorder = PrometheusBuilder::new().build_recorder();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        };
        with_collection_routes(service).layer(Extension(state))
    }

    async fn get_status(router: axum::Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        assert_eq!(get_status(app(false), "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_flag() {
        assert_eq!(
            get_status(app(false), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(get_status(app(true), "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn collection_routes_are_mounted_alongside_service_routes() {
        assert_eq!(
            get_status(app(true), "/api/v1/dashboard/stats").await,
            StatusCode::OK
        );
        assert_eq!(get_status(app(true), "/metrics").await, StatusCode::OK);
    }
}
