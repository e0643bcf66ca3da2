use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    CustomerId, DocumentId, DocumentTypeId, NewCustomer, NewDocumentType, NewProduct,
    NewRequirement, ProductId, RequirementId, ReviewDecision, UploadRequest, UploadSource,
};
use super::patch::{CustomerPatch, DocumentTypePatch, ProductPatch, RequirementPatch};
use super::query::CustomerQuery;
use super::repository::{
    CollectionStore, EventPublisher, FileStore, RepositoryError, StorageError,
};
use super::service::{
    CollectionService, CollectionServiceError, DocumentTypeFilter, ProductFilter,
};
use super::validation::ValidationError;

type Shared<S, F, P> = Arc<CollectionService<S, F, P>>;

/// Router builder exposing the catalog, customer, upload, and completeness endpoints.
pub fn collection_router<S, F, P>(service: Shared<S, F, P>) -> Router
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    let upload_limit = usize::try_from(service.upload_policy().max_file_size())
        .unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/api/v1/customers",
            get(list_customers_handler::<S, F, P>).post(create_customer_handler::<S, F, P>),
        )
        .route(
            "/api/v1/customers/:customer_id",
            get(get_customer_handler::<S, F, P>)
                .put(update_customer_handler::<S, F, P>)
                .delete(delete_customer_handler::<S, F, P>),
        )
        .route(
            "/api/v1/products",
            get(list_products_handler::<S, F, P>).post(create_product_handler::<S, F, P>),
        )
        .route(
            "/api/v1/products/:product_id",
            get(get_product_handler::<S, F, P>)
                .put(update_product_handler::<S, F, P>)
                .delete(delete_product_handler::<S, F, P>),
        )
        .route(
            "/api/v1/products/:product_id/requirements",
            post(add_requirement_handler::<S, F, P>),
        )
        .route(
            "/api/v1/products/:product_id/requirements/:requirement_id",
            put(update_requirement_handler::<S, F, P>)
                .delete(remove_requirement_handler::<S, F, P>),
        )
        .route(
            "/api/v1/document-types",
            get(list_document_types_handler::<S, F, P>)
                .post(create_document_type_handler::<S, F, P>),
        )
        .route(
            "/api/v1/document-types/:document_type_id",
            get(get_document_type_handler::<S, F, P>)
                .put(update_document_type_handler::<S, F, P>)
                .delete(delete_document_type_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/upload",
            post(upload_handler::<S, F, P>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/documents/customer/:customer_id",
            get(list_documents_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/customer/:customer_id/completeness",
            get(completeness_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/customer/:customer_id/detailed-completeness",
            get(detailed_completeness_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/customer/:customer_id/missing",
            get(missing_documents_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/:document_id",
            axum::routing::delete(delete_document_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/:document_id/review",
            post(review_handler::<S, F, P>),
        )
        .route(
            "/api/v1/documents/:document_id/content",
            get(content_handler::<S, F, P>),
        )
        .route("/api/v1/dashboard/stats", get(dashboard_handler::<S, F, P>))
        .with_state(service)
}

/// HTTP status for a service failure.
pub fn service_error_status(err: &CollectionServiceError) -> StatusCode {
    match err {
        CollectionServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        CollectionServiceError::Conflict(_) => StatusCode::CONFLICT,
        CollectionServiceError::Validation(ValidationError::FileTooLarge { .. }) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        CollectionServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        CollectionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        CollectionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        CollectionServiceError::Repository(_) | CollectionServiceError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: CollectionServiceError) -> Response {
    let status = service_error_status(&err);
    if status.is_server_error() {
        error!(error = %err, "collection request failed");
    }
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, CollectionServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn respond_empty(result: Result<(), CollectionServiceError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

/// Runs a service call that reads or writes file bodies on the blocking pool.
async fn offload<S, F, P, T>(
    service: Shared<S, F, P>,
    call: impl FnOnce(&CollectionService<S, F, P>) -> Result<T, CollectionServiceError>
        + Send
        + 'static,
) -> Result<T, CollectionServiceError>
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| StorageError::Backend(format!("file task failed: {err}")))?
}

// Customers

pub(crate) async fn list_customers_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Query(query): Query<CustomerQuery>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.list_customers(&query))
}

pub(crate) async fn create_customer_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Json(input): Json<NewCustomer>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::CREATED, service.create_customer(input))
}

pub(crate) async fn get_customer_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.get_customer(&customer_id))
}

pub(crate) async fn update_customer_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
    Json(patch): Json<CustomerPatch>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.update_customer(&customer_id, patch))
}

pub(crate) async fn delete_customer_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond_empty(offload(service, move |service| service.delete_customer(&customer_id)).await)
}

// Products and requirements

pub(crate) async fn list_products_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Query(filter): Query<ProductFilter>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.list_products(&filter))
}

pub(crate) async fn create_product_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Json(input): Json<NewProduct>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::CREATED, service.create_product(input))
}

pub(crate) async fn get_product_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(product_id): Path<ProductId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.get_product(&product_id))
}

pub(crate) async fn update_product_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(product_id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.update_product(&product_id, patch))
}

pub(crate) async fn delete_product_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(product_id): Path<ProductId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond_empty(service.delete_product(&product_id))
}

pub(crate) async fn add_requirement_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(product_id): Path<ProductId>,
    Json(input): Json<NewRequirement>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::CREATED, service.add_requirement(&product_id, input))
}

pub(crate) async fn update_requirement_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path((product_id, requirement_id)): Path<(ProductId, RequirementId)>,
    Json(patch): Json<RequirementPatch>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.update_requirement(&product_id, &requirement_id, patch),
    )
}

pub(crate) async fn remove_requirement_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path((product_id, requirement_id)): Path<(ProductId, RequirementId)>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond_empty(service.remove_requirement(&product_id, &requirement_id))
}

// Document types

pub(crate) async fn list_document_types_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Query(filter): Query<DocumentTypeFilter>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.list_document_types(&filter))
}

pub(crate) async fn create_document_type_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Json(input): Json<NewDocumentType>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::CREATED, service.create_document_type(input))
}

pub(crate) async fn get_document_type_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(document_type_id): Path<DocumentTypeId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.get_document_type(&document_type_id))
}

pub(crate) async fn update_document_type_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(document_type_id): Path<DocumentTypeId>,
    Json(patch): Json<DocumentTypePatch>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.update_document_type(&document_type_id, patch),
    )
}

pub(crate) async fn delete_document_type_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(document_type_id): Path<DocumentTypeId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond_empty(service.delete_document_type(&document_type_id))
}

// Documents

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    customer_id: CustomerId,
    document_type_id: DocumentTypeId,
    file_name: String,
    #[serde(default)]
    upload_source: UploadSource,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewPayload {
    status: ReviewDecision,
    #[serde(default)]
    review_note: Option<String>,
}

pub(crate) async fn upload_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let request = UploadRequest {
        customer_id: params.customer_id,
        document_type_id: params.document_type_id,
        file_name: params.file_name,
        content_type,
        upload_source: params.upload_source,
        note: params.note,
        body: body.to_vec(),
    };
    respond(
        StatusCode::CREATED,
        offload(service, move |service| service.upload(request)).await,
    )
}

pub(crate) async fn list_documents_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.list_documents(&customer_id))
}

pub(crate) async fn review_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(document_id): Path<DocumentId>,
    Json(payload): Json<ReviewPayload>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.review_document(&document_id, payload.status, payload.review_note),
    )
}

pub(crate) async fn delete_document_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(document_id): Path<DocumentId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond_empty(offload(service, move |service| service.delete_document(&document_id)).await)
}

pub(crate) async fn content_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(document_id): Path<DocumentId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    match offload(service, move |service| service.document_content(&document_id)).await {
        Ok((upload, body)) => {
            let disposition = format!(
                "inline; filename=\"{}\"",
                header_safe_file_name(&upload.file_name)
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, upload.mime_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Replace characters that cannot appear inside a quoted header parameter.
fn header_safe_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_graphic() && ch != '"' && ch != '\\' || ch == ' ' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

// Completeness and dashboard

pub(crate) async fn completeness_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.completeness(&customer_id))
}

pub(crate) async fn detailed_completeness_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.detailed_completeness(&customer_id))
}

pub(crate) async fn missing_documents_handler<S, F, P>(
    State(service): State<Shared<S, F, P>>,
    Path(customer_id): Path<CustomerId>,
) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    match service.missing_documents(&customer_id) {
        Ok(missing) => {
            let payload = json!({
                "customer_id": customer_id,
                "missing_count": missing.len(),
                "missing_documents": missing,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dashboard_handler<S, F, P>(State(service): State<Shared<S, F, P>>) -> Response
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    respond(StatusCode::OK, service.dashboard_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::service::Resource;

    #[test]
    fn oversize_files_map_to_payload_too_large() {
        let err = CollectionServiceError::Validation(ValidationError::FileTooLarge {
            limit: 10,
            found: 11,
        });
        assert_eq!(service_error_status(&err), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn lookups_and_conflicts_map_to_client_errors() {
        let missing = CollectionServiceError::NotFound(Resource::Customer(CustomerId::new()));
        assert_eq!(service_error_status(&missing), StatusCode::NOT_FOUND);
        let conflict = CollectionServiceError::Conflict("taken".to_string());
        assert_eq!(service_error_status(&conflict), StatusCode::CONFLICT);
        let empty = CollectionServiceError::Validation(ValidationError::EmptyFile);
        assert_eq!(service_error_status(&empty), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn file_names_are_made_header_safe() {
        assert_eq!(header_safe_file_name("front \"v2\".jpg"), "front _v2_.jpg");
        assert_eq!(header_safe_file_name("身份证.pdf"), "___.pdf");
    }
}
