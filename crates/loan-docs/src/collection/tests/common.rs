use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::collection::domain::{
    CustomerId, DocumentId, DocumentTypeId, NewCustomer, NewDocumentType, NewProduct,
    NewRequirement, ProductId, ReviewDecision, UploadRequest, UploadSource, UploadedFile,
};
use crate::collection::repository::{
    CollectionEvent, EventError, EventKind, EventPublisher, FileStore, StorageError,
};
use crate::collection::{
    CollectionService, InMemoryCollectionStore, InMemoryFileStore, UploadPolicy,
};

pub(super) type TestService =
    CollectionService<InMemoryCollectionStore, InMemoryFileStore, RecordingEvents>;

#[derive(Default, Clone)]
pub(super) struct RecordingEvents {
    events: Arc<Mutex<Vec<CollectionEvent>>>,
}

impl RecordingEvents {
    pub(super) fn events(&self) -> Vec<CollectionEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }

    pub(super) fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl EventPublisher for RecordingEvents {
    fn publish(&self, event: CollectionEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct OfflineEvents;

impl EventPublisher for OfflineEvents {
    fn publish(&self, _event: CollectionEvent) -> Result<(), EventError> {
        Err(EventError::Transport("webhook endpoint unreachable".to_string()))
    }
}

pub(super) struct BrokenFiles;

impl FileStore for BrokenFiles {
    fn put(&self, _key: &str, _body: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk offline".to_string()))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Missing(key.to_string()))
    }

    fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("disk offline".to_string()))
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryCollectionStore>,
    pub(super) files: Arc<InMemoryFileStore>,
    pub(super) events: Arc<RecordingEvents>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryCollectionStore::default());
    let files = Arc::new(InMemoryFileStore::default());
    let events = Arc::new(RecordingEvents::default());
    let service = Arc::new(CollectionService::new(
        store.clone(),
        files.clone(),
        events.clone(),
        UploadPolicy::default(),
    ));
    Harness {
        service,
        store,
        files,
        events,
    }
}

pub(super) fn document_type_input(
    code: &str,
    is_required: bool,
    min_files: u32,
    max_files: u32,
) -> NewDocumentType {
    NewDocumentType {
        code: code.to_string(),
        name: format!("{code} document"),
        category: Some("identity".to_string()),
        description: None,
        is_required,
        min_files,
        max_files,
        max_file_size: 1024 * 1024,
        allowed_file_types: Vec::new(),
        is_active: true,
        sort_order: 0,
    }
}

pub(super) fn requirement(
    document_type_id: DocumentTypeId,
    is_required: bool,
    min_files: u32,
    max_files: u32,
    sort_order: i32,
) -> NewRequirement {
    NewRequirement {
        document_type_id,
        is_required,
        min_files,
        max_files,
        sort_order,
        note: None,
    }
}

pub(super) fn product_input(code: &str, requirements: Vec<NewRequirement>) -> NewProduct {
    NewProduct {
        code: code.to_string(),
        name: format!("{code} loan"),
        description: None,
        is_active: true,
        document_requirements: requirements,
    }
}

pub(super) fn customer_input(customer_no: &str, product_id: ProductId) -> NewCustomer {
    NewCustomer {
        customer_no: customer_no.to_string(),
        name: format!("Customer {customer_no}"),
        phone: Some("13800000000".to_string()),
        id_card: None,
        email: None,
        address: None,
        product_id,
        note: None,
    }
}

pub(super) fn upload_request(
    customer_id: CustomerId,
    document_type_id: DocumentTypeId,
    file_name: &str,
    body: &[u8],
) -> UploadRequest {
    UploadRequest {
        customer_id,
        document_type_id,
        file_name: file_name.to_string(),
        content_type: None,
        upload_source: UploadSource::Web,
        note: None,
        body: body.to_vec(),
    }
}

/// Product with type A (required, exactly two files) and type B (optional, one file),
/// plus one customer assigned to it.
pub(super) struct Scenario {
    pub(super) product: ProductId,
    pub(super) type_a: DocumentTypeId,
    pub(super) type_b: DocumentTypeId,
    pub(super) customer: CustomerId,
}

pub(super) fn seed_scenario(service: &TestService) -> Scenario {
    let type_a = service
        .create_document_type(document_type_input("ID_CARD", true, 2, 2))
        .expect("type a");
    let type_b = service
        .create_document_type(document_type_input("PAYSLIP", false, 1, 1))
        .expect("type b");
    let product = service
        .create_product(product_input(
            "PERSONAL",
            vec![
                requirement(type_a.id, true, 2, 2, 1),
                requirement(type_b.id, false, 1, 1, 2),
            ],
        ))
        .expect("product");
    let customer = service
        .create_customer(customer_input("C-001", product.product.id))
        .expect("customer");

    Scenario {
        product: product.product.id,
        type_a: type_a.id,
        type_b: type_b.id,
        customer: customer.id,
    }
}

pub(super) fn upload(
    service: &TestService,
    customer_id: CustomerId,
    document_type_id: DocumentTypeId,
    file_name: &str,
) -> UploadedFile {
    service
        .upload(upload_request(
            customer_id,
            document_type_id,
            file_name,
            b"scanned-bytes",
        ))
        .expect("upload accepted")
}

pub(super) fn review(service: &TestService, id: DocumentId, decision: ReviewDecision) {
    service
        .review_document(&id, decision, None)
        .expect("review recorded");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
