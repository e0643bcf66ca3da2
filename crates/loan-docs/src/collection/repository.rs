use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CatalogRequirement, Customer, CustomerId, DocumentId, DocumentRequirement, DocumentStatus,
    DocumentType, DocumentTypeId, LoanProduct, ProductId, RequirementId, UploadedFile,
};

/// Customer records keyed by id, with a unique `customer_no`.
pub trait CustomerStore: Send + Sync {
    fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError>;
    fn update_customer(&self, customer: Customer) -> Result<(), RepositoryError>;
    fn fetch_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    fn find_customer_by_no(&self, customer_no: &str) -> Result<Option<Customer>, RepositoryError>;
    /// All customers, oldest first.
    fn list_customers(&self) -> Result<Vec<Customer>, RepositoryError>;
    fn delete_customer(&self, id: &CustomerId) -> Result<(), RepositoryError>;
}

/// Products, document types, and the requirement rows binding them.
pub trait CatalogStore: Send + Sync {
    /// Inserts the product together with its requirement rows, or nothing at all.
    fn insert_product(
        &self,
        product: LoanProduct,
        requirements: Vec<DocumentRequirement>,
    ) -> Result<LoanProduct, RepositoryError>;
    fn update_product(&self, product: LoanProduct) -> Result<(), RepositoryError>;
    fn fetch_product(&self, id: &ProductId) -> Result<Option<LoanProduct>, RepositoryError>;
    fn find_product_by_code(&self, code: &str) -> Result<Option<LoanProduct>, RepositoryError>;
    fn list_products(&self) -> Result<Vec<LoanProduct>, RepositoryError>;
    /// Removes the product together with its requirement rows.
    fn delete_product(&self, id: &ProductId) -> Result<(), RepositoryError>;

    fn insert_document_type(
        &self,
        document_type: DocumentType,
    ) -> Result<DocumentType, RepositoryError>;
    fn update_document_type(&self, document_type: DocumentType) -> Result<(), RepositoryError>;
    fn fetch_document_type(
        &self,
        id: &DocumentTypeId,
    ) -> Result<Option<DocumentType>, RepositoryError>;
    fn find_document_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<DocumentType>, RepositoryError>;
    /// Every document type ordered by `sort_order`, then name.
    fn list_document_types(&self) -> Result<Vec<DocumentType>, RepositoryError>;
    fn delete_document_type(&self, id: &DocumentTypeId) -> Result<(), RepositoryError>;
    fn document_type_in_requirements(&self, id: &DocumentTypeId) -> Result<bool, RepositoryError>;

    fn insert_requirement(
        &self,
        requirement: DocumentRequirement,
    ) -> Result<DocumentRequirement, RepositoryError>;
    fn update_requirement(&self, requirement: DocumentRequirement) -> Result<(), RepositoryError>;
    fn fetch_requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Option<DocumentRequirement>, RepositoryError>;
    fn delete_requirement(&self, id: &RequirementId) -> Result<(), RepositoryError>;
    /// Requirements of a product joined with their document types, in catalog order.
    fn list_requirements(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CatalogRequirement>, RepositoryError>;
}

/// Ledger of uploaded files.
pub trait UploadStore: Send + Sync {
    /// Inserts the upload unless the customer already holds `max_files` non-rejected files
    /// of its document type. The count and the insert happen atomically.
    fn insert_upload(
        &self,
        upload: UploadedFile,
        max_files: u32,
    ) -> Result<UploadedFile, RepositoryError>;
    fn update_upload(&self, upload: UploadedFile) -> Result<(), RepositoryError>;
    fn fetch_upload(&self, id: &DocumentId) -> Result<Option<UploadedFile>, RepositoryError>;
    fn delete_upload(&self, id: &DocumentId) -> Result<(), RepositoryError>;
    /// Uploads of one customer, oldest first. An empty filter means every status.
    fn list_uploads(
        &self,
        customer_id: &CustomerId,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UploadedFile>, RepositoryError>;
    fn list_all_uploads(&self) -> Result<Vec<UploadedFile>, RepositoryError>;
    fn document_type_in_uploads(&self, id: &DocumentTypeId) -> Result<bool, RepositoryError>;
}

/// Everything the collection service persists.
pub trait CollectionStore: CustomerStore + CatalogStore + UploadStore {}

impl<T> CollectionStore for T where T: CustomerStore + CatalogStore + UploadStore {}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("file limit of {max} reached")]
    LimitReached { max: u32 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("repository data inconsistent: {0}")]
    Inconsistent(String),
}

/// Object storage for file bodies. Keys are relative paths chosen by the service.
pub trait FileStore: Send + Sync {
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("stored object '{0}' not found")]
    Missing(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Outbound notification hook (webhooks, sockets, audit trail adapters).
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: CollectionEvent) -> Result<(), EventError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "customer.created")]
    CustomerCreated,
    #[serde(rename = "customer.updated")]
    CustomerUpdated,
    #[serde(rename = "customer.deleted")]
    CustomerDeleted,
    #[serde(rename = "document.uploaded")]
    DocumentUploaded,
    #[serde(rename = "document.approved")]
    DocumentApproved,
    #[serde(rename = "document.rejected")]
    DocumentRejected,
    #[serde(rename = "document.deleted")]
    DocumentDeleted,
    #[serde(rename = "product.created")]
    ProductCreated,
    #[serde(rename = "product.updated")]
    ProductUpdated,
    #[serde(rename = "product.deleted")]
    ProductDeleted,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::CustomerCreated => "customer.created",
            Self::CustomerUpdated => "customer.updated",
            Self::CustomerDeleted => "customer.deleted",
            Self::DocumentUploaded => "document.uploaded",
            Self::DocumentApproved => "document.approved",
            Self::DocumentRejected => "document.rejected",
            Self::DocumentDeleted => "document.deleted",
            Self::ProductCreated => "product.created",
            Self::ProductUpdated => "product.updated",
            Self::ProductDeleted => "product.deleted",
        }
    }
}

/// Event payload handed to publishers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEvent {
    pub kind: EventKind,
    pub subject_id: String,
    pub details: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl CollectionEvent {
    pub fn new(kind: EventKind, subject_id: impl ToString) -> Self {
        Self {
            kind,
            subject_id: subject_id.to_string(),
            details: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}
