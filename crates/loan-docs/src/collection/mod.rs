//! Document collection workflow: catalog, customers, upload ledger, and completeness.

pub mod completeness;
pub mod dashboard;
pub mod domain;
pub mod memory;
pub mod patch;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

pub use completeness::{
    CompletenessError, CompletenessEvaluator, CompletenessReport, CompletenessSource,
    DetailedCompletenessReport, DocumentTypeProgress, RequirementStatus, UploadStatus,
};
pub use dashboard::DashboardStats;
pub use memory::{InMemoryCollectionStore, InMemoryFileStore};
pub use query::{CustomerQuery, Page};
pub use repository::{
    CollectionEvent, CollectionStore, EventError, EventKind, EventPublisher, FileStore,
    RepositoryError, StorageError,
};
pub use router::collection_router;
pub use service::{
    CollectionService, CollectionServiceError, DocumentTypeFilter, ProductDetail, ProductFilter,
    Resource,
};
pub use validation::{UploadPolicy, ValidationError};

#[cfg(test)]
mod tests;
