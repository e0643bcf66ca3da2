mod detailed;
mod report;

pub use detailed::{
    build_detailed_report, DetailedCompletenessReport, DocumentSummary, DocumentTypeProgress,
    UploadStatus,
};
pub use report::{build_report, CompletenessReport, RequirementStatus};

use super::domain::{
    CatalogRequirement, Customer, CustomerId, DocumentStatus, DocumentType, ProductId,
    UploadedFile,
};
use super::repository::{CatalogStore, CustomerStore, RepositoryError, UploadStore};
use tracing::debug;

/// Read access the evaluator needs from the customer, catalog, and upload stores.
pub trait CompletenessSource {
    fn customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    fn requirements(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CatalogRequirement>, RepositoryError>;
    fn uploads(
        &self,
        customer_id: &CustomerId,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UploadedFile>, RepositoryError>;
    fn document_types(&self) -> Result<Vec<DocumentType>, RepositoryError>;
}

impl<T> CompletenessSource for T
where
    T: CustomerStore + CatalogStore + UploadStore,
{
    fn customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        self.fetch_customer(id)
    }

    fn requirements(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CatalogRequirement>, RepositoryError> {
        self.list_requirements(product_id)
    }

    fn uploads(
        &self,
        customer_id: &CustomerId,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UploadedFile>, RepositoryError> {
        self.list_uploads(customer_id, statuses)
    }

    fn document_types(&self) -> Result<Vec<DocumentType>, RepositoryError> {
        self.list_document_types()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletenessError {
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Stateless evaluator; holds nothing between calls and may be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessEvaluator;

impl CompletenessEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate<S>(
        &self,
        source: &S,
        customer_id: &CustomerId,
    ) -> Result<CompletenessReport, CompletenessError>
    where
        S: CompletenessSource + ?Sized,
    {
        let customer = source
            .customer(customer_id)?
            .ok_or(CompletenessError::CustomerNotFound(*customer_id))?;
        let requirements = source.requirements(&customer.product_id)?;
        let uploads = source.uploads(customer_id, &DocumentStatus::COUNTED)?;

        let report = build_report(customer.id, customer.product_id, &requirements, &uploads);
        debug!(
            customer = %customer.id,
            satisfied = report.satisfied_requirements,
            total = report.total_requirements,
            "evaluated document completeness"
        );
        Ok(report)
    }

    pub fn evaluate_detailed<S>(
        &self,
        source: &S,
        customer_id: &CustomerId,
    ) -> Result<DetailedCompletenessReport, CompletenessError>
    where
        S: CompletenessSource + ?Sized,
    {
        let customer = source
            .customer(customer_id)?
            .ok_or(CompletenessError::CustomerNotFound(*customer_id))?;
        let catalog = source.document_types()?;
        let requirements = source.requirements(&customer.product_id)?;
        let uploads = source.uploads(customer_id, &[])?;

        Ok(build_detailed_report(
            customer.id,
            &catalog,
            &requirements,
            &uploads,
        ))
    }
}
