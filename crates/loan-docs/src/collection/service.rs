use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::completeness::{
    CompletenessError, CompletenessEvaluator, CompletenessReport, DetailedCompletenessReport,
    RequirementStatus,
};
use super::dashboard::DashboardStats;
use super::domain::{
    CatalogRequirement, Customer, CustomerId, CustomerStatus, DocumentId, DocumentRequirement,
    DocumentStatus, DocumentType, DocumentTypeId, LoanProduct, NewCustomer, NewDocumentType,
    NewProduct, NewRequirement, ProductId, RequirementId, ReviewDecision, UploadRequest,
    UploadedFile,
};
use super::patch::{CustomerPatch, DocumentTypePatch, ProductPatch, RequirementPatch};
use super::query::{CustomerQuery, Page};
use super::repository::{
    CollectionEvent, CollectionStore, EventKind, EventPublisher, FileStore, RepositoryError,
    StorageError,
};
use super::validation::{
    check_document_type, check_requirement, file_extension, normalize_extensions, require_text,
    UploadPolicy, ValidationError,
};

/// Record kinds that lookups can miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Customer(CustomerId),
    Product(ProductId),
    DocumentType(DocumentTypeId),
    Requirement(RequirementId),
    Document(DocumentId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Customer(id) => write!(f, "customer {id}"),
            Resource::Product(id) => write!(f, "product {id}"),
            Resource::DocumentType(id) => write!(f, "document type {id}"),
            Resource::Requirement(id) => write!(f, "document requirement {id}"),
            Resource::Document(id) => write!(f, "document {id}"),
        }
    }
}

/// Error raised by the collection service.
#[derive(Debug, thiserror::Error)]
pub enum CollectionServiceError {
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CompletenessError> for CollectionServiceError {
    fn from(value: CompletenessError) -> Self {
        match value {
            CompletenessError::CustomerNotFound(id) => Self::NotFound(Resource::Customer(id)),
            CompletenessError::Repository(err) => Self::Repository(err),
        }
    }
}

/// Product with its requirement list joined to document types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: LoanProduct,
    pub document_requirements: Vec<CatalogRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentTypeFilter {
    pub is_active: Option<bool>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub is_active: Option<bool>,
}

/// Facade over the stores, the file store, the event hook, and the completeness engine.
pub struct CollectionService<S, F, P> {
    store: Arc<S>,
    files: Arc<F>,
    events: Arc<P>,
    policy: UploadPolicy,
    evaluator: CompletenessEvaluator,
}

impl<S, F, P> CollectionService<S, F, P>
where
    S: CollectionStore + 'static,
    F: FileStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, files: Arc<F>, events: Arc<P>, policy: UploadPolicy) -> Self {
        Self {
            store,
            files,
            events,
            policy,
            evaluator: CompletenessEvaluator::new(),
        }
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.policy
    }

    fn announce(&self, event: CollectionEvent) {
        let kind = event.kind.label();
        if let Err(err) = self.events.publish(event) {
            warn!(event = kind, error = %err, "event publish failed");
        }
    }

    fn customer_record(&self, id: &CustomerId) -> Result<Customer, CollectionServiceError> {
        self.store
            .fetch_customer(id)?
            .ok_or(CollectionServiceError::NotFound(Resource::Customer(*id)))
    }

    fn product_record(&self, id: &ProductId) -> Result<LoanProduct, CollectionServiceError> {
        self.store
            .fetch_product(id)?
            .ok_or(CollectionServiceError::NotFound(Resource::Product(*id)))
    }

    fn document_type_record(
        &self,
        id: &DocumentTypeId,
    ) -> Result<DocumentType, CollectionServiceError> {
        self.store
            .fetch_document_type(id)?
            .ok_or(CollectionServiceError::NotFound(Resource::DocumentType(*id)))
    }

    fn upload_record(&self, id: &DocumentId) -> Result<UploadedFile, CollectionServiceError> {
        self.store
            .fetch_upload(id)?
            .ok_or(CollectionServiceError::NotFound(Resource::Document(*id)))
    }

    fn requirement_record(
        &self,
        product_id: &ProductId,
        id: &RequirementId,
    ) -> Result<DocumentRequirement, CollectionServiceError> {
        self.store
            .fetch_requirement(id)?
            .filter(|requirement| requirement.product_id == *product_id)
            .ok_or(CollectionServiceError::NotFound(Resource::Requirement(*id)))
    }

    // Document types

    pub fn create_document_type(
        &self,
        input: NewDocumentType,
    ) -> Result<DocumentType, CollectionServiceError> {
        let now = Utc::now();
        let document_type = DocumentType {
            id: DocumentTypeId::new(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            category: input.category,
            description: input.description,
            is_required: input.is_required,
            min_files: input.min_files,
            max_files: input.max_files,
            max_file_size: input.max_file_size,
            allowed_file_types: normalize_extensions(input.allowed_file_types),
            is_active: input.is_active,
            sort_order: input.sort_order,
            created_at: now,
            updated_at: now,
        };
        check_document_type(&document_type)?;

        if self
            .store
            .find_document_type_by_code(&document_type.code)?
            .is_some()
        {
            return Err(CollectionServiceError::Conflict(format!(
                "document type code '{}' already exists",
                document_type.code
            )));
        }

        let stored = self.store.insert_document_type(document_type)?;
        info!(code = %stored.code, id = %stored.id, "document type created");
        Ok(stored)
    }

    pub fn get_document_type(
        &self,
        id: &DocumentTypeId,
    ) -> Result<DocumentType, CollectionServiceError> {
        self.document_type_record(id)
    }

    pub fn list_document_types(
        &self,
        filter: &DocumentTypeFilter,
    ) -> Result<Vec<DocumentType>, CollectionServiceError> {
        Ok(self
            .store
            .list_document_types()?
            .into_iter()
            .filter(|document_type| {
                filter
                    .is_active
                    .map_or(true, |active| document_type.is_active == active)
            })
            .filter(|document_type| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |category| {
                        document_type.category.as_deref() == Some(category)
                    })
            })
            .collect())
    }

    pub fn update_document_type(
        &self,
        id: &DocumentTypeId,
        patch: DocumentTypePatch,
    ) -> Result<DocumentType, CollectionServiceError> {
        let current = self.document_type_record(id)?;
        let mut updated = patch.apply(&current);
        updated.allowed_file_types = normalize_extensions(updated.allowed_file_types);
        updated.updated_at = Utc::now();
        check_document_type(&updated)?;

        self.store.update_document_type(updated.clone())?;
        info!(code = %updated.code, "document type updated");
        Ok(updated)
    }

    pub fn delete_document_type(&self, id: &DocumentTypeId) -> Result<(), CollectionServiceError> {
        let document_type = self.document_type_record(id)?;
        if self.store.document_type_in_uploads(id)? {
            return Err(CollectionServiceError::Conflict(format!(
                "document type '{}' is referenced by customer documents",
                document_type.code
            )));
        }
        if self.store.document_type_in_requirements(id)? {
            return Err(CollectionServiceError::Conflict(format!(
                "document type '{}' is referenced by product requirements",
                document_type.code
            )));
        }

        self.store.delete_document_type(id)?;
        info!(code = %document_type.code, "document type deleted");
        Ok(())
    }

    // Products and requirements

    fn build_requirement(
        &self,
        product_id: ProductId,
        input: NewRequirement,
    ) -> Result<DocumentRequirement, CollectionServiceError> {
        self.document_type_record(&input.document_type_id)?;
        let requirement = DocumentRequirement {
            id: RequirementId::new(),
            product_id,
            document_type_id: input.document_type_id,
            is_required: input.is_required,
            min_files: input.min_files,
            max_files: input.max_files,
            sort_order: input.sort_order,
            note: input.note,
        };
        check_requirement(&requirement)?;
        Ok(requirement)
    }

    fn joined_requirement(
        &self,
        requirement: DocumentRequirement,
    ) -> Result<CatalogRequirement, CollectionServiceError> {
        let document_type = self.document_type_record(&requirement.document_type_id)?;
        Ok(CatalogRequirement {
            requirement,
            document_type,
        })
    }

    pub fn create_product(&self, input: NewProduct) -> Result<ProductDetail, CollectionServiceError> {
        let now = Utc::now();
        let product = LoanProduct {
            id: ProductId::new(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        require_text("code", &product.code)?;
        require_text("name", &product.name)?;

        if self.store.find_product_by_code(&product.code)?.is_some() {
            return Err(CollectionServiceError::Conflict(format!(
                "product code '{}' already exists",
                product.code
            )));
        }

        let mut seen = HashSet::new();
        let mut requirements = Vec::with_capacity(input.document_requirements.len());
        for requirement in input.document_requirements {
            if !seen.insert(requirement.document_type_id) {
                return Err(CollectionServiceError::Conflict(format!(
                    "document type {} listed twice for product '{}'",
                    requirement.document_type_id, product.code
                )));
            }
            requirements.push(self.build_requirement(product.id, requirement)?);
        }

        let stored = self.store.insert_product(product, requirements)?;

        info!(code = %stored.code, id = %stored.id, "product created");
        self.announce(
            CollectionEvent::new(EventKind::ProductCreated, stored.id)
                .with_detail("code", &stored.code),
        );
        self.get_product(&stored.id)
    }

    pub fn get_product(&self, id: &ProductId) -> Result<ProductDetail, CollectionServiceError> {
        let product = self.product_record(id)?;
        let document_requirements = self.store.list_requirements(id)?;
        Ok(ProductDetail {
            product,
            document_requirements,
        })
    }

    pub fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<LoanProduct>, CollectionServiceError> {
        Ok(self
            .store
            .list_products()?
            .into_iter()
            .filter(|product| filter.is_active.map_or(true, |active| product.is_active == active))
            .collect())
    }

    pub fn update_product(
        &self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<ProductDetail, CollectionServiceError> {
        let current = self.product_record(id)?;
        let mut updated = patch.apply(&current);
        require_text("name", &updated.name)?;
        updated.updated_at = Utc::now();

        self.store.update_product(updated)?;
        self.announce(CollectionEvent::new(EventKind::ProductUpdated, id));
        self.get_product(id)
    }

    pub fn delete_product(&self, id: &ProductId) -> Result<(), CollectionServiceError> {
        let product = self.product_record(id)?;
        let assigned = self
            .store
            .list_customers()?
            .iter()
            .filter(|customer| customer.product_id == *id)
            .count();
        if assigned > 0 {
            return Err(CollectionServiceError::Conflict(format!(
                "product '{}' is assigned to {assigned} customer(s)",
                product.code
            )));
        }

        self.store.delete_product(id)?;
        info!(code = %product.code, "product deleted");
        self.announce(
            CollectionEvent::new(EventKind::ProductDeleted, id).with_detail("code", &product.code),
        );
        Ok(())
    }

    pub fn add_requirement(
        &self,
        product_id: &ProductId,
        input: NewRequirement,
    ) -> Result<CatalogRequirement, CollectionServiceError> {
        let product = self.product_record(product_id)?;
        let requirement = self.build_requirement(product.id, input)?;

        let duplicate = self
            .store
            .list_requirements(product_id)?
            .iter()
            .any(|entry| entry.requirement.document_type_id == requirement.document_type_id);
        if duplicate {
            return Err(CollectionServiceError::Conflict(format!(
                "document requirement already exists for product '{}'",
                product.code
            )));
        }

        let stored = self.store.insert_requirement(requirement)?;
        info!(product = %product.code, requirement = %stored.id, "document requirement added");
        self.joined_requirement(stored)
    }

    pub fn update_requirement(
        &self,
        product_id: &ProductId,
        requirement_id: &RequirementId,
        patch: RequirementPatch,
    ) -> Result<CatalogRequirement, CollectionServiceError> {
        let current = self.requirement_record(product_id, requirement_id)?;
        let updated = patch.apply(&current);
        check_requirement(&updated)?;

        self.store.update_requirement(updated.clone())?;
        self.joined_requirement(updated)
    }

    pub fn remove_requirement(
        &self,
        product_id: &ProductId,
        requirement_id: &RequirementId,
    ) -> Result<(), CollectionServiceError> {
        self.requirement_record(product_id, requirement_id)?;
        self.store.delete_requirement(requirement_id)?;
        info!(product = %product_id, requirement = %requirement_id, "document requirement removed");
        Ok(())
    }

    // Customers

    pub fn create_customer(&self, input: NewCustomer) -> Result<Customer, CollectionServiceError> {
        let now = Utc::now();
        let customer = Customer {
            id: CustomerId::new(),
            customer_no: input.customer_no.trim().to_string(),
            name: input.name.trim().to_string(),
            phone: input.phone,
            id_card: input.id_card,
            email: input.email,
            address: input.address,
            product_id: input.product_id,
            status: CustomerStatus::Collecting,
            note: input.note,
            created_at: now,
            updated_at: now,
        };
        require_text("customer_no", &customer.customer_no)?;
        require_text("name", &customer.name)?;

        if self
            .store
            .find_customer_by_no(&customer.customer_no)?
            .is_some()
        {
            return Err(CollectionServiceError::Conflict(format!(
                "customer number '{}' already exists",
                customer.customer_no
            )));
        }
        self.product_record(&customer.product_id)?;

        let stored = self.store.insert_customer(customer)?;
        info!(customer = %stored.id, customer_no = %stored.customer_no, "customer created");
        self.announce(
            CollectionEvent::new(EventKind::CustomerCreated, stored.id)
                .with_detail("customer_no", &stored.customer_no),
        );
        Ok(stored)
    }

    pub fn get_customer(&self, id: &CustomerId) -> Result<Customer, CollectionServiceError> {
        self.customer_record(id)
    }

    pub fn list_customers(
        &self,
        query: &CustomerQuery,
    ) -> Result<Page<Customer>, CollectionServiceError> {
        let customers = self.store.list_customers()?;
        Ok(query.apply(customers)?)
    }

    pub fn update_customer(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Customer, CollectionServiceError> {
        let current = self.customer_record(id)?;
        if let Some(product_id) = patch.reassigned_product(&current) {
            self.product_record(&product_id)?;
        }

        let mut updated = patch.apply(&current);
        require_text("name", &updated.name)?;
        updated.updated_at = Utc::now();
        self.store.update_customer(updated.clone())?;

        let mut event = CollectionEvent::new(EventKind::CustomerUpdated, id);
        if updated.status != current.status {
            event = event
                .with_detail("previous_status", current.status.label())
                .with_detail("status", updated.status.label());
        }
        self.announce(event);
        Ok(updated)
    }

    /// Delete the customer along with every upload record and stored object it owns.
    pub fn delete_customer(&self, id: &CustomerId) -> Result<(), CollectionServiceError> {
        let customer = self.customer_record(id)?;
        for upload in self.store.list_uploads(id, &[])? {
            self.discard_object(&upload.storage_key)?;
            self.store.delete_upload(&upload.id)?;
        }
        self.store.delete_customer(id)?;

        info!(customer = %id, customer_no = %customer.customer_no, "customer deleted");
        self.announce(
            CollectionEvent::new(EventKind::CustomerDeleted, id)
                .with_detail("customer_no", &customer.customer_no),
        );
        Ok(())
    }

    // Upload ledger

    fn discard_object(&self, key: &str) -> Result<(), CollectionServiceError> {
        match self.files.delete(key) {
            Ok(()) => Ok(()),
            Err(StorageError::Missing(key)) => {
                warn!(key = %key, "stored object already gone");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn upload(&self, request: UploadRequest) -> Result<UploadedFile, CollectionServiceError> {
        let customer = self.customer_record(&request.customer_id)?;
        let document_type = self.document_type_record(&request.document_type_id)?;
        require_text("file_name", &request.file_name)?;

        let max_files = self
            .store
            .list_requirements(&customer.product_id)?
            .into_iter()
            .find(|entry| entry.requirement.document_type_id == document_type.id)
            .map(|entry| entry.requirement.max_files)
            .unwrap_or(document_type.max_files);
        let already_counted = self
            .store
            .list_uploads(&customer.id, &DocumentStatus::COUNTED)?
            .iter()
            .filter(|upload| upload.document_type_id == document_type.id)
            .count() as u32;

        let size = request.body.len() as u64;
        self.policy.check(
            &document_type,
            &request.file_name,
            size,
            already_counted,
            max_files,
        )?;

        let extension = file_extension(&request.file_name);
        let storage_key = format!(
            "{}/{}/{}.{}",
            customer.id,
            document_type.code,
            Uuid::new_v4(),
            extension
        );
        let mime_type = resolve_mime(request.content_type.as_deref(), &request.file_name);

        self.files.put(&storage_key, &request.body)?;

        let record = UploadedFile {
            id: DocumentId::new(),
            customer_id: customer.id,
            document_type_id: document_type.id,
            file_name: request.file_name,
            storage_key,
            size_bytes: size,
            mime_type,
            upload_source: request.upload_source,
            note: request.note,
            status: DocumentStatus::Pending,
            review_note: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };

        let stored = match self.store.insert_upload(record.clone(), max_files) {
            Ok(stored) => stored,
            Err(err) => {
                if let Err(cleanup) = self.files.delete(&record.storage_key) {
                    warn!(key = %record.storage_key, error = %cleanup, "orphaned stored object");
                }
                return Err(match err {
                    RepositoryError::LimitReached { max } => ValidationError::TooManyFiles {
                        code: document_type.code,
                        max,
                    }
                    .into(),
                    other => other.into(),
                });
            }
        };

        info!(
            customer = %stored.customer_id,
            document_type = %document_type.code,
            document = %stored.id,
            size = stored.size_bytes,
            "document uploaded"
        );
        self.announce(
            CollectionEvent::new(EventKind::DocumentUploaded, stored.id)
                .with_detail("customer_id", stored.customer_id)
                .with_detail("document_type", &document_type.code),
        );
        Ok(stored)
    }

    pub fn list_documents(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<UploadedFile>, CollectionServiceError> {
        self.customer_record(customer_id)?;
        Ok(self.store.list_uploads(customer_id, &[])?)
    }

    pub fn review_document(
        &self,
        id: &DocumentId,
        decision: ReviewDecision,
        review_note: Option<String>,
    ) -> Result<UploadedFile, CollectionServiceError> {
        let current = self.upload_record(id)?;
        let reviewed = current.reviewed(decision, review_note, Utc::now());
        self.store.update_upload(reviewed.clone())?;

        let kind = match decision {
            ReviewDecision::Approved => EventKind::DocumentApproved,
            ReviewDecision::Rejected => EventKind::DocumentRejected,
        };
        info!(document = %id, status = reviewed.status.label(), "document reviewed");
        self.announce(
            CollectionEvent::new(kind, id).with_detail("customer_id", reviewed.customer_id),
        );
        Ok(reviewed)
    }

    pub fn delete_document(&self, id: &DocumentId) -> Result<(), CollectionServiceError> {
        let upload = self.upload_record(id)?;
        self.discard_object(&upload.storage_key)?;
        self.store.delete_upload(id)?;

        info!(document = %id, "document deleted");
        self.announce(
            CollectionEvent::new(EventKind::DocumentDeleted, id)
                .with_detail("customer_id", upload.customer_id),
        );
        Ok(())
    }

    pub fn document_content(
        &self,
        id: &DocumentId,
    ) -> Result<(UploadedFile, Vec<u8>), CollectionServiceError> {
        let upload = self.upload_record(id)?;
        let body = self.files.get(&upload.storage_key)?;
        Ok((upload, body))
    }

    // Completeness

    pub fn completeness(
        &self,
        customer_id: &CustomerId,
    ) -> Result<CompletenessReport, CollectionServiceError> {
        Ok(self.evaluator.evaluate(self.store.as_ref(), customer_id)?)
    }

    pub fn missing_documents(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<RequirementStatus>, CollectionServiceError> {
        let report = self.completeness(customer_id)?;
        Ok(report.unsatisfied().cloned().collect())
    }

    pub fn detailed_completeness(
        &self,
        customer_id: &CustomerId,
    ) -> Result<DetailedCompletenessReport, CollectionServiceError> {
        Ok(self
            .evaluator
            .evaluate_detailed(self.store.as_ref(), customer_id)?)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, CollectionServiceError> {
        let customers = self.store.list_customers()?;
        let products = self.store.list_products()?;
        let uploads = self.store.list_all_uploads()?;
        Ok(DashboardStats::collect(&customers, &products, &uploads))
    }
}

/// Prefer the declared content type; fall back to a guess from the file name.
fn resolve_mime(declared: Option<&str>, file_name: &str) -> String {
    declared
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .filter(|mime| *mime != mime::APPLICATION_OCTET_STREAM)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
}
