use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    CatalogRequirement, Customer, CustomerId, DocumentId, DocumentRequirement, DocumentStatus,
    DocumentType, DocumentTypeId, LoanProduct, ProductId, RequirementId, UploadedFile,
};
use super::repository::{
    CatalogStore, CustomerStore, FileStore, RepositoryError, StorageError, UploadStore,
};

#[derive(Debug, Default)]
struct Tables {
    customers: Vec<Customer>,
    products: Vec<LoanProduct>,
    document_types: Vec<DocumentType>,
    requirements: Vec<DocumentRequirement>,
    uploads: Vec<UploadedFile>,
}

/// Process-local store backing every repository trait. Rows keep insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCollectionStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryCollectionStore {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn replace<T>(rows: &mut [T], row: T, same: impl Fn(&T) -> bool) -> Result<(), RepositoryError> {
    match rows.iter_mut().find(|existing| same(existing)) {
        Some(slot) => {
            *slot = row;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

fn remove<T>(rows: &mut Vec<T>, same: impl Fn(&T) -> bool) -> Result<(), RepositoryError> {
    let before = rows.len();
    rows.retain(|row| !same(row));
    if rows.len() == before {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

impl CustomerStore for InMemoryCollectionStore {
    fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .customers
            .iter()
            .any(|row| row.id == customer.id || row.customer_no == customer.customer_no)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.customers.push(customer.clone());
        Ok(customer)
    }

    fn update_customer(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let id = customer.id;
        replace(&mut tables.customers, customer, |row| row.id == id)
    }

    fn fetch_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.customers.iter().find(|row| row.id == *id).cloned())
    }

    fn find_customer_by_no(&self, customer_no: &str) -> Result<Option<Customer>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .customers
            .iter()
            .find(|row| row.customer_no == customer_no)
            .cloned())
    }

    fn list_customers(&self) -> Result<Vec<Customer>, RepositoryError> {
        Ok(self.tables()?.customers.clone())
    }

    fn delete_customer(&self, id: &CustomerId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        remove(&mut tables.customers, |row| row.id == *id)
    }
}

impl CatalogStore for InMemoryCollectionStore {
    fn insert_product(
        &self,
        product: LoanProduct,
        requirements: Vec<DocumentRequirement>,
    ) -> Result<LoanProduct, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .products
            .iter()
            .any(|row| row.id == product.id || row.code == product.code)
        {
            return Err(RepositoryError::Conflict);
        }
        for (index, requirement) in requirements.iter().enumerate() {
            let clashes = requirements[..index]
                .iter()
                .chain(tables.requirements.iter())
                .any(|row| {
                    row.id == requirement.id
                        || (row.product_id == requirement.product_id
                            && row.document_type_id == requirement.document_type_id)
                });
            if requirement.product_id != product.id || clashes {
                return Err(RepositoryError::Conflict);
            }
        }
        tables.products.push(product.clone());
        tables.requirements.extend(requirements);
        Ok(product)
    }

    fn update_product(&self, product: LoanProduct) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let id = product.id;
        replace(&mut tables.products, product, |row| row.id == id)
    }

    fn fetch_product(&self, id: &ProductId) -> Result<Option<LoanProduct>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.products.iter().find(|row| row.id == *id).cloned())
    }

    fn find_product_by_code(&self, code: &str) -> Result<Option<LoanProduct>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.products.iter().find(|row| row.code == code).cloned())
    }

    fn list_products(&self) -> Result<Vec<LoanProduct>, RepositoryError> {
        Ok(self.tables()?.products.clone())
    }

    fn delete_product(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        remove(&mut tables.products, |row| row.id == *id)?;
        tables.requirements.retain(|row| row.product_id != *id);
        Ok(())
    }

    fn insert_document_type(
        &self,
        document_type: DocumentType,
    ) -> Result<DocumentType, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .document_types
            .iter()
            .any(|row| row.id == document_type.id || row.code == document_type.code)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.document_types.push(document_type.clone());
        Ok(document_type)
    }

    fn update_document_type(&self, document_type: DocumentType) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let id = document_type.id;
        replace(&mut tables.document_types, document_type, |row| row.id == id)
    }

    fn fetch_document_type(
        &self,
        id: &DocumentTypeId,
    ) -> Result<Option<DocumentType>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.document_types.iter().find(|row| row.id == *id).cloned())
    }

    fn find_document_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<DocumentType>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .document_types
            .iter()
            .find(|row| row.code == code)
            .cloned())
    }

    fn list_document_types(&self) -> Result<Vec<DocumentType>, RepositoryError> {
        let mut types = self.tables()?.document_types.clone();
        types.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(types)
    }

    fn delete_document_type(&self, id: &DocumentTypeId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        remove(&mut tables.document_types, |row| row.id == *id)
    }

    fn document_type_in_requirements(&self, id: &DocumentTypeId) -> Result<bool, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .requirements
            .iter()
            .any(|row| row.document_type_id == *id))
    }

    fn insert_requirement(
        &self,
        requirement: DocumentRequirement,
    ) -> Result<DocumentRequirement, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.requirements.iter().any(|row| {
            row.id == requirement.id
                || (row.product_id == requirement.product_id
                    && row.document_type_id == requirement.document_type_id)
        }) {
            return Err(RepositoryError::Conflict);
        }
        tables.requirements.push(requirement.clone());
        Ok(requirement)
    }

    fn update_requirement(&self, requirement: DocumentRequirement) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let id = requirement.id;
        replace(&mut tables.requirements, requirement, |row| row.id == id)
    }

    fn fetch_requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Option<DocumentRequirement>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.requirements.iter().find(|row| row.id == *id).cloned())
    }

    fn delete_requirement(&self, id: &RequirementId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        remove(&mut tables.requirements, |row| row.id == *id)
    }

    fn list_requirements(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CatalogRequirement>, RepositoryError> {
        let tables = self.tables()?;
        let mut rows: Vec<&DocumentRequirement> = tables
            .requirements
            .iter()
            .filter(|row| row.product_id == *product_id)
            .collect();
        rows.sort_by_key(|row| row.sort_order);

        rows.into_iter()
            .map(|requirement| {
                let document_type = tables
                    .document_types
                    .iter()
                    .find(|row| row.id == requirement.document_type_id)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::Inconsistent(format!(
                            "requirement {} references unknown document type {}",
                            requirement.id, requirement.document_type_id
                        ))
                    })?;
                Ok(CatalogRequirement {
                    requirement: requirement.clone(),
                    document_type,
                })
            })
            .collect()
    }
}

impl UploadStore for InMemoryCollectionStore {
    fn insert_upload(
        &self,
        upload: UploadedFile,
        max_files: u32,
    ) -> Result<UploadedFile, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.uploads.iter().any(|row| row.id == upload.id) {
            return Err(RepositoryError::Conflict);
        }
        let counted = tables
            .uploads
            .iter()
            .filter(|row| {
                row.customer_id == upload.customer_id
                    && row.document_type_id == upload.document_type_id
                    && DocumentStatus::COUNTED.contains(&row.status)
            })
            .count() as u32;
        if counted >= max_files {
            return Err(RepositoryError::LimitReached { max: max_files });
        }
        tables.uploads.push(upload.clone());
        Ok(upload)
    }

    fn update_upload(&self, upload: UploadedFile) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let id = upload.id;
        replace(&mut tables.uploads, upload, |row| row.id == id)
    }

    fn fetch_upload(&self, id: &DocumentId) -> Result<Option<UploadedFile>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.uploads.iter().find(|row| row.id == *id).cloned())
    }

    fn delete_upload(&self, id: &DocumentId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        remove(&mut tables.uploads, |row| row.id == *id)
    }

    fn list_uploads(
        &self,
        customer_id: &CustomerId,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UploadedFile>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .uploads
            .iter()
            .filter(|row| row.customer_id == *customer_id)
            .filter(|row| statuses.is_empty() || statuses.contains(&row.status))
            .cloned()
            .collect())
    }

    fn list_all_uploads(&self) -> Result<Vec<UploadedFile>, RepositoryError> {
        Ok(self.tables()?.uploads.clone())
    }

    fn document_type_in_uploads(&self, id: &DocumentTypeId) -> Result<bool, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.uploads.iter().any(|row| row.document_type_id == *id))
    }
}

/// File bodies held in process memory, keyed by storage key.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFileStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryFileStore {
    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Backend("file store mutex poisoned".to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileStore for InMemoryFileStore {
    fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        self.objects()?.insert(key.to_string(), body.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects()?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Missing(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::Missing(key.to_string()))
    }
}
