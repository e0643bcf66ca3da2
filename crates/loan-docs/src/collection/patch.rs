//! Partial updates. Each patch carries only the fields the caller supplied and merges
//! them onto a copy of the stored record; validation runs on the merged result.

use serde::{Deserialize, Serialize};

use super::domain::{
    Customer, CustomerStatus, DocumentRequirement, DocumentType, LoanProduct, ProductId,
};

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn merge_optional<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub id_card: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub product_id: Option<ProductId>,
    pub status: Option<CustomerStatus>,
    pub note: Option<String>,
}

impl CustomerPatch {
    pub fn apply(&self, customer: &Customer) -> Customer {
        let mut merged = customer.clone();
        merge(&mut merged.name, &self.name);
        merge_optional(&mut merged.phone, &self.phone);
        merge_optional(&mut merged.id_card, &self.id_card);
        merge_optional(&mut merged.email, &self.email);
        merge_optional(&mut merged.address, &self.address);
        merge(&mut merged.product_id, &self.product_id);
        merge(&mut merged.status, &self.status);
        merge_optional(&mut merged.note, &self.note);
        merged
    }

    /// Product the customer moves to, if the patch reassigns one.
    pub fn reassigned_product(&self, customer: &Customer) -> Option<ProductId> {
        self.product_id.filter(|id| *id != customer.product_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductPatch {
    pub fn apply(&self, product: &LoanProduct) -> LoanProduct {
        let mut merged = product.clone();
        merge(&mut merged.name, &self.name);
        merge_optional(&mut merged.description, &self.description);
        merge(&mut merged.is_active, &self.is_active);
        merged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentTypePatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub is_required: Option<bool>,
    pub min_files: Option<u32>,
    pub max_files: Option<u32>,
    pub max_file_size: Option<u64>,
    pub allowed_file_types: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

impl DocumentTypePatch {
    pub fn apply(&self, document_type: &DocumentType) -> DocumentType {
        let mut merged = document_type.clone();
        merge(&mut merged.name, &self.name);
        merge_optional(&mut merged.category, &self.category);
        merge_optional(&mut merged.description, &self.description);
        merge(&mut merged.is_required, &self.is_required);
        merge(&mut merged.min_files, &self.min_files);
        merge(&mut merged.max_files, &self.max_files);
        merge(&mut merged.max_file_size, &self.max_file_size);
        merge(&mut merged.allowed_file_types, &self.allowed_file_types);
        merge(&mut merged.is_active, &self.is_active);
        merge(&mut merged.sort_order, &self.sort_order);
        merged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementPatch {
    pub is_required: Option<bool>,
    pub min_files: Option<u32>,
    pub max_files: Option<u32>,
    pub sort_order: Option<i32>,
    pub note: Option<String>,
}

impl RequirementPatch {
    pub fn apply(&self, requirement: &DocumentRequirement) -> DocumentRequirement {
        let mut merged = requirement.clone();
        merge(&mut merged.is_required, &self.is_required);
        merge(&mut merged.min_files, &self.min_files);
        merge(&mut merged.max_files, &self.max_files);
        merge(&mut merged.sort_order, &self.sort_order);
        merge_optional(&mut merged.note, &self.note);
        merged
    }
}
