use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::super::domain::{
    CatalogRequirement, CustomerId, DocumentTypeId, ProductId, UploadedFile,
};

/// Satisfaction of a single product requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementStatus {
    pub document_type_id: DocumentTypeId,
    pub document_type_code: String,
    pub document_type_name: String,
    pub is_required: bool,
    pub min_files: u32,
    pub max_files: u32,
    pub uploaded_count: u32,
    pub is_satisfied: bool,
    pub missing_count: u32,
}

/// Completeness of a customer's paperwork against the assigned product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub total_requirements: u32,
    pub satisfied_requirements: u32,
    pub missing_requirements: u32,
    pub completion_percentage: f64,
    pub is_complete: bool,
    pub requirements: Vec<RequirementStatus>,
}

impl CompletenessReport {
    pub fn unsatisfied(&self) -> impl Iterator<Item = &RequirementStatus> {
        self.requirements.iter().filter(|status| !status.is_satisfied)
    }
}

/// Count uploads per document type, ignoring files whose status does not count.
pub(crate) fn counted_by_type(uploads: &[UploadedFile]) -> HashMap<DocumentTypeId, u32> {
    let mut counts = HashMap::new();
    for upload in uploads
        .iter()
        .filter(|upload| upload.status.counts_toward_completeness())
    {
        *counts.entry(upload.document_type_id).or_insert(0) += 1;
    }
    counts
}

pub(crate) fn requirement_status(
    entry: &CatalogRequirement,
    uploaded_count: u32,
) -> RequirementStatus {
    let requirement = &entry.requirement;
    let is_satisfied = !requirement.is_required || uploaded_count >= requirement.min_files;
    let missing_count = if is_satisfied {
        0
    } else {
        requirement.min_files.saturating_sub(uploaded_count)
    };

    RequirementStatus {
        document_type_id: requirement.document_type_id,
        document_type_code: entry.document_type.code.clone(),
        document_type_name: entry.document_type.name.clone(),
        is_required: requirement.is_required,
        min_files: requirement.min_files,
        max_files: requirement.max_files,
        uploaded_count,
        is_satisfied,
        missing_count,
    }
}

/// Percentage of satisfied requirements rounded to two decimals; zero requirements score 0.
pub(crate) fn completion_percentage(satisfied: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(satisfied) / f64::from(total) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Pure join of the requirement list (in catalog order) with the customer's uploads.
pub fn build_report(
    customer_id: CustomerId,
    product_id: ProductId,
    requirements: &[CatalogRequirement],
    uploads: &[UploadedFile],
) -> CompletenessReport {
    let counts = counted_by_type(uploads);

    let statuses: Vec<RequirementStatus> = requirements
        .iter()
        .map(|entry| {
            let uploaded = counts
                .get(&entry.requirement.document_type_id)
                .copied()
                .unwrap_or(0);
            requirement_status(entry, uploaded)
        })
        .collect();

    let total_requirements = statuses.len() as u32;
    let satisfied_requirements = statuses.iter().filter(|status| status.is_satisfied).count() as u32;
    let missing_requirements = total_requirements - satisfied_requirements;

    CompletenessReport {
        customer_id,
        product_id,
        total_requirements,
        satisfied_requirements,
        missing_requirements,
        completion_percentage: completion_percentage(satisfied_requirements, total_requirements),
        is_complete: missing_requirements == 0,
        requirements: statuses,
    }
}
