use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{
    CatalogRequirement, CustomerId, DocumentId, DocumentStatus, DocumentType, DocumentTypeId,
    UploadedFile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    NotUploaded,
    Uploaded,
    Pending,
    Approved,
    Rejected,
}

impl UploadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotUploaded => "not_uploaded",
            Self::Uploaded => "uploaded",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub file_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
}

impl From<&UploadedFile> for DocumentSummary {
    fn from(upload: &UploadedFile) -> Self {
        Self {
            id: upload.id,
            file_name: upload.file_name.clone(),
            size_bytes: upload.size_bytes,
            mime_type: upload.mime_type.clone(),
            status: upload.status,
            uploaded_at: upload.created_at,
            reviewed_at: upload.reviewed_at,
            review_note: upload.review_note.clone(),
        }
    }
}

/// Per document type breakdown of a customer's uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeProgress {
    pub document_type_id: DocumentTypeId,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub is_required: bool,
    pub min_files: u32,
    pub max_files: u32,
    pub max_file_size: u64,
    pub allowed_file_types: Vec<String>,
    pub uploaded_count: u32,
    pub pending_count: u32,
    pub approved_count: u32,
    pub rejected_count: u32,
    pub upload_status: UploadStatus,
    pub documents: Vec<DocumentSummary>,
}

impl DocumentTypeProgress {
    fn counted_files(&self) -> u32 {
        self.pending_count + self.approved_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedCompletenessReport {
    pub customer_id: CustomerId,
    pub total_required: u32,
    pub uploaded_required: u32,
    pub approved_required: u32,
    pub document_types: Vec<DocumentTypeProgress>,
}

/// Status precedence: approved > pending > rejected > uploaded > not uploaded.
///
/// A type with no files is always `NotUploaded`, even when its minimum is zero.
pub(crate) fn derive_upload_status(
    min_files: u32,
    pending: u32,
    approved: u32,
    rejected: u32,
) -> UploadStatus {
    let total = pending + approved + rejected;
    if total == 0 {
        UploadStatus::NotUploaded
    } else if approved >= min_files && approved > 0 {
        UploadStatus::Approved
    } else if pending > 0 {
        UploadStatus::Pending
    } else if rejected == total {
        UploadStatus::Rejected
    } else {
        UploadStatus::Uploaded
    }
}

/// Walk the active catalog (already ordered) and join it with every upload of the customer.
///
/// Bounds and the required flag come from the product requirement when there is one, else
/// from the document type defaults.
pub fn build_detailed_report(
    customer_id: CustomerId,
    catalog: &[DocumentType],
    requirements: &[CatalogRequirement],
    uploads: &[UploadedFile],
) -> DetailedCompletenessReport {
    let document_types: Vec<DocumentTypeProgress> = catalog
        .iter()
        .filter(|document_type| document_type.is_active)
        .map(|document_type| {
            let requirement = requirements
                .iter()
                .map(|entry| &entry.requirement)
                .find(|requirement| requirement.document_type_id == document_type.id);

            let (is_required, min_files, max_files) = match requirement {
                Some(requirement) => (
                    requirement.is_required,
                    requirement.min_files,
                    requirement.max_files,
                ),
                None => (
                    document_type.is_required,
                    document_type.min_files,
                    document_type.max_files,
                ),
            };

            let files: Vec<&UploadedFile> = uploads
                .iter()
                .filter(|upload| upload.document_type_id == document_type.id)
                .collect();
            let count_of = |status: DocumentStatus| {
                files.iter().filter(|upload| upload.status == status).count() as u32
            };
            let pending_count = count_of(DocumentStatus::Pending);
            let approved_count = count_of(DocumentStatus::Approved);
            let rejected_count = count_of(DocumentStatus::Rejected);

            DocumentTypeProgress {
                document_type_id: document_type.id,
                code: document_type.code.clone(),
                name: document_type.name.clone(),
                category: document_type.category.clone(),
                description: document_type.description.clone(),
                is_required,
                min_files,
                max_files,
                max_file_size: document_type.max_file_size,
                allowed_file_types: document_type.allowed_file_types.clone(),
                uploaded_count: files.len() as u32,
                pending_count,
                approved_count,
                rejected_count,
                upload_status: derive_upload_status(
                    min_files,
                    pending_count,
                    approved_count,
                    rejected_count,
                ),
                documents: files.into_iter().map(DocumentSummary::from).collect(),
            }
        })
        .collect();

    let required: Vec<&DocumentTypeProgress> = document_types
        .iter()
        .filter(|progress| progress.is_required)
        .collect();

    DetailedCompletenessReport {
        customer_id,
        total_required: required.len() as u32,
        uploaded_required: required
            .iter()
            .filter(|progress| progress.counted_files() >= progress.min_files)
            .count() as u32,
        approved_required: required
            .iter()
            .filter(|progress| progress.upload_status == UploadStatus::Approved)
            .count() as u32,
        document_types,
    }
}
