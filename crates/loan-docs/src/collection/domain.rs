use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

record_id!(
    /// Identifier wrapper for customer records.
    CustomerId
);
record_id!(
    /// Identifier wrapper for loan products.
    ProductId
);
record_id!(
    /// Identifier wrapper for catalog document types.
    DocumentTypeId
);
record_id!(
    /// Identifier wrapper for a product's document requirement.
    RequirementId
);
record_id!(
    /// Identifier wrapper for an uploaded file.
    DocumentId
);

/// Named category of paperwork (ID card, bank statement, ...) shared across products.
///
/// `is_required`, `min_files` and `max_files` are defaults used when a product carries no
/// requirement of its own for the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: DocumentTypeId,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub is_required: bool,
    pub min_files: u32,
    pub max_files: u32,
    pub max_file_size: u64,
    pub allowed_file_types: Vec<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentType {
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.allowed_file_types.is_empty()
            || self
                .allowed_file_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

/// Loan product a customer applies for; owns the document requirement list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product-specific binding of a document type to required/optional status and file bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequirement {
    pub id: RequirementId,
    pub product_id: ProductId,
    pub document_type_id: DocumentTypeId,
    pub is_required: bool,
    pub min_files: u32,
    pub max_files: u32,
    pub sort_order: i32,
    pub note: Option<String>,
}

/// Requirement joined with the document type it references, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRequirement {
    pub requirement: DocumentRequirement,
    pub document_type: DocumentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Pending,
    Collecting,
    Reviewing,
    Completed,
    Rejected,
}

impl CustomerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Collecting => "collecting",
            Self::Reviewing => "reviewing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub customer_no: String,
    pub name: String,
    pub phone: Option<String>,
    pub id_card: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub product_id: ProductId,
    pub status: CustomerStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review lifecycle of an uploaded file. Files start `Pending` and only a review moves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    /// Statuses that count toward requirement satisfaction.
    pub const COUNTED: [DocumentStatus; 2] = [DocumentStatus::Pending, DocumentStatus::Approved];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub const fn counts_toward_completeness(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Outcome an operator may record on a file; there is no way back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for DocumentStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => DocumentStatus::Approved,
            ReviewDecision::Rejected => DocumentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSource {
    #[default]
    Web,
    Mobile,
    Scanner,
}

/// Ledger entry for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: DocumentId,
    pub customer_id: CustomerId,
    pub document_type_id: DocumentTypeId,
    pub file_name: String,
    pub storage_key: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub upload_source: UploadSource,
    pub note: Option<String>,
    pub status: DocumentStatus,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl UploadedFile {
    /// Record a review outcome, returning the updated entry.
    pub fn reviewed(
        &self,
        decision: ReviewDecision,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: decision.into(),
            review_note: note,
            reviewed_at: Some(at),
            ..self.clone()
        }
    }
}

/// Input for registering a new document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocumentType {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_min_files")]
    pub min_files: u32,
    #[serde(default = "default_max_files")]
    pub max_files: u32,
    #[serde(default = "default_type_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub allowed_file_types: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

/// Input for attaching a document type to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequirement {
    pub document_type_id: DocumentTypeId,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default = "default_min_files")]
    pub min_files: u32,
    #[serde(default = "default_max_files")]
    pub max_files: u32,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub document_requirements: Vec<NewRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub customer_no: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub id_card: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub product_id: ProductId,
    #[serde(default)]
    pub note: Option<String>,
}

/// File body plus the metadata the ledger needs to accept it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub customer_id: CustomerId,
    pub document_type_id: DocumentTypeId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub upload_source: UploadSource,
    pub note: Option<String>,
    pub body: Vec<u8>,
}

fn default_true() -> bool {
    true
}

fn default_min_files() -> u32 {
    1
}

fn default_max_files() -> u32 {
    1
}

fn default_type_max_file_size() -> u64 {
    10 * 1024 * 1024
}
