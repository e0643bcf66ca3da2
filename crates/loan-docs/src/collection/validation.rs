use std::path::Path;

use crate::config::UploadConfig;

use super::domain::{DocumentRequirement, DocumentType};

/// Validation errors raised on catalog writes and uploads.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },
    #[error("document type code '{code}' may only contain letters, digits, '_' and '-'")]
    InvalidCode { code: String },
    #[error("file bounds invalid: min_files {min} must not exceed max_files {max}, and max_files must be at least 1")]
    InvalidFileBounds { min: u32, max: u32 },
    #[error("max_file_size must be greater than zero")]
    InvalidMaxFileSize,
    #[error("page must be >= 1 and page_size between 1 and {max}")]
    InvalidPagination { max: u32 },
    #[error("uploaded file is empty")]
    EmptyFile,
    #[error("file size {found} exceeds maximum allowed size of {limit} bytes")]
    FileTooLarge { limit: u64, found: u64 },
    #[error("file type '{extension}' not allowed. Allowed types: {allowed}")]
    ExtensionNotAllowed { extension: String, allowed: String },
    #[error("document type '{code}' already holds the maximum of {max} file(s)")]
    TooManyFiles { code: String, max: u32 },
    #[error("document type '{code}' is inactive")]
    InactiveDocumentType { code: String },
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::BlankField { field })
    } else {
        Ok(())
    }
}

pub(crate) fn check_file_bounds(min: u32, max: u32) -> Result<(), ValidationError> {
    if max == 0 || min > max {
        Err(ValidationError::InvalidFileBounds { min, max })
    } else {
        Ok(())
    }
}

/// Document type codes become a storage key segment.
pub(crate) fn check_code(code: &str) -> Result<(), ValidationError> {
    require_text("code", code)?;
    if code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::InvalidCode {
            code: code.to_string(),
        })
    }
}

pub(crate) fn check_document_type(document_type: &DocumentType) -> Result<(), ValidationError> {
    check_code(&document_type.code)?;
    require_text("name", &document_type.name)?;
    check_file_bounds(document_type.min_files, document_type.max_files)?;
    if document_type.max_file_size == 0 {
        return Err(ValidationError::InvalidMaxFileSize);
    }
    Ok(())
}

pub(crate) fn check_requirement(requirement: &DocumentRequirement) -> Result<(), ValidationError> {
    check_file_bounds(requirement.min_files, requirement.max_files)
}

/// Lowercased extension of a file name, without the dot. Empty when there is none.
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Trim, strip leading dots, lowercase, and drop blanks and repeats.
pub fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

/// Upload limits applied before any bytes reach the file store.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check the file against the global limits and the document type's own limits.
    ///
    /// `already_counted` is the number of non-rejected files on record for the same
    /// customer and type; `max_files` is the effective cap for that pair.
    pub fn check(
        &self,
        document_type: &DocumentType,
        file_name: &str,
        size: u64,
        already_counted: u32,
        max_files: u32,
    ) -> Result<(), ValidationError> {
        if !document_type.is_active {
            return Err(ValidationError::InactiveDocumentType {
                code: document_type.code.clone(),
            });
        }

        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        let limit = self.max_file_size.min(document_type.max_file_size);
        if size > limit {
            return Err(ValidationError::FileTooLarge { limit, found: size });
        }

        let extension = file_extension(file_name);
        let globally_allowed = self.allowed_extensions.iter().any(|ext| *ext == extension);
        if extension.is_empty() || !globally_allowed || !document_type.accepts_extension(&extension)
        {
            return Err(ValidationError::ExtensionNotAllowed {
                extension,
                allowed: self.allowed_for(document_type).join(", "),
            });
        }

        if already_counted >= max_files {
            return Err(ValidationError::TooManyFiles {
                code: document_type.code.clone(),
                max: max_files,
            });
        }

        Ok(())
    }

    fn allowed_for(&self, document_type: &DocumentType) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .filter(|ext| document_type.accepts_extension(ext))
            .cloned()
            .collect()
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self::new(config.max_file_size, config.allowed_extensions.clone())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}
