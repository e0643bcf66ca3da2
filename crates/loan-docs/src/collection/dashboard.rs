use serde::{Deserialize, Serialize};

use super::domain::{Customer, CustomerStatus, DocumentStatus, LoanProduct, UploadedFile};

/// Headline counters for the back-office landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_customers: u32,
    pub total_products: u32,
    pub total_documents: u32,
    pub pending_customers: u32,
    pub collecting_customers: u32,
    pub reviewing_customers: u32,
    pub completed_customers: u32,
    pub pending_documents: u32,
    pub approved_documents: u32,
    pub rejected_documents: u32,
}

impl DashboardStats {
    /// `total_products` counts active products only.
    pub fn collect(
        customers: &[Customer],
        products: &[LoanProduct],
        uploads: &[UploadedFile],
    ) -> Self {
        let customers_in = |status: CustomerStatus| {
            customers
                .iter()
                .filter(|customer| customer.status == status)
                .count() as u32
        };
        let uploads_in = |status: DocumentStatus| {
            uploads
                .iter()
                .filter(|upload| upload.status == status)
                .count() as u32
        };

        Self {
            total_customers: customers.len() as u32,
            total_products: products.iter().filter(|product| product.is_active).count() as u32,
            total_documents: uploads.len() as u32,
            pending_customers: customers_in(CustomerStatus::Pending),
            collecting_customers: customers_in(CustomerStatus::Collecting),
            reviewing_customers: customers_in(CustomerStatus::Reviewing),
            completed_customers: customers_in(CustomerStatus::Completed),
            pending_documents: uploads_in(DocumentStatus::Pending),
            approved_documents: uploads_in(DocumentStatus::Approved),
            rejected_documents: uploads_in(DocumentStatus::Rejected),
        }
    }
}
