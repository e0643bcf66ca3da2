use serde::{Deserialize, Serialize};

use super::domain::{Customer, CustomerStatus, ProductId};
use super::validation::ValidationError;

pub const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Customer list filters and pagination, as accepted on the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub product_id: Option<ProductId>,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            status: None,
            product_id: None,
        }
    }
}

impl CustomerQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.page == 0 || self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::InvalidPagination { max: MAX_PAGE_SIZE });
        }
        Ok(())
    }

    fn matches(&self, customer: &Customer) -> bool {
        if let Some(status) = self.status {
            if customer.status != status {
                return false;
            }
        }
        if let Some(product_id) = self.product_id {
            if customer.product_id != product_id {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                let contains = |value: &str| value.to_lowercase().contains(&term);
                contains(&customer.customer_no)
                    || contains(&customer.name)
                    || customer.phone.as_deref().map(contains).unwrap_or(false)
            }
            _ => true,
        }
    }

    /// Filter then slice `customers`, keeping their order.
    pub fn apply(&self, customers: Vec<Customer>) -> Result<Page<Customer>, ValidationError> {
        self.validate()?;

        let matching: Vec<Customer> = customers
            .into_iter()
            .filter(|customer| self.matches(customer))
            .collect();
        let total = matching.len() as u32;
        let offset = ((self.page - 1) as usize).saturating_mul(self.page_size as usize);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(self.page_size as usize)
            .collect();

        Ok(Page {
            items,
            total,
            page: self.page,
            page_size: self.page_size,
            total_pages: total.div_ceil(self.page_size),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u32,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}
