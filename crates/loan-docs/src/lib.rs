//! Loan-document collection back office: catalog, customers, upload ledger, and the
//! completeness engine that decides whether a customer's paperwork is done.

pub mod collection;
pub mod config;
pub mod error;
pub mod telemetry;
