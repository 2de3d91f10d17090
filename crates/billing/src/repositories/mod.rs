//! SQL for billing tables.
//!
//! Repositories are stateless; every function takes an executor so the same
//! statement runs against the pool or inside a service's transaction.

pub mod invoice_repository;
pub mod quotation_repository;
pub mod receipt_repository;

pub use invoice_repository::{InvoiceRecord, InvoiceRepository};
pub use quotation_repository::{QuotationRecord, QuotationRepository};
pub use receipt_repository::{ReceiptRecord, ReceiptRepository};

use sqlx::{QueryBuilder, Sqlite};

pub(crate) fn push_date_range(
    query: &mut QueryBuilder<'_, Sqlite>,
    column: &str,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
) {
    if let Some(from) = from {
        query.push(format!(" AND {column} >= ")).push_bind(from);
    }
    if let Some(to) = to {
        query.push(format!(" AND {column} <= ")).push_bind(to);
    }
}

pub(crate) fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}
