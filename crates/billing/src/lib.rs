//! Billing for the Feza backend: invoices, quotations and receipts.
//!
//! Every document gets a yearly sequential number (`INV-2026-0001`) and a
//! verification hash that customers can check through the public
//! verification endpoint. Multi-row writes (document plus items, receipt
//! plus invoice balance, quotation conversion) run in a single transaction.

pub mod entities;
mod error;
pub mod numbering;
pub mod repositories;
pub mod services;
pub mod totals;
pub mod verification;

pub use entities::*;
pub use error::{BillingError, BillingResult};
pub use services::{
    DocumentService, EmailDispatch, InvoiceService, QuotationService, ReceiptService,
};
pub use totals::{compute_totals, LineItemInput, Totals};
pub use verification::{DocumentKind, VerificationResult, VerificationStatus, VerifiedDocument};
