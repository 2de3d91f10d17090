//! Billing workflows on top of the repositories.

mod document_service;
mod invoice_service;
mod quotation_service;
mod receipt_service;

pub use document_service::{DocumentService, EmailDispatch};
pub use invoice_service::InvoiceService;
pub use quotation_service::QuotationService;
pub use receipt_service::ReceiptService;

use chrono::{Duration, NaiveDate, Utc};
use feza_database::SettingsRepository;

use crate::entities::non_empty;
use crate::{BillingError, BillingResult};

const DEFAULT_TERM_DAYS: i64 = 30;

/// Currency and tax rate used when a document does not name its own
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BillingDefaults {
    pub currency: String,
    pub tax_rate: f64,
}

impl BillingDefaults {
    pub(crate) async fn load(settings: &SettingsRepository) -> BillingResult<Self> {
        let currency = settings
            .get("default_currency")
            .await?
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "RWF".to_string());
        let tax_rate = settings.get_f64("default_tax_rate").await?.unwrap_or(0.0);
        Ok(Self { currency, tax_rate })
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn default_term(issue_date: NaiveDate) -> NaiveDate {
    issue_date + Duration::days(DEFAULT_TERM_DAYS)
}

/// Three-letter currency code, upper-cased.
pub(crate) fn normalise_currency(value: &Option<String>, fallback: &str) -> BillingResult<String> {
    let currency = non_empty(value)
        .map(|c| c.to_uppercase())
        .unwrap_or_else(|| fallback.to_string());
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(BillingError::Validation(format!(
            "currency must be a three letter code, got {currency}"
        )));
    }
    Ok(currency)
}
