//! Billing entities

pub mod invoice;
pub mod quotation;
pub mod receipt;

pub use invoice::{Invoice, InvoiceDocument, InvoiceFilter, InvoiceInput, InvoiceStatus};
pub use quotation::{
    Quotation, QuotationDocument, QuotationFilter, QuotationInput, QuotationStatus,
};
pub use receipt::{PaymentMethod, Receipt, ReceiptFilter, ReceiptInput};

use serde::{Deserialize, Serialize};

/// A priced line on an invoice or quotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LineItem {
    pub id: i64,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
    pub position: i64,
}

/// Customer block shared by invoices and quotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
}

impl CustomerInput {
    pub(crate) fn normalised(&self) -> crate::BillingResult<CustomerInput> {
        let name = self.customer_name.trim();
        if name.is_empty() {
            return Err(crate::BillingError::Validation("customer name is required".into()));
        }
        let email = non_empty(&self.customer_email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !email.contains('@') || email.contains(' ') {
                return Err(crate::BillingError::Validation(
                    "customer email is not valid".into(),
                ));
            }
        }
        Ok(CustomerInput {
            customer_name: name.to_string(),
            customer_email: email,
            customer_phone: non_empty(&self.customer_phone),
            customer_address: non_empty(&self.customer_address),
        })
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
