use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CustomerInput, LineItem};
use crate::totals::LineItemInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Converted => "converted",
        }
    }

    pub fn can_convert(&self) -> bool {
        matches!(self, QuotationStatus::Sent | QuotationStatus::Accepted)
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quotation {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub quotation_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub issue_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub currency: String,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub status: QuotationStatus,
    #[serde(skip_serializing)]
    pub converted_invoice_id: Option<i64>,
    pub notes: Option<String>,
    pub verification_hash: String,
    #[serde(skip_serializing)]
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotationDocument {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub items: Vec<LineItem>,
    /// Public id of the invoice this quotation became, if any.
    pub converted_invoice: Option<String>,
    pub verification_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotationInput {
    #[serde(flatten)]
    pub customer: CustomerInput,
    pub issue_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub currency: Option<String>,
    pub tax_rate: Option<f64>,
    pub notes: Option<String>,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationFilter {
    pub status: Option<QuotationStatus>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
