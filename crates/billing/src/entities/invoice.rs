use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use feza_database::round_money;
use serde::{Deserialize, Serialize};

use super::{CustomerInput, LineItem};
use crate::totals::LineItemInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a user may set by hand; the payment statuses follow receipts.
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Cancelled | InvoiceStatus::Overdue
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub amount_paid: f64,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub verification_hash: String,
    #[serde(skip_serializing)]
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Invoice {
    pub fn balance_due(&self) -> f64 {
        round_money(self.total - self.amount_paid).max(0.0)
    }

    /// Status implied by the amount paid so far.
    pub fn payment_status(total: f64, amount_paid: f64) -> Option<InvoiceStatus> {
        if amount_paid <= 0.0 {
            None
        } else if amount_paid + 0.005 >= total {
            Some(InvoiceStatus::Paid)
        } else {
            Some(InvoiceStatus::PartiallyPaid)
        }
    }
}

/// An invoice with its items, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
    pub balance_due: f64,
    pub verification_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceInput {
    #[serde(flatten)]
    pub customer: CustomerInput,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub tax_rate: Option<f64>,
    pub notes: Option<String>,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    /// Matches customer name or invoice number.
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
