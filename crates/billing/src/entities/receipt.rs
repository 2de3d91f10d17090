use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    MobileMoney,
    Cheque,
    Card,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::MobileMoney => "Mobile money",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Card => "Card",
        }
    }
}

/// A recorded payment, joined with the number of the invoice it settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receipt {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub receipt_number: String,
    #[serde(skip_serializing)]
    pub invoice_id: Option<i64>,
    pub invoice_number: Option<String>,
    pub payer_name: String,
    pub payer_email: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub verification_hash: String,
    #[serde(skip_serializing)]
    pub created_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptInput {
    /// Public id of the invoice being paid.
    pub invoice_id: Option<String>,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub amount: f64,
    pub currency: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptFilter {
    pub payment_method: Option<PaymentMethod>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
