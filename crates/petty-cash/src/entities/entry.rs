use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Cash in
    Credit,
    /// Cash out
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        })
    }
}

/// A ledger entry joined with its category and the names of the people
/// involved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PettyCashEntry {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub payee: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub approval_status: ApprovalStatus,
    #[serde(skip_serializing)]
    pub approved_by: Option<i64>,
    pub approved_by_name: Option<String>,
    pub approved_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub is_locked: bool,
    pub reconciliation_id: Option<i64>,
    #[serde(skip_serializing)]
    pub created_by: Option<i64>,
    pub created_by_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PettyCashEntry {
    /// Signed effect on the balance.
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryInput {
    pub transaction_date: Option<NaiveDate>,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category_id: Option<i64>,
    pub payee: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

/// An entry as returned after create or update, with the budget check
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEntry {
    #[serde(flatten)]
    pub entry: PettyCashEntry,
    /// The entry takes its category past this month's budget.
    pub over_budget: bool,
    pub budget_remaining: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFilter {
    pub transaction_type: Option<TransactionType>,
    pub approval_status: Option<ApprovalStatus>,
    pub category_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Matches description or payee.
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub id: String,
    pub reason: String,
}

/// Result of approving several entries at once
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkApproval {
    pub approved: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}
