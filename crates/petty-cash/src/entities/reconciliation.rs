use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Balanced,
    Discrepancy,
}

impl ReconciliationStatus {
    /// Balanced when the count is within a cent of the books.
    pub fn from_difference(difference: f64) -> Self {
        if difference.abs() < 0.01 {
            ReconciliationStatus::Balanced
        } else {
            ReconciliationStatus::Discrepancy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reconciliation {
    pub id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: f64,
    pub total_credits: f64,
    pub total_debits: f64,
    pub expected_balance: f64,
    pub actual_balance: f64,
    pub difference: f64,
    pub status: ReconciliationStatus,
    pub notes: Option<String>,
    #[serde(skip_serializing)]
    pub reconciled_by: Option<i64>,
    pub reconciled_by_name: Option<String>,
    pub created_at: String,
    /// Entries posted by this reconciliation.
    pub entry_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationInput {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Cash counted in the box at the end of the period.
    pub actual_balance: f64,
    pub notes: Option<String>,
}
