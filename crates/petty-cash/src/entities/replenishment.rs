use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReplenishmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ReplenishmentStatus {
    /// pending → approved | rejected, approved → completed
    pub fn can_become(&self, next: ReplenishmentStatus) -> bool {
        matches!(
            (self, next),
            (ReplenishmentStatus::Pending, ReplenishmentStatus::Approved)
                | (ReplenishmentStatus::Pending, ReplenishmentStatus::Rejected)
                | (ReplenishmentStatus::Approved, ReplenishmentStatus::Completed)
        )
    }
}

impl fmt::Display for ReplenishmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplenishmentStatus::Pending => "pending",
            ReplenishmentStatus::Approved => "approved",
            ReplenishmentStatus::Rejected => "rejected",
            ReplenishmentStatus::Completed => "completed",
        })
    }
}

/// A request to top up the cash box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Replenishment {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub request_date: NaiveDate,
    pub amount: f64,
    pub reason: String,
    pub status: ReplenishmentStatus,
    #[serde(skip_serializing)]
    pub requested_by: Option<i64>,
    pub requested_by_name: Option<String>,
    #[serde(skip_serializing)]
    pub approved_by: Option<i64>,
    pub approved_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub completed_at: Option<String>,
    #[serde(skip_serializing)]
    pub transaction_id: Option<i64>,
    /// Public id of the credit entry posted on completion.
    pub transaction_public_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplenishmentInput {
    pub amount: f64,
    pub reason: String,
    pub request_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_request_lifecycle() {
        use ReplenishmentStatus::*;
        assert!(Pending.can_become(Approved));
        assert!(Pending.can_become(Rejected));
        assert!(Approved.can_become(Completed));
        assert!(!Pending.can_become(Completed));
        assert!(!Rejected.can_become(Approved));
        assert!(!Completed.can_become(Completed));
    }
}
