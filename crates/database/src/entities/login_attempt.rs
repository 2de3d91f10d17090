//! Failed login bookkeeping

use serde::{Deserialize, Serialize};

/// Consecutive failed logins for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoginAttempt {
    pub id: i64,
    pub user_id: i64,
    pub attempts: i64,
    pub last_attempt_at: String,
    pub locked_until: Option<String>,
    pub ip_address: Option<String>,
}
