//! Session entity

use serde::{Deserialize, Serialize};

use crate::types::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub ip_address: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

impl Session {
    /// Unparseable expiry timestamps count as expired.
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        parse_timestamp(&self.expires_at).map_or(true, |expires| expires <= now)
    }
}
