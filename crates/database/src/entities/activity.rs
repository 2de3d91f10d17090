//! Activity log entities

use serde::{Deserialize, Serialize};

/// One audit trail entry, joined with the acting user's name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewActivity {
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl NewActivity {
    pub fn new(
        user_id: Option<i64>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            entity_type: entity_type.into(),
            ..Self::default()
        }
    }

    pub fn entity(mut self, entity_id: impl ToString) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

/// Filters accepted by the activity browser; dates are inclusive `YYYY-MM-DD`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}
