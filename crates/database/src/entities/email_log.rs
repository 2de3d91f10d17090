//! Outbound email log entities

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailLog {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub document_type: Option<String>,
    pub document_id: Option<String>,
    pub status: EmailStatus,
    pub error: Option<String>,
    pub message_id: Option<String>,
    pub sent_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub recipient: String,
    pub subject: String,
    pub document_type: Option<String>,
    pub document_id: Option<String>,
    pub status: EmailStatus,
    pub error: Option<String>,
    pub message_id: Option<String>,
    pub sent_by: Option<i64>,
}
