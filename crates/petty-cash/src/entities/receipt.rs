use serde::{Deserialize, Serialize};

/// Metadata for a scanned receipt attached to a ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntryReceipt {
    pub id: i64,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub storage_path: String,
    #[serde(skip_serializing)]
    pub uploaded_by: Option<i64>,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryReceiptInput {
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub storage_path: String,
}
