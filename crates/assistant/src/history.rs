//! Log of assistant exchanges, one row per question.

use feza_database::{now_rfc3339, DatabaseResult, Page, Paginated};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    /// Plain answer, no SQL in it.
    Answered,
    Executed,
    /// SQL refused by the read-only guard.
    Blocked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatLog {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: Option<i64>,
    pub prompt: String,
    pub response: Option<String>,
    pub generated_sql: Option<String>,
    pub row_count: Option<i64>,
    pub status: ChatStatus,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewChatLog {
    pub user_id: Option<i64>,
    pub prompt: String,
    pub response: Option<String>,
    pub generated_sql: Option<String>,
    pub row_count: Option<i64>,
    pub status: ChatStatus,
    pub error: Option<String>,
    pub duration_ms: i64,
}

#[derive(Clone)]
pub struct ChatLogRepository {
    pool: SqlitePool,
}

impl ChatLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, log: &NewChatLog) -> DatabaseResult<i64> {
        let id = sqlx::query(
            "INSERT INTO ai_chat_logs (user_id, prompt, response, generated_sql, row_count, status, \
             error, duration_ms, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.user_id)
        .bind(&log.prompt)
        .bind(&log.response)
        .bind(&log.generated_sql)
        .bind(log.row_count)
        .bind(log.status)
        .bind(&log.error)
        .bind(log.duration_ms)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// A user's exchanges, newest first.
    pub async fn for_user(&self, user_id: i64, page: Page) -> DatabaseResult<Paginated<ChatLog>> {
        let items = sqlx::query_as::<_, ChatLog>(
            "SELECT id, user_id, prompt, response, generated_sql, row_count, status, error, \
             duration_ms, created_at FROM ai_chat_logs WHERE user_id = ? \
             ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_chat_logs WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Paginated::new(items, total, page))
    }
}
