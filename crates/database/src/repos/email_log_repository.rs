//! Record of every outbound email attempt.

use sqlx::SqlitePool;

use crate::entities::{EmailLog, NewEmailLog};
use crate::types::{now_rfc3339, DatabaseResult, Page, Paginated};

#[derive(Clone)]
pub struct EmailLogRepository {
    pool: SqlitePool,
}

impl EmailLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, log: &NewEmailLog) -> DatabaseResult<i64> {
        let id = sqlx::query(
            "INSERT INTO email_logs (recipient, subject, document_type, document_id, status, error, \
             message_id, sent_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.recipient)
        .bind(&log.subject)
        .bind(&log.document_type)
        .bind(&log.document_id)
        .bind(log.status)
        .bind(&log.error)
        .bind(&log.message_id)
        .bind(log.sent_by)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn list(&self, page: Page) -> DatabaseResult<Paginated<EmailLog>> {
        let items = sqlx::query_as::<_, EmailLog>(
            "SELECT id, recipient, subject, document_type, document_id, status, error, message_id, \
             sent_by, created_at FROM email_logs ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(Paginated::new(items, total, page))
    }
}
