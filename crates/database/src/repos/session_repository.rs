//! Session repository for database operations.

use sqlx::SqlitePool;

use crate::entities::Session;
use crate::types::{now_rfc3339, DatabaseError, DatabaseResult};

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        token: &str,
        ip_address: Option<&str>,
        expires_at: &str,
    ) -> DatabaseResult<Session> {
        let id = sqlx::query(
            "INSERT INTO sessions (user_id, token, ip_address, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(ip_address)
        .bind(now_rfc3339())
        .bind(expires_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token, ip_address, created_at, expires_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("session {id}")))
    }

    pub async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, token, ip_address, created_at, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn delete_by_token(&self, token: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every session of a user except, optionally, the one in use.
    pub async fn delete_for_user(&self, user_id: i64, keep_token: Option<&str>) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND (? IS NULL OR token != ?)")
            .bind(user_id)
            .bind(keep_token)
            .bind(keep_token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_expired(&self, now: &str) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
