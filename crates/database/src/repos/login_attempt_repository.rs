//! Failed-login counters backing account lockout.

use sqlx::SqlitePool;

use crate::entities::LoginAttempt;
use crate::types::DatabaseResult;

#[derive(Clone)]
pub struct LoginAttemptRepository {
    pool: SqlitePool,
}

impl LoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_for_user(&self, user_id: i64) -> DatabaseResult<Option<LoginAttempt>> {
        let attempt = sqlx::query_as::<_, LoginAttempt>(
            "SELECT id, user_id, attempts, last_attempt_at, locked_until, ip_address \
             FROM failed_login_attempts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    /// Write the counter for a user, creating the row on first failure.
    pub async fn upsert(
        &self,
        user_id: i64,
        attempts: i64,
        last_attempt_at: &str,
        locked_until: Option<&str>,
        ip_address: Option<&str>,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO failed_login_attempts (user_id, attempts, last_attempt_at, locked_until, ip_address) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET attempts = excluded.attempts, \
                last_attempt_at = excluded.last_attempt_at, locked_until = excluded.locked_until, \
                ip_address = excluded.ip_address",
        )
        .bind(user_id)
        .bind(attempts)
        .bind(last_attempt_at)
        .bind(locked_until)
        .bind(ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Forget all failures for a user; returns whether a row existed.
    pub async fn clear(&self, user_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM failed_login_attempts WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
