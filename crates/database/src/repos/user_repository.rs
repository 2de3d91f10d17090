//! User repository for database operations.

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};

use crate::entities::{NewUser, User, UserProfileUpdate, UserStatus};
use crate::types::{new_public_id, now_rfc3339, DatabaseError, DatabaseResult, Page, Paginated};

const USER_COLUMNS: &str = "id, public_id, username, email, password_hash, first_name, last_name, \
     phone, status, otp_hash, otp_expires_at, last_login_at, created_at, updated_at";

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Look up an account by username or email, case-insensitively.
    pub async fn find_by_login(&self, identifier: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(username) = lower(?1) OR lower(email) = lower(?1)"
        ))
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list(&self, search: Option<&str>, page: Page) -> DatabaseResult<Paginated<User>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ?1 IS NULL OR lower(username) LIKE ?1 OR lower(email) LIKE ?1 \
                OR lower(coalesce(first_name, '') || ' ' || coalesce(last_name, '')) LIKE ?1 \
             ORDER BY username ASC LIMIT ?2 OFFSET ?3"
        ))
        .bind(pattern.as_deref())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE ?1 IS NULL OR lower(username) LIKE ?1 OR lower(email) LIKE ?1 \
                OR lower(coalesce(first_name, '') || ' ' || coalesce(last_name, '')) LIKE ?1",
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(Paginated::new(users, total, page))
    }

    pub async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO users (public_id, username, email, password_hash, first_name, last_name, \
             phone, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_public_id())
        .bind(new_user.username.trim())
        .bind(new_user.email.trim().to_lowercase())
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.phone)
        .bind(new_user.status)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.require(id).await
    }

    pub async fn update_profile(&self, id: i64, update: &UserProfileUpdate) -> DatabaseResult<User> {
        let result = sqlx::query(
            "UPDATE users SET email = COALESCE(?, email), first_name = COALESCE(?, first_name), \
             last_name = COALESCE(?, last_name), phone = COALESCE(?, phone), updated_at = ? \
             WHERE id = ?",
        )
        .bind(update.email.as_ref().map(|e| e.trim().to_lowercase()))
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone)
        .bind(now_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {id}")));
        }
        self.require(id).await
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> DatabaseResult<()> {
        self.execute_for_user(
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(now_rfc3339())
                .bind(id),
            id,
        )
        .await
    }

    pub async fn set_status(&self, id: i64, status: UserStatus) -> DatabaseResult<()> {
        self.execute_for_user(
            sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status)
                .bind(now_rfc3339())
                .bind(id),
            id,
        )
        .await
    }

    /// Store the digest of a freshly issued one-time code.
    pub async fn set_otp(&self, id: i64, otp_hash: &str, expires_at: &str) -> DatabaseResult<()> {
        self.execute_for_user(
            sqlx::query("UPDATE users SET otp_hash = ?, otp_expires_at = ? WHERE id = ?")
                .bind(otp_hash)
                .bind(expires_at)
                .bind(id),
            id,
        )
        .await
    }

    pub async fn clear_otp(&self, id: i64) -> DatabaseResult<()> {
        self.execute_for_user(
            sqlx::query("UPDATE users SET otp_hash = NULL, otp_expires_at = NULL WHERE id = ?")
                .bind(id),
            id,
        )
        .await
    }

    pub async fn record_login(&self, id: i64) -> DatabaseResult<()> {
        self.execute_for_user(
            sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
                .bind(now_rfc3339())
                .bind(id),
            id,
        )
        .await
    }

    pub async fn delete(&self, id: i64) -> DatabaseResult<()> {
        self.execute_for_user(sqlx::query("DELETE FROM users WHERE id = ?").bind(id), id)
            .await
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn require(&self, id: i64) -> DatabaseResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {id}")))
    }

    async fn execute_for_user<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        id: i64,
    ) -> DatabaseResult<()> {
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}
