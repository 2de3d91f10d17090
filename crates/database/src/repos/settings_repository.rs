//! Business settings stored as key/value pairs.

use std::collections::BTreeMap;

use sqlx::SqlitePool;

use crate::entities::Setting;
use crate::types::{now_rfc3339, DatabaseResult};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> DatabaseResult<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_by, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    pub async fn get(&self, key: &str) -> DatabaseResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Numeric setting; missing or unparsable values yield `None`.
    pub async fn get_f64(&self, key: &str) -> DatabaseResult<Option<f64>> {
        Ok(self
            .get(key)
            .await?
            .and_then(|value| value.trim().parse::<f64>().ok()))
    }

    /// Upsert several settings atomically.
    pub async fn set_many(
        &self,
        values: &BTreeMap<String, String>,
        updated_by: Option<i64>,
    ) -> DatabaseResult<()> {
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                "INSERT INTO settings (key, value, updated_by, updated_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value, \
                    updated_by = excluded.updated_by, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(value)
            .bind(updated_by)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
