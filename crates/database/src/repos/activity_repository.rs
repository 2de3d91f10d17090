//! Append-only activity log.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::entities::{ActivityFilter, ActivityLog, NewActivity};
use crate::types::{now_rfc3339, DatabaseResult, Page, Paginated};

#[derive(Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, activity: &NewActivity) -> DatabaseResult<i64> {
        let details = activity
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let id = sqlx::query(
            "INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details, ip_address, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(activity.user_id)
        .bind(&activity.action)
        .bind(&activity.entity_type)
        .bind(&activity.entity_id)
        .bind(details)
        .bind(&activity.ip_address)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Newest entries first.
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> DatabaseResult<Paginated<ActivityLog>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT a.id, a.user_id, u.username, a.action, a.entity_type, a.entity_id, a.details, \
             a.ip_address, a.created_at FROM activity_logs a LEFT JOIN users u ON u.id = a.user_id",
        );
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = query
            .build_query_as::<ActivityLog>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM activity_logs a");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Paginated::new(items, total, page))
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ActivityFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        query.push(" AND a.user_id = ").push_bind(user_id);
    }
    if let Some(action) = &filter.action {
        query.push(" AND a.action = ").push_bind(action.clone());
    }
    if let Some(entity_type) = &filter.entity_type {
        query.push(" AND a.entity_type = ").push_bind(entity_type.clone());
    }
    if let Some(from) = filter.from {
        query
            .push(" AND substr(a.created_at, 1, 10) >= ")
            .push_bind(from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = filter.to {
        query
            .push(" AND substr(a.created_at, 1, 10) <= ")
            .push_bind(to.format("%Y-%m-%d").to_string());
    }
}
