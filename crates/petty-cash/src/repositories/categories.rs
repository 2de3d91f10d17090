use feza_database::now_rfc3339;
use sqlx::SqliteExecutor;

use crate::entities::Category;
use crate::PettyCashResult;

const CATEGORY_COLUMNS: &str =
    "id, name, description, budget_limit, is_active, created_at, updated_at";

pub struct CategoryRepository;

impl CategoryRepository {
    pub async fn list<'e>(
        executor: impl SqliteExecutor<'e>,
        include_inactive: bool,
    ) -> PettyCashResult<Vec<Category>> {
        let sql = if include_inactive {
            format!("SELECT {CATEGORY_COLUMNS} FROM petty_cash_categories ORDER BY name")
        } else {
            format!(
                "SELECT {CATEGORY_COLUMNS} FROM petty_cash_categories WHERE is_active = 1 ORDER BY name"
            )
        };
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(executor)
            .await?;
        Ok(categories)
    }

    pub async fn find_by_id<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
    ) -> PettyCashResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM petty_cash_categories WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(category)
    }

    pub async fn insert<'e>(
        executor: impl SqliteExecutor<'e>,
        name: &str,
        description: Option<&str>,
        budget_limit: Option<f64>,
        is_active: bool,
    ) -> PettyCashResult<i64> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO petty_cash_categories (name, description, budget_limit, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(budget_limit)
        .bind(is_active)
        .bind(&now)
        .bind(&now)
        .execute(executor)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn update<'e>(
        executor: impl SqliteExecutor<'e>,
        id: i64,
        name: &str,
        description: Option<&str>,
        budget_limit: Option<f64>,
        is_active: bool,
    ) -> PettyCashResult<()> {
        sqlx::query(
            "UPDATE petty_cash_categories SET name = ?, description = ?, budget_limit = ?, \
             is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(budget_limit)
        .bind(is_active)
        .bind(now_rfc3339())
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn deactivate<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> PettyCashResult<()> {
        sqlx::query("UPDATE petty_cash_categories SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(now_rfc3339())
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> PettyCashResult<()> {
        sqlx::query("DELETE FROM petty_cash_categories WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
