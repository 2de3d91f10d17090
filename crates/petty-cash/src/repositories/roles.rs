use feza_database::now_rfc3339;
use sqlx::SqliteExecutor;

use crate::entities::{PettyCashRole, RoleAssignment};
use crate::PettyCashResult;

const ASSIGNMENT_SELECT: &str = "SELECT r.user_id, u.public_id AS user_public_id, u.username, \
     r.role, r.approval_limit, r.created_at, r.updated_at \
     FROM petty_cash_roles r JOIN users u ON u.id = r.user_id";

pub struct PettyCashRoleRepository;

impl PettyCashRoleRepository {
    pub async fn for_user<'e>(
        executor: impl SqliteExecutor<'e>,
        user_id: i64,
    ) -> PettyCashResult<Option<RoleAssignment>> {
        let assignment =
            sqlx::query_as::<_, RoleAssignment>(&format!("{ASSIGNMENT_SELECT} WHERE r.user_id = ?"))
                .bind(user_id)
                .fetch_optional(executor)
                .await?;
        Ok(assignment)
    }

    pub async fn list<'e>(executor: impl SqliteExecutor<'e>) -> PettyCashResult<Vec<RoleAssignment>> {
        let assignments =
            sqlx::query_as::<_, RoleAssignment>(&format!("{ASSIGNMENT_SELECT} ORDER BY u.username"))
                .fetch_all(executor)
                .await?;
        Ok(assignments)
    }

    pub async fn upsert<'e>(
        executor: impl SqliteExecutor<'e>,
        user_id: i64,
        role: PettyCashRole,
        approval_limit: Option<f64>,
        assigned_by: Option<i64>,
    ) -> PettyCashResult<()> {
        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO petty_cash_roles (user_id, role, approval_limit, assigned_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET role = excluded.role, \
                approval_limit = excluded.approval_limit, assigned_by = excluded.assigned_by, \
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(role)
        .bind(approval_limit)
        .bind(assigned_by)
        .bind(&now)
        .bind(&now)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn remove<'e>(executor: impl SqliteExecutor<'e>, user_id: i64) -> PettyCashResult<bool> {
        let result = sqlx::query("DELETE FROM petty_cash_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Internal id of a user by public id.
    pub async fn user_id_for<'e>(
        executor: impl SqliteExecutor<'e>,
        public_id: &str,
    ) -> PettyCashResult<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM users WHERE public_id = ?")
            .bind(public_id)
            .fetch_optional(executor)
            .await?;
        Ok(id)
    }
}
