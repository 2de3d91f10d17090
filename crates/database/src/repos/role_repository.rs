//! Roles, permissions and their assignments.

use sqlx::SqlitePool;

use crate::entities::{Permission, Role};
use crate::types::{now_rfc3339, DatabaseError, DatabaseResult};

#[derive(Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> DatabaseResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    pub async fn find_by_name(&self, name: &str) -> DatabaseResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> DatabaseResult<Role> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO roles (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("role {id}")))
    }

    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> DatabaseResult<Role> {
        let result = sqlx::query(
            "UPDATE roles SET name = COALESCE(?, name), description = COALESCE(?, description), \
             updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(now_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("role {id}")));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("role {id}")))
    }

    pub async fn delete(&self, id: i64) -> DatabaseResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("role {id}")));
        }
        Ok(())
    }

    pub async fn all_permissions(&self) -> DatabaseResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT id, name, module, description FROM permissions ORDER BY module, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    pub async fn permissions_for_role(&self, role_id: i64) -> DatabaseResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT p.id, p.name, p.module, p.description FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = ? ORDER BY p.module, p.name",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    /// Replace the permission set of a role. Unknown names are rejected
    /// before anything is written.
    pub async fn set_role_permissions(
        &self,
        role_id: i64,
        permission_names: &[String],
    ) -> DatabaseResult<()> {
        let mut tx = self.pool.begin().await?;

        let mut permission_ids = Vec::with_capacity(permission_names.len());
        for name in permission_names {
            let id: Option<i64> = sqlx::query_scalar("SELECT id FROM permissions WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await?;
            match id {
                Some(id) => permission_ids.push(id),
                None => {
                    return Err(DatabaseError::Validation(format!("unknown permission {name}")))
                }
            }
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for permission_id in permission_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)",
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn roles_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT r.id, r.name, r.description, r.created_at, r.updated_at FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    /// Replace the roles assigned to a user.
    pub async fn set_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DatabaseResult<()> {
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_id in role_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(role_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Distinct permission names granted to a user through any role.
    pub async fn permission_names_for_user(&self, user_id: i64) -> DatabaseResult<Vec<String>> {
        let names = sqlx::query_scalar(
            "SELECT DISTINCT p.name FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.id \
             JOIN user_roles ur ON ur.role_id = rp.role_id \
             WHERE ur.user_id = ? ORDER BY p.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    pub async fn count_users_with_role(&self, role_name: &str) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT ur.user_id) FROM user_roles ur \
             JOIN roles r ON r.id = ur.role_id \
             JOIN users u ON u.id = ur.user_id \
             WHERE r.name = ? AND u.status = 'active'",
        )
        .bind(role_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
