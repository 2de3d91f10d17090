//! Role based access control.
//!
//! Users hold roles, roles grant permissions. The `admin` role implicitly
//! grants every permission.

use std::collections::BTreeSet;

use feza_database::{Permission, Role, RoleRepository};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::validation::validate_role_name;
use crate::{AuthError, AuthResult};

pub const ADMIN_ROLE: &str = "admin";

/// Permission names seeded by the access-control migration
pub mod permissions {
    pub const USERS_MANAGE: &str = "users.manage";
    pub const ROLES_MANAGE: &str = "roles.manage";
    pub const INVOICES_VIEW: &str = "invoices.view";
    pub const INVOICES_CREATE: &str = "invoices.create";
    pub const INVOICES_EDIT: &str = "invoices.edit";
    pub const INVOICES_DELETE: &str = "invoices.delete";
    pub const QUOTATIONS_VIEW: &str = "quotations.view";
    pub const QUOTATIONS_CREATE: &str = "quotations.create";
    pub const QUOTATIONS_EDIT: &str = "quotations.edit";
    pub const QUOTATIONS_DELETE: &str = "quotations.delete";
    pub const RECEIPTS_VIEW: &str = "receipts.view";
    pub const RECEIPTS_CREATE: &str = "receipts.create";
    pub const RECEIPTS_DELETE: &str = "receipts.delete";
    pub const DOCUMENTS_SEND: &str = "documents.send";
    pub const PETTY_CASH_VIEW: &str = "petty_cash.view";
    pub const PETTY_CASH_MANAGE: &str = "petty_cash.manage";
    pub const ACTIVITY_VIEW: &str = "activity.view";
    pub const SETTINGS_MANAGE: &str = "settings.manage";
    pub const ASSISTANT_USE: &str = "assistant.use";
}

/// Effective permissions of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    pub is_admin: bool,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl PermissionSet {
    pub fn has(&self, permission: &str) -> bool {
        self.is_admin || self.permissions.contains(permission)
    }

    pub fn require(&self, permission: &str) -> AuthResult<()> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(permission.to_string()))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDetails {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct AccessControl {
    roles: RoleRepository,
}

impl AccessControl {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            roles: RoleRepository::new(pool),
        }
    }

    pub async fn permissions_for(&self, user_id: i64) -> AuthResult<PermissionSet> {
        let roles: BTreeSet<String> = self
            .roles
            .roles_for_user(user_id)
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect();
        let permissions = self
            .roles
            .permission_names_for_user(user_id)
            .await?
            .into_iter()
            .collect();

        Ok(PermissionSet {
            is_admin: roles.contains(ADMIN_ROLE),
            roles,
            permissions,
        })
    }

    pub async fn require(&self, user_id: i64, permission: &str) -> AuthResult<()> {
        self.permissions_for(user_id).await?.require(permission)
    }

    pub async fn list_permissions(&self) -> AuthResult<Vec<Permission>> {
        Ok(self.roles.all_permissions().await?)
    }

    pub async fn list_roles(&self) -> AuthResult<Vec<RoleDetails>> {
        let mut details = Vec::new();
        for role in self.roles.list().await? {
            details.push(self.details(role).await?);
        }
        Ok(details)
    }

    pub async fn get_role(&self, id: i64) -> AuthResult<RoleDetails> {
        let role = self
            .roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("role {id}")))?;
        self.details(role).await
    }

    pub async fn create_role(&self, input: RoleInput) -> AuthResult<RoleDetails> {
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| AuthError::Validation("role name is required".into()))?;
        validate_role_name(name)?;

        if self.roles.find_by_name(name).await?.is_some() {
            return Err(AuthError::Conflict(format!("role {name} already exists")));
        }

        let role = self.roles.create(name, input.description.as_deref()).await?;
        if let Some(permissions) = &input.permissions {
            self.roles.set_role_permissions(role.id, permissions).await?;
        }
        info!(role = %role.name, "role created");
        self.details(role).await
    }

    pub async fn update_role(&self, id: i64, input: RoleInput) -> AuthResult<RoleDetails> {
        let existing = self
            .roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("role {id}")))?;

        let name = input.name.as_deref().map(str::trim);
        if let Some(name) = name {
            validate_role_name(name)?;
            if existing.name == ADMIN_ROLE && name != ADMIN_ROLE {
                return Err(AuthError::Conflict("the admin role cannot be renamed".into()));
            }
            if name != existing.name && self.roles.find_by_name(name).await?.is_some() {
                return Err(AuthError::Conflict(format!("role {name} already exists")));
            }
        }

        let role = self
            .roles
            .update(id, name, input.description.as_deref())
            .await?;
        if let Some(permissions) = &input.permissions {
            self.roles.set_role_permissions(role.id, permissions).await?;
        }
        self.details(role).await
    }

    pub async fn delete_role(&self, id: i64) -> AuthResult<Role> {
        let role = self
            .roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("role {id}")))?;
        if role.name == ADMIN_ROLE {
            return Err(AuthError::Conflict("the admin role cannot be deleted".into()));
        }
        self.roles.delete(id).await?;
        info!(role = %role.name, "role deleted");
        Ok(role)
    }

    /// Replace a user's roles by name. Removing the admin role from the last
    /// active administrator is refused.
    pub async fn assign_roles(&self, user_id: i64, role_names: &[String]) -> AuthResult<Vec<String>> {
        let mut role_ids = Vec::with_capacity(role_names.len());
        let mut names = BTreeSet::new();
        for name in role_names {
            let role = self
                .roles
                .find_by_name(name.trim())
                .await?
                .ok_or_else(|| AuthError::Validation(format!("unknown role {name}")))?;
            role_ids.push(role.id);
            names.insert(role.name);
        }

        let current = self.permissions_for(user_id).await?;
        if current.is_admin
            && !names.contains(ADMIN_ROLE)
            && self.roles.count_users_with_role(ADMIN_ROLE).await? <= 1
        {
            return Err(AuthError::Conflict(
                "cannot remove the admin role from the last administrator".into(),
            ));
        }

        self.roles.set_user_roles(user_id, &role_ids).await?;
        Ok(names.into_iter().collect())
    }

    pub(crate) async fn admin_count(&self) -> AuthResult<i64> {
        Ok(self.roles.count_users_with_role(ADMIN_ROLE).await?)
    }

    async fn details(&self, role: Role) -> AuthResult<RoleDetails> {
        let permissions = self
            .roles
            .permissions_for_role(role.id)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        Ok(RoleDetails { role, permissions })
    }
}
