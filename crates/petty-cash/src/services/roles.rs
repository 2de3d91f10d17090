use tracing::info;

use super::PettyCashService;
use crate::access::Actor;
use crate::entities::{PettyCashRole, RoleAssignment};
use crate::repositories::PettyCashRoleRepository;
use crate::{PettyCashError, PettyCashResult};

impl PettyCashService {
    pub async fn role_assignments(&self, actor: &Actor) -> PettyCashResult<Vec<RoleAssignment>> {
        actor.require_manager()?;
        PettyCashRoleRepository::list(&self.pool).await
    }

    /// Give a user a petty cash role, replacing any previous one.
    pub async fn assign_role(
        &self,
        actor: &Actor,
        user_public_id: &str,
        role: PettyCashRole,
        approval_limit: Option<f64>,
    ) -> PettyCashResult<RoleAssignment> {
        actor.require_manager()?;
        if let Some(limit) = approval_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(PettyCashError::Validation(
                    "approval limit cannot be negative".into(),
                ));
            }
        }
        let user_id = self.user_id(user_public_id).await?;

        PettyCashRoleRepository::upsert(&self.pool, user_id, role, approval_limit, Some(actor.user_id))
            .await?;
        info!(user = %user_public_id, role = %role, ?approval_limit, "petty cash role assigned");

        PettyCashRoleRepository::for_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("role for user {user_public_id}")))
    }

    pub async fn remove_role(&self, actor: &Actor, user_public_id: &str) -> PettyCashResult<()> {
        actor.require_manager()?;
        let user_id = self.user_id(user_public_id).await?;
        if !PettyCashRoleRepository::remove(&self.pool, user_id).await? {
            return Err(PettyCashError::NotFound(format!(
                "petty cash role for user {user_public_id}"
            )));
        }
        info!(user = %user_public_id, "petty cash role removed");
        Ok(())
    }

    async fn user_id(&self, public_id: &str) -> PettyCashResult<i64> {
        PettyCashRoleRepository::user_id_for(&self.pool, public_id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("user {public_id}")))
    }
}
