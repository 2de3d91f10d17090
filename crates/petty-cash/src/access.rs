//! Who is acting in the petty cash module and what they may do.

use serde::Serialize;

use crate::entities::PettyCashRole;
use crate::{PettyCashError, PettyCashResult};

/// The acting user with their resolved petty cash role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actor {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub role: PettyCashRole,
    /// Largest amount this user may approve; `None` means unlimited.
    pub approval_limit: Option<f64>,
}

impl Actor {
    pub fn new(user_id: i64, role: PettyCashRole, approval_limit: Option<f64>) -> Self {
        Self {
            user_id,
            role,
            approval_limit,
        }
    }

    pub fn manager(user_id: i64) -> Self {
        Self::new(user_id, PettyCashRole::Manager, None)
    }

    pub fn require_record(&self) -> PettyCashResult<()> {
        if self.role.can_record() {
            Ok(())
        } else {
            Err(PettyCashError::Forbidden(
                "recording petty cash needs the custodian role".into(),
            ))
        }
    }

    pub fn require_approver(&self) -> PettyCashResult<()> {
        if self.role.can_approve() {
            Ok(())
        } else {
            Err(PettyCashError::Forbidden(
                "approving petty cash needs the approver role".into(),
            ))
        }
    }

    pub fn require_manager(&self) -> PettyCashResult<()> {
        if self.role.is_manager() {
            Ok(())
        } else {
            Err(PettyCashError::Forbidden(
                "this action needs the petty cash manager role".into(),
            ))
        }
    }

    /// Whether `amount` is inside this approver's limit.
    pub fn within_limit(&self, amount: f64) -> bool {
        match self.approval_limit {
            Some(limit) if !self.role.is_manager() => amount <= limit + 0.005,
            _ => true,
        }
    }
}
