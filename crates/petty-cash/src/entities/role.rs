use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-user role inside the petty cash module, ordered by power
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PettyCashRole {
    Viewer,
    Custodian,
    Approver,
    Manager,
}

impl PettyCashRole {
    pub fn can_record(&self) -> bool {
        *self >= PettyCashRole::Custodian
    }

    pub fn can_approve(&self) -> bool {
        *self >= PettyCashRole::Approver
    }

    pub fn is_manager(&self) -> bool {
        *self == PettyCashRole::Manager
    }
}

impl fmt::Display for PettyCashRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PettyCashRole::Viewer => "viewer",
            PettyCashRole::Custodian => "custodian",
            PettyCashRole::Approver => "approver",
            PettyCashRole::Manager => "manager",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleAssignment {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub user_public_id: String,
    pub username: String,
    pub role: PettyCashRole,
    pub approval_limit: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}
