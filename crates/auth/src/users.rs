use chrono::{DateTime, Utc};
use feza_database::{
    LoginAttemptRepository, NewUser, Page, Paginated, SessionRepository, User,
    UserProfileUpdate, UserRepository, UserStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::access::{AccessControl, ADMIN_ROLE};
use crate::lockout::{LockoutPolicy, LockoutState, LockoutStatus};
use crate::validation::{validate_email, validate_username};
use crate::{password, AuthError, AuthResult};

/// Payload for creating an account
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A user together with their access and lockout state
#[derive(Debug, Clone, Serialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct UserAdmin {
    users: UserRepository,
    sessions: SessionRepository,
    attempts: LoginAttemptRepository,
    access: AccessControl,
    lockout: LockoutPolicy,
}

impl UserAdmin {
    pub fn new(pool: SqlitePool, lockout: LockoutPolicy) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            attempts: LoginAttemptRepository::new(pool.clone()),
            access: AccessControl::new(pool),
            lockout,
        }
    }

    pub async fn create(&self, account: NewAccount) -> AuthResult<UserDetails> {
        let username = account.username.trim();
        let email = account.email.trim().to_lowercase();
        validate_username(username)?;
        validate_email(&email)?;
        password::validate_strength(&account.password)?;

        if self.users.find_by_login(username).await?.is_some()
            || self.users.find_by_login(&email).await?.is_some()
        {
            return Err(AuthError::Conflict(
                "a user with this username or email already exists".into(),
            ));
        }

        let user = self
            .users
            .create(&NewUser {
                username: username.to_string(),
                email,
                password_hash: password::hash_password(&account.password)?,
                first_name: account.first_name,
                last_name: account.last_name,
                phone: account.phone,
                status: UserStatus::Active,
            })
            .await?;

        if !account.roles.is_empty() {
            if let Err(error) = self.access.assign_roles(user.id, &account.roles).await {
                self.users.delete(user.id).await?;
                return Err(error);
            }
        }

        info!(user = %user.public_id, username = %user.username, "user created");
        self.details(user).await
    }

    pub async fn list(&self, search: Option<&str>, page: Page) -> AuthResult<Paginated<User>> {
        Ok(self.users.list(search, page).await?)
    }

    pub async fn get(&self, public_id: &str) -> AuthResult<UserDetails> {
        let user = self.find(public_id).await?;
        self.details(user).await
    }

    pub async fn update_profile(
        &self,
        public_id: &str,
        mut update: UserProfileUpdate,
    ) -> AuthResult<UserDetails> {
        let user = self.find(public_id).await?;
        if let Some(email) = update.email.as_mut() {
            *email = email.trim().to_lowercase();
            validate_email(email)?;
            if let Some(other) = self.users.find_by_login(email).await? {
                if other.id != user.id {
                    return Err(AuthError::Conflict("email already in use".into()));
                }
            }
        }
        let user = self.users.update_profile(user.id, &update).await?;
        self.details(user).await
    }

    /// Deactivating or suspending an account also ends its sessions.
    pub async fn set_status(
        &self,
        actor_id: i64,
        public_id: &str,
        status: UserStatus,
    ) -> AuthResult<UserDetails> {
        let user = self.find(public_id).await?;
        if status != UserStatus::Active {
            if user.id == actor_id {
                return Err(AuthError::Conflict("you cannot deactivate your own account".into()));
            }
            self.ensure_not_last_admin(&user).await?;
        }

        self.users.set_status(user.id, status).await?;
        if status != UserStatus::Active {
            self.sessions.delete_for_user(user.id, None).await?;
        }
        info!(user = %user.public_id, %status, "user status changed");

        let user = self.find(public_id).await?;
        self.details(user).await
    }

    pub async fn set_roles(&self, public_id: &str, roles: &[String]) -> AuthResult<UserDetails> {
        let user = self.find(public_id).await?;
        self.access.assign_roles(user.id, roles).await?;
        self.details(user).await
    }

    pub async fn delete(&self, actor_id: i64, public_id: &str) -> AuthResult<User> {
        let user = self.find(public_id).await?;
        if user.id == actor_id {
            return Err(AuthError::Conflict("you cannot delete your own account".into()));
        }
        self.ensure_not_last_admin(&user).await?;

        self.users.delete(user.id).await?;
        info!(user = %user.public_id, username = %user.username, "user deleted");
        Ok(user)
    }

    /// Administrator override for a locked account.
    pub async fn unlock(&self, public_id: &str) -> AuthResult<UserDetails> {
        let user = self.find(public_id).await?;
        let cleared = self.attempts.clear(user.id).await?;
        info!(user = %user.public_id, cleared, "account unlocked");
        self.details(user).await
    }

    pub async fn find_by_login(&self, identifier: &str) -> AuthResult<User> {
        self.users
            .find_by_login(identifier)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {identifier}")))
    }

    async fn find(&self, public_id: &str) -> AuthResult<User> {
        self.users
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user".into()))
    }

    async fn ensure_not_last_admin(&self, user: &User) -> AuthResult<()> {
        let permissions = self.access.permissions_for(user.id).await?;
        if permissions.roles.contains(ADMIN_ROLE)
            && user.is_active()
            && self.access.admin_count().await? <= 1
        {
            return Err(AuthError::Conflict(
                "the last active administrator cannot be removed".into(),
            ));
        }
        Ok(())
    }

    async fn details(&self, user: User) -> AuthResult<UserDetails> {
        let permissions = self.access.permissions_for(user.id).await?;
        let state = self
            .attempts
            .find_for_user(user.id)
            .await?
            .as_ref()
            .and_then(LockoutState::from_row);
        let locked_until = match self.lockout.evaluate(state.as_ref(), Utc::now()) {
            LockoutStatus::Locked { until } => Some(until),
            _ => None,
        };

        Ok(UserDetails {
            user,
            roles: permissions.roles.into_iter().collect(),
            permissions: permissions.permissions.into_iter().collect(),
            locked_until,
        })
    }
}
