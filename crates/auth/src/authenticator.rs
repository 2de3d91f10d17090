use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use feza_config::{AuthConfig, MailConfig, OtpConfig};
use feza_database::{
    format_timestamp, now_rfc3339, parse_timestamp, LoginAttemptRepository, SessionRepository,
    User, UserRepository,
};
use feza_mailer::{default_sender, MailMessage, Mailbox, Mailer};
use rand::RngCore;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::lockout::{LockoutPolicy, LockoutState, LockoutStatus};
use crate::{otp, password, AuthError, AuthResult};

/// A bearer session
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// A pending second-factor challenge
#[derive(Debug, Clone, Serialize)]
pub struct OtpChallenge {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub sent_to: String,
}

/// Result of a correct password
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated { user: User, session: AuthSession },
    OtpRequired(OtpChallenge),
}

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    users: UserRepository,
    attempts: LoginAttemptRepository,
    sessions: SessionRepository,
    mailer: Arc<dyn Mailer>,
    mail: MailConfig,
    session_ttl: Duration,
    lockout: LockoutPolicy,
    otp: OtpConfig,
}

impl Authenticator {
    pub fn new(
        pool: SqlitePool,
        config: &AuthConfig,
        mailer: Arc<dyn Mailer>,
        mail: MailConfig,
    ) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            attempts: LoginAttemptRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            pool,
            mailer,
            mail,
            session_ttl: crate::seconds(config.session_ttl_seconds),
            lockout: LockoutPolicy::from_config(&config.lockout),
            otp: config.otp.clone(),
        }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn otp_enabled(&self) -> bool {
        self.otp.enabled
    }

    /// Check a username/email and password pair.
    ///
    /// Locked accounts are refused before the password is looked at. A wrong
    /// password feeds the lockout counter; a correct one resets it and either
    /// opens a session or, with OTP enabled, emails a one-time code.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        ip_address: Option<&str>,
    ) -> AuthResult<LoginOutcome> {
        let Some(user) = self.users.find_by_login(identifier).await? else {
            warn!(identifier, "login attempt for unknown account");
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        self.ensure_not_locked(&user, now).await?;

        if !password::verify_password(password, &user.password_hash)? {
            return Err(self.record_failure(&user, now, ip_address).await?);
        }

        if !user.is_active() {
            warn!(user = %user.public_id, status = %user.status, "login refused for inactive account");
            return Err(AuthError::AccountInactive);
        }

        self.attempts.clear(user.id).await?;

        if self.otp.enabled {
            let challenge = self.issue_otp(&user).await?;
            return Ok(LoginOutcome::OtpRequired(challenge));
        }

        let session = self.open_session(&user, ip_address).await?;
        Ok(LoginOutcome::Authenticated { user, session })
    }

    /// Complete a login with the emailed code.
    pub async fn verify_otp(
        &self,
        user_public_id: &str,
        code: &str,
        ip_address: Option<&str>,
    ) -> AuthResult<(User, AuthSession)> {
        let user = self
            .users
            .find_by_public_id(user_public_id)
            .await?
            .ok_or(AuthError::InvalidOtp)?;

        let now = Utc::now();
        self.ensure_not_locked(&user, now).await?;

        let (Some(stored), Some(expires_at)) = (
            user.otp_hash.as_deref(),
            user.otp_expires_at.as_deref().and_then(parse_timestamp),
        ) else {
            return Err(AuthError::OtpExpired);
        };

        if expires_at <= now {
            self.users.clear_otp(user.id).await?;
            return Err(AuthError::OtpExpired);
        }

        if !otp::matches(code, stored) {
            warn!(user = %user.public_id, "invalid OTP submitted");
            return match self.record_failure(&user, now, ip_address).await? {
                AuthError::InvalidCredentials => Err(AuthError::InvalidOtp),
                other => Err(other),
            };
        }

        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }

        self.users.clear_otp(user.id).await?;
        self.attempts.clear(user.id).await?;
        let session = self.open_session(&user, ip_address).await?;
        Ok((user, session))
    }

    /// Replace any pending code with a fresh one.
    pub async fn resend_otp(&self, user_public_id: &str) -> AuthResult<OtpChallenge> {
        let user = self
            .users
            .find_by_public_id(user_public_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user".into()))?;

        self.ensure_not_locked(&user, Utc::now()).await?;
        if user.otp_hash.is_none() {
            return Err(AuthError::OtpExpired);
        }
        self.issue_otp(&user).await
    }

    pub async fn authenticate_token(&self, token: &str) -> AuthResult<(User, AuthSession)> {
        let session = self
            .sessions
            .find_by_token(token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let now = Utc::now();
        if session.is_expired(now) {
            self.sessions.delete_by_token(token).await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if !user.is_active() {
            self.sessions.delete_by_token(token).await?;
            return Err(AuthError::AccountInactive);
        }

        let expires_at = parse_timestamp(&session.expires_at).ok_or(AuthError::SessionExpired)?;
        Ok((
            user,
            AuthSession {
                token: session.token,
                user_id: session.user_id,
                expires_at,
            },
        ))
    }

    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        if !self.sessions.delete_by_token(token).await? {
            return Err(AuthError::SessionNotFound);
        }
        Ok(())
    }

    /// Change the caller's password and revoke their other sessions.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
        current_token: Option<&str>,
    ) -> AuthResult<u64> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user".into()))?;

        if !password::verify_password(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if current_password == new_password {
            return Err(AuthError::Validation(
                "new password must differ from the current one".into(),
            ));
        }
        password::validate_strength(new_password)?;

        let hash = password::hash_password(new_password)?;
        self.users.update_password(user.id, &hash).await?;
        let revoked = self.sessions.delete_for_user(user.id, current_token).await?;
        info!(user = %user.public_id, revoked, "password changed");
        Ok(revoked)
    }

    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let purged = self.sessions.delete_expired(&now_rfc3339()).await?;
        debug!(purged, "expired sessions removed");
        Ok(purged)
    }

    async fn ensure_not_locked(&self, user: &User, now: DateTime<Utc>) -> AuthResult<()> {
        let row = self.attempts.find_for_user(user.id).await?;
        let state = row.as_ref().and_then(LockoutState::from_row);

        match self.lockout.evaluate(state.as_ref(), now) {
            LockoutStatus::Locked { until } => {
                warn!(user = %user.public_id, %until, "login refused for locked account");
                Err(AuthError::locked(until, now))
            }
            LockoutStatus::Expired => {
                self.attempts.clear(user.id).await?;
                Ok(())
            }
            LockoutStatus::Clear | LockoutStatus::Counting { .. } if row.is_some() && state.is_none() => {
                self.attempts.clear(user.id).await?;
                Ok(())
            }
            LockoutStatus::Clear | LockoutStatus::Counting { .. } => Ok(()),
        }
    }

    /// Count a failure and return the error to report for it.
    async fn record_failure(
        &self,
        user: &User,
        now: DateTime<Utc>,
        ip_address: Option<&str>,
    ) -> AuthResult<AuthError> {
        let previous = self
            .attempts
            .find_for_user(user.id)
            .await?
            .as_ref()
            .and_then(LockoutState::from_row);
        let next = self.lockout.register_failure(previous.as_ref(), now);

        self.attempts
            .upsert(
                user.id,
                next.attempts,
                &format_timestamp(next.last_attempt_at),
                next.locked_until.map(format_timestamp).as_deref(),
                ip_address,
            )
            .await?;

        match next.locked_until {
            Some(until) => {
                warn!(user = %user.public_id, attempts = next.attempts, %until, "account locked after failed logins");
                Ok(AuthError::locked(until, now))
            }
            None => {
                warn!(user = %user.public_id, attempts = next.attempts, "failed login");
                Ok(AuthError::InvalidCredentials)
            }
        }
    }

    async fn issue_otp(&self, user: &User) -> AuthResult<OtpChallenge> {
        let code = otp::generate_code(self.otp.digits);
        let expires_at = Utc::now() + crate::seconds(self.otp.ttl_seconds);
        self.users
            .set_otp(user.id, &otp::digest(&code), &format_timestamp(expires_at))
            .await?;

        let minutes = (self.otp.ttl_seconds + 59) / 60;
        let message = MailMessage::new(default_sender(&self.mail)?, "Your Feza Logistics login code")
            .to(Mailbox::new(Some(user.display_name()), user.email.clone())?)
            .text(format!(
                "Hello {},\n\nYour login code is {code}. It expires in {minutes} minutes.\n\n\
                 If you did not try to sign in, contact your administrator.\n",
                user.display_name()
            ))
            .html(format!(
                "<p>Hello {},</p><p>Your login code is <strong>{code}</strong>. \
                 It expires in {minutes} minutes.</p>\
                 <p>If you did not try to sign in, contact your administrator.</p>",
                user.display_name()
            ));
        self.mailer.send(&message).await?;

        info!(user = %user.public_id, %expires_at, "login code issued");
        Ok(OtpChallenge {
            user_id: user.public_id.clone(),
            expires_at,
            sent_to: mask_email(&user.email),
        })
    }

    async fn open_session(&self, user: &User, ip_address: Option<&str>) -> AuthResult<AuthSession> {
        let token = generate_session_token();
        let expires_at = Utc::now() + self.session_ttl;

        self.sessions
            .create(user.id, &token, ip_address, &format_timestamp(expires_at))
            .await?;
        self.users.record_login(user.id).await?;
        info!(user = %user.public_id, "session opened");

        Ok(AuthSession {
            token,
            user_id: user.id,
            expires_at,
        })
    }
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `jdoe@example.com` becomes `j***@example.com`.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_url_safe_and_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn masks_email_local_part() {
        assert_eq!(mask_email("jdoe@example.com"), "j***@example.com");
        assert_eq!(mask_email("broken"), "***");
    }
}
