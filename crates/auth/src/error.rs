use chrono::{DateTime, Utc};
use feza_database::DatabaseError;
use feza_mailer::MailError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account locked, try again in {remaining_minutes} minutes")]
    AccountLocked {
        until: DateTime<Utc>,
        remaining_minutes: i64,
    },
    #[error("account is not active")]
    AccountInactive,
    #[error("OTP expired")]
    OtpExpired,
    #[error("invalid OTP")]
    InvalidOtp,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("mail error: {0}")]
    Mail(#[from] MailError),
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> Self {
        AuthError::Database(error.into())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(error: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(error.to_string())
    }
}

impl AuthError {
    pub(crate) fn locked(until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (until - now).num_seconds().max(0);
        AuthError::AccountLocked {
            until,
            remaining_minutes: (remaining + 59) / 60,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
