use feza_database::DatabaseError;
use feza_mailer::MailError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("mail error: {0}")]
    Mail(#[from] MailError),
}

impl From<sqlx::Error> for BillingError {
    fn from(error: sqlx::Error) -> Self {
        BillingError::Database(error.into())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
