use feza_database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PettyCashError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for PettyCashError {
    fn from(error: sqlx::Error) -> Self {
        PettyCashError::Database(error.into())
    }
}

pub type PettyCashResult<T> = Result<T, PettyCashError>;
