use feza_database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0}")]
    Validation(String),
    #[error("model server request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model server answered with status {status}")]
    Upstream { status: u16 },
    #[error("model server unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },
    #[error("generated query blocked: {0}")]
    Blocked(String),
    #[error("generated query failed: {0}")]
    Query(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AssistantError {
    fn from(error: sqlx::Error) -> Self {
        AssistantError::Database(error.into())
    }
}

pub type AssistantResult<T> = Result<T, AssistantError>;
