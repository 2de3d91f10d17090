use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use feza_assistant::AssistantError;
use feza_auth::AuthError;
use feza_billing::BillingError;
use feza_database::DatabaseError;
use feza_petty_cash::PettyCashError;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Failure half of the response envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Log the underlying cause and hide it from the client.
    fn internal(cause: &dyn std::fmt::Display) -> Self {
        error!(error = %cause, "request failed");
        Self::internal_server_error("internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            success: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(&format!("{error:#}"))
    }
}

impl From<DatabaseError> for ApiError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(what) => Self::not_found(format!("{what} not found")),
            DatabaseError::Duplicate(message) | DatabaseError::Validation(message) => {
                Self::bad_request(message)
            }
            other => Self::internal(&other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials
            | AuthError::InvalidOtp
            | AuthError::OtpExpired
            | AuthError::SessionNotFound
            | AuthError::SessionExpired => Self::unauthorized(error.to_string()),
            AuthError::AccountLocked { .. } | AuthError::AccountInactive => {
                Self::forbidden(error.to_string())
            }
            AuthError::Forbidden(_) => Self::forbidden(error.to_string()),
            AuthError::NotFound(_) => Self::not_found(error.to_string()),
            AuthError::Conflict(message) | AuthError::Validation(message) => {
                Self::bad_request(message)
            }
            AuthError::Database(error) => error.into(),
            AuthError::PasswordHash(_) | AuthError::Mail(_) => Self::internal(&error),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(error: BillingError) -> Self {
        match error {
            BillingError::NotFound(_) => Self::not_found(error.to_string()),
            BillingError::Validation(message) | BillingError::Conflict(message) => {
                Self::bad_request(message)
            }
            BillingError::Database(error) => error.into(),
            BillingError::Mail(_) => Self::internal(&error),
        }
    }
}

impl From<PettyCashError> for ApiError {
    fn from(error: PettyCashError) -> Self {
        match error {
            PettyCashError::NotFound(_) => Self::not_found(error.to_string()),
            PettyCashError::Validation(message) | PettyCashError::Conflict(message) => {
                Self::bad_request(message)
            }
            PettyCashError::Forbidden(message) => Self::forbidden(message),
            PettyCashError::Database(error) => error.into(),
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(error: AssistantError) -> Self {
        match error {
            AssistantError::Validation(message) => Self::bad_request(message),
            AssistantError::Blocked(_) | AssistantError::Query(_) => {
                Self::bad_request(error.to_string())
            }
            AssistantError::Http(_)
            | AssistantError::Upstream { .. }
            | AssistantError::Unavailable { .. } => {
                warn!(%error, "model server failure");
                Self::bad_gateway("the assistant is currently unavailable")
            }
            AssistantError::Database(error) => error.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn auth_errors_map_to_client_statuses() {
        let locked = AuthError::AccountLocked {
            until: Utc::now(),
            remaining_minutes: 1440,
        };
        let error = ApiError::from(locked);
        assert_eq!(error.status, StatusCode::FORBIDDEN);
        assert!(error.message.contains("1440 minutes"));

        assert_eq!(
            ApiError::from(AuthError::SessionExpired).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::Conflict("taken".into())).status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_failures_are_not_leaked() {
        let error = ApiError::from(BillingError::Database(DatabaseError::Query(
            "no such table: invoices".into(),
        )));
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "internal server error");
    }

    #[test]
    fn model_failures_are_bad_gateway() {
        let error = ApiError::from(AssistantError::Unavailable {
            attempts: 3,
            last: "connection refused".into(),
        });
        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
    }
}
