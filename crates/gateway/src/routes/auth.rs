use axum::{extract::State, http::HeaderMap, Extension};
use feza_auth::{AuthError, AuthSession, LoginOutcome, OtpChallenge, PermissionSet};
use feza_database::{NewActivity, User};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{client_ip, ok, ApiJson, ApiResult, SuccessResponse};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email address
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub user_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendOtpRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: String,
    #[schema(value_type = Object)]
    pub user: User,
}

impl SessionResponse {
    fn new(session: AuthSession, user: User) -> Self {
        Self {
            token: session.token,
            expires_at: session.expires_at.to_rfc3339(),
            user,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpChallengeResponse {
    pub user_id: String,
    pub expires_at: String,
    /// Masked destination address
    pub sent_to: String,
}

impl From<OtpChallenge> for OtpChallengeResponse {
    fn from(challenge: OtpChallenge) -> Self {
        Self {
            user_id: challenge.user_id,
            expires_at: challenge.expires_at.to_rfc3339(),
            sent_to: challenge.sent_to,
        }
    }
}

/// Either a session or a pending second-factor challenge
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub otp_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<OtpChallengeResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[schema(value_type = Object)]
    pub user: User,
    #[schema(value_type = Object)]
    pub access: PermissionSet,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PasswordChangedResponse {
    pub revoked_sessions: u64,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened or OTP sent", body = SuccessResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account locked or inactive", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let identifier = payload.identifier.trim();
    if identifier.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("identifier and password are required"));
    }
    let ip = client_ip(&headers);

    let outcome = match state
        .authenticator()
        .login(identifier, &payload.password, ip.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(error) => {
            let action = match error {
                AuthError::AccountLocked { .. } => "auth.login_locked",
                _ => "auth.login_failed",
            };
            state
                .record(
                    NewActivity::new(None, action, "user")
                        .details(json!({ "identifier": identifier, "reason": error.to_string() }))
                        .ip(ip),
                )
                .await;
            return Err(error.into());
        }
    };

    match outcome {
        LoginOutcome::Authenticated { user, session } => {
            state
                .record(
                    NewActivity::new(Some(user.id), "auth.login", "user")
                        .entity(&user.public_id)
                        .ip(ip),
                )
                .await;
            ok(LoginResponse {
                otp_required: false,
                session: Some(SessionResponse::new(session, user)),
                challenge: None,
            })
        }
        LoginOutcome::OtpRequired(challenge) => ok(LoginResponse {
            otp_required: true,
            session: None,
            challenge: Some(challenge.into()),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    tag = "Auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Session opened", body = SuccessResponse),
        (status = 401, description = "Invalid or expired code", body = ErrorResponse)
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> ApiResult<SessionResponse> {
    let ip = client_ip(&headers);
    let (user, session) = match state
        .authenticator()
        .verify_otp(payload.user_id.trim(), payload.code.trim(), ip.as_deref())
        .await
    {
        Ok(verified) => verified,
        Err(error) => {
            warn!(user = %payload.user_id, %error, "OTP verification failed");
            return Err(error.into());
        }
    };

    state
        .record(
            NewActivity::new(Some(user.id), "auth.login", "user")
                .entity(&user.public_id)
                .details(json!({ "second_factor": "otp" }))
                .ip(ip),
        )
        .await;

    ok(SessionResponse::new(session, user))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    tag = "Auth",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "A fresh code was sent", body = SuccessResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResendOtpRequest>,
) -> ApiResult<OtpChallengeResponse> {
    let challenge = state
        .authenticator()
        .resend_otp(payload.user_id.trim())
        .await?;
    ok(challenge.into())
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Session closed", body = SuccessResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<serde_json::Value> {
    state.authenticator().logout(&current.token).await?;
    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "auth.logout", "user")
                .entity(&current.user.public_id),
        )
        .await;
    ok(json!({ "logged_out": true }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current user and effective permissions", body = SuccessResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    )
)]
pub async fn me(Extension(current): Extension<CurrentUser>) -> ApiResult<MeResponse> {
    ok(MeResponse {
        user: current.user,
        access: current.permissions,
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    tag = "Auth",
    security(("bearerAuth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; other sessions revoked", body = SuccessResponse),
        (status = 400, description = "Weak or unchanged password", body = ErrorResponse),
        (status = 401, description = "Current password is wrong", body = ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> ApiResult<PasswordChangedResponse> {
    let revoked_sessions = state
        .authenticator()
        .change_password(
            current.id(),
            &payload.current_password,
            &payload.new_password,
            Some(&current.token),
        )
        .await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "auth.password_changed", "user")
                .entity(&current.user.public_id),
        )
        .await;

    ok(PasswordChangedResponse { revoked_sessions })
}
