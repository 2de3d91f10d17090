//! Cross-cutting request handling: bearer authentication, request logging
//! and the envelope for responses axum produces on its own.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use feza_auth::PermissionSet;
use feza_database::User;
use tracing::info;

use crate::util::{client_ip, require_bearer};
use crate::{ApiError, AppState};

/// The authenticated caller, placed in request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub permissions: PermissionSet,
    pub token: String,
    pub ip: Option<String>,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        self.permissions.require(permission).map_err(ApiError::from)
    }

    pub fn can(&self, permission: &str) -> bool {
        self.permissions.has(permission)
    }
}

/// Resolve the bearer token into a [`CurrentUser`] or refuse the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = require_bearer(request.headers())?;
    let (user, _session) = state.authenticate(&token).await?;
    let permissions = state.access().permissions_for(user.id).await?;
    let ip = client_ip(request.headers());

    request.extensions_mut().insert(CurrentUser {
        user,
        permissions,
        token,
        ip,
    });

    Ok(next.run(request).await)
}

pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );

    response
}

/// Router-generated 405s carry no body; give them the failure envelope.
pub async fn envelope_method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        ApiError::method_not_allowed().into_response()
    } else {
        response
    }
}
