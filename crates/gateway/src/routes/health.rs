use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::util::{ok, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service liveness", body = crate::util::SuccessResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => "up",
        Err(error) => {
            warn!(%error, "health check could not reach the database");
            "down"
        }
    };

    ok(HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
