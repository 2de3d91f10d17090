use axum::{extract::State, Extension};
use feza_auth::permissions;
use feza_database::{ActivityFilter, ActivityLog, Paginated};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/activity",
    tag = "Activity",
    security(("bearerAuth" = [])),
    params(
        ("user_id" = Option<i64>, Query, description = "Acting user"),
        ("action" = Option<String>, Query, description = "Exact action, e.g. invoice.create"),
        ("entity_type" = Option<String>, Query, description = "Entity kind, e.g. invoice"),
        ("from" = Option<String>, Query, description = "First day, inclusive"),
        ("to" = Option<String>, Query, description = "Last day, inclusive"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Activity log, newest first", body = SuccessResponse),
        (status = 403, description = "Missing activity.view", body = ErrorResponse)
    )
)]
pub async fn list_activity(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(filter): ApiQuery<ActivityFilter>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<ActivityLog>> {
    current.require(permissions::ACTIVITY_VIEW)?;
    ok(state.activity().list(&filter, page.page()).await?)
}
