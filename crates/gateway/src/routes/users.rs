use axum::{extract::State, Extension};
use feza_auth::{permissions, NewAccount, UserDetails};
use feza_database::{NewActivity, Paginated, User, UserProfileUpdate, UserStatus};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    /// Matches username, email or name
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusRequest {
    #[schema(value_type = String, example = "inactive")]
    pub status: UserStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserRolesRequest {
    pub roles: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(UserSearchQuery, PageQuery),
    responses(
        (status = 200, description = "Users page", body = SuccessResponse),
        (status = 403, description = "Missing users.manage", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<UserSearchQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<User>> {
    current.require(permissions::USERS_MANAGE)?;
    let users = state
        .users()
        .list(query.search.as_deref(), page.page())
        .await?;
    ok(users)
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Account created", body = SuccessResponse),
        (status = 400, description = "Invalid or duplicate account", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(account): ApiJson<NewAccount>,
) -> ApiResult<UserDetails> {
    current.require(permissions::USERS_MANAGE)?;
    let details = state.users().create(account).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "user.create", "user")
                .entity(&details.user.public_id)
                .details(json!({ "username": details.user.username, "roles": details.roles })),
        )
        .await;

    ok(details)
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "User with roles and lockout state", body = SuccessResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<UserDetails> {
    if id != current.user.public_id {
        current.require(permissions::USERS_MANAGE)?;
    }
    ok(state.users().get(&id).await?)
}

/// Users may edit their own profile; anyone else's needs `users.manage`.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "Profile updated", body = SuccessResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(update): ApiJson<UserProfileUpdate>,
) -> ApiResult<UserDetails> {
    if id != current.user.public_id {
        current.require(permissions::USERS_MANAGE)?;
    }
    let details = state.users().update_profile(&id, update).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "user.update", "user").entity(&id),
        )
        .await;

    ok(details)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/status",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public id")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SuccessResponse),
        (status = 400, description = "Own account or last administrator", body = ErrorResponse)
    )
)]
pub async fn set_user_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<UserStatusRequest>,
) -> ApiResult<UserDetails> {
    current.require(permissions::USERS_MANAGE)?;
    let details = state
        .users()
        .set_status(current.id(), &id, payload.status)
        .await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "user.status", "user")
                .entity(&id)
                .details(json!({ "status": payload.status })),
        )
        .await;

    ok(details)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/roles",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public id")),
    request_body = UserRolesRequest,
    responses(
        (status = 200, description = "Roles replaced", body = SuccessResponse),
        (status = 400, description = "Unknown role", body = ErrorResponse)
    )
)]
pub async fn set_user_roles(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<UserRolesRequest>,
) -> ApiResult<UserDetails> {
    current.require(permissions::USERS_MANAGE)?;
    let details = state.users().set_roles(&id, &payload.roles).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "user.roles", "user")
                .entity(&id)
                .details(json!({ "roles": details.roles })),
        )
        .await;

    ok(details)
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/unlock",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "Failed-login counter cleared", body = SuccessResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn unlock_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<UserDetails> {
    current.require(permissions::USERS_MANAGE)?;
    let details = state.users().unlock(&id).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "user.unlock", "user").entity(&id),
        )
        .await;

    ok(details)
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "User deleted", body = SuccessResponse),
        (status = 400, description = "Own account or last administrator", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<User> {
    current.require(permissions::USERS_MANAGE)?;
    let user = state.users().delete(current.id(), &id).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "user.delete", "user")
                .entity(&id)
                .details(json!({ "username": user.username })),
        )
        .await;

    ok(user)
}
