use axum::{extract::State, Extension};
use feza_auth::{permissions, RoleDetails, RoleInput};
use feza_database::{NewActivity, Permission, Role};
use serde_json::json;

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiResult, SuccessResponse};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/permissions",
    tag = "Roles",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Every grantable permission", body = SuccessResponse),
        (status = 403, description = "Missing roles.manage", body = ErrorResponse)
    )
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<Permission>> {
    current.require(permissions::ROLES_MANAGE)?;
    ok(state.access().list_permissions().await?)
}

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "Roles",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Roles with their permissions", body = SuccessResponse),
        (status = 403, description = "Missing roles.manage", body = ErrorResponse)
    )
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<RoleDetails>> {
    current.require(permissions::ROLES_MANAGE)?;
    ok(state.access().list_roles().await?)
}

#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "Roles",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Role created", body = SuccessResponse),
        (status = 400, description = "Invalid or duplicate role", body = ErrorResponse)
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<RoleInput>,
) -> ApiResult<RoleDetails> {
    current.require(permissions::ROLES_MANAGE)?;
    let role = state.access().create_role(input).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "role.create", "role")
                .entity(role.role.id)
                .details(json!({ "name": role.role.name, "permissions": role.permissions })),
        )
        .await;

    ok(role)
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    tag = "Roles",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role with its permissions", body = SuccessResponse),
        (status = 404, description = "Unknown role", body = ErrorResponse)
    )
)]
pub async fn get_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RoleDetails> {
    current.require(permissions::ROLES_MANAGE)?;
    ok(state.access().get_role(id).await?)
}

/// Fields left out of the body keep their value; `permissions` replaces the
/// whole grant list when present.
#[utoipa::path(
    put,
    path = "/api/roles/{id}",
    tag = "Roles",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role updated", body = SuccessResponse),
        (status = 400, description = "Invalid change", body = ErrorResponse)
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<RoleInput>,
) -> ApiResult<RoleDetails> {
    current.require(permissions::ROLES_MANAGE)?;
    let role = state.access().update_role(id, input).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "role.update", "role")
                .entity(id)
                .details(json!({ "name": role.role.name, "permissions": role.permissions })),
        )
        .await;

    ok(role)
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    tag = "Roles",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted", body = SuccessResponse),
        (status = 400, description = "The admin role cannot be deleted", body = ErrorResponse)
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Role> {
    current.require(permissions::ROLES_MANAGE)?;
    let role = state.access().delete_role(id).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "role.delete", "role")
                .entity(id)
                .details(json!({ "name": role.name })),
        )
        .await;

    ok(role)
}
