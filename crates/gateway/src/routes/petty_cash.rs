//! Petty cash endpoints.
//!
//! Every route needs `petty_cash.view`; what the caller may do beyond reading
//! follows their petty cash role (custodian, approver, manager). Holding the
//! global `petty_cash.manage` permission makes a user a manager.

use axum::{extract::State, Extension};
use chrono::{NaiveDate, Utc};
use feza_auth::permissions;
use feza_database::{NewActivity, Paginated};
use feza_petty_cash::{
    Actor, BulkApproval, Category, CategoryInput, CategoryRemoval, EntryFilter, EntryInput,
    EntryReceipt, EntryReceiptInput, PettyCashEntry, PettyCashRole, PettyCashSummary,
    Reconciliation, ReconciliationInput, RecordedEntry, Replenishment, ReplenishmentInput,
    ReplenishmentStatus, RoleAssignment,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Day the month-to-date figures are computed for; defaults to today
    #[param(value_type = Option<String>, example = "2026-06-30")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReplenishmentQuery {
    #[param(value_type = Option<String>, example = "pending")]
    pub status: Option<ReplenishmentStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkApproveRequest {
    /// Entry public ids, approved in order
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    #[schema(value_type = String, example = "approver")]
    pub role: PettyCashRole,
    /// Largest amount the user may approve; omit for no limit
    pub approval_limit: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryRemovalResponse {
    pub id: i64,
    #[schema(value_type = String, example = "deactivated")]
    pub outcome: CategoryRemoval,
}

async fn actor(state: &AppState, current: &CurrentUser) -> Result<Actor, ApiError> {
    current.require(permissions::PETTY_CASH_VIEW)?;
    let actor = state
        .petty_cash()
        .actor(current.id(), current.can(permissions::PETTY_CASH_MANAGE))
        .await?;
    Ok(actor)
}

fn activity(current: &CurrentUser, action: &str, entity_type: &str) -> NewActivity {
    NewActivity::new(Some(current.id()), action, entity_type)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/me",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The caller's petty cash role and approval limit", body = SuccessResponse),
        (status = 403, description = "Missing petty_cash.view", body = ErrorResponse)
    )
)]
pub async fn my_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Actor> {
    ok(actor(&state, &current).await?)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/summary",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(SummaryQuery),
    responses(
        (status = 200, description = "Balance, pending approvals and monthly category spend", body = SuccessResponse),
        (status = 403, description = "Missing petty_cash.view", body = ErrorResponse)
    )
)]
pub async fn summary(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<PettyCashSummary> {
    actor(&state, &current).await?;
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    ok(state.petty_cash().summary(as_of).await?)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/entries",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(
        ("transaction_type" = Option<String>, Query, description = "credit or debit"),
        ("approval_status" = Option<String>, Query, description = "pending, approved or rejected"),
        ("category_id" = Option<i64>, Query, description = "Category id"),
        ("from" = Option<String>, Query, description = "First transaction date"),
        ("to" = Option<String>, Query, description = "Last transaction date"),
        ("search" = Option<String>, Query, description = "Matches description or payee"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Entries page, newest first", body = SuccessResponse),
        (status = 403, description = "Missing petty_cash.view", body = ErrorResponse)
    )
)]
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(filter): ApiQuery<EntryFilter>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<PettyCashEntry>> {
    actor(&state, &current).await?;
    ok(state.petty_cash().entries(&filter, page.page()).await?)
}

/// Record a credit or debit. Debits above the approved balance are refused;
/// a debit past its category's monthly budget is accepted and flagged.
#[utoipa::path(
    post,
    path = "/api/petty-cash/entries",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Entry recorded as pending", body = SuccessResponse),
        (status = 400, description = "Invalid entry or insufficient balance", body = ErrorResponse),
        (status = 403, description = "Custodian role required", body = ErrorResponse)
    )
)]
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<EntryInput>,
) -> ApiResult<RecordedEntry> {
    let actor = actor(&state, &current).await?;
    let recorded = state.petty_cash().record_entry(&actor, &input).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.entry_create", "petty_cash_entry")
                .entity(&recorded.entry.public_id)
                .details(json!({
                    "amount": recorded.entry.amount,
                    "type": recorded.entry.transaction_type,
                    "over_budget": recorded.over_budget,
                })),
        )
        .await;

    ok(recorded)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/entries/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    responses(
        (status = 200, description = "Entry", body = SuccessResponse),
        (status = 404, description = "Unknown entry", body = ErrorResponse)
    )
)]
pub async fn get_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PettyCashEntry> {
    actor(&state, &current).await?;
    ok(state.petty_cash().entry(&id).await?)
}

#[utoipa::path(
    put,
    path = "/api/petty-cash/entries/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    responses(
        (status = 200, description = "Entry updated; a rejected entry returns to pending", body = SuccessResponse),
        (status = 400, description = "Entry is locked", body = ErrorResponse)
    )
)]
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(input): ApiJson<EntryInput>,
) -> ApiResult<RecordedEntry> {
    let actor = actor(&state, &current).await?;
    let recorded = state.petty_cash().update_entry(&actor, &id, &input).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.entry_update", "petty_cash_entry")
                .entity(&id)
                .details(json!({ "amount": recorded.entry.amount })),
        )
        .await;

    ok(recorded)
}

#[utoipa::path(
    delete,
    path = "/api/petty-cash/entries/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    responses(
        (status = 200, description = "Entry deleted", body = SuccessResponse),
        (status = 400, description = "Entry is locked", body = ErrorResponse)
    )
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PettyCashEntry> {
    let actor = actor(&state, &current).await?;
    let entry = state.petty_cash().delete_entry(&actor, &id).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.entry_delete", "petty_cash_entry")
                .entity(&id)
                .details(json!({ "amount": entry.amount, "description": entry.description })),
        )
        .await;

    ok(entry)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/entries/{id}/approve",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    responses(
        (status = 200, description = "Entry approved and locked", body = SuccessResponse),
        (status = 400, description = "Not pending or would overdraw the box", body = ErrorResponse),
        (status = 403, description = "Approver role, limit or own entry", body = ErrorResponse)
    )
)]
pub async fn approve_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PettyCashEntry> {
    let actor = actor(&state, &current).await?;
    let entry = state.petty_cash().approve_entry(&actor, &id).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.entry_approve", "petty_cash_entry")
                .entity(&id)
                .details(json!({ "amount": entry.amount })),
        )
        .await;

    ok(entry)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/entries/{id}/reject",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Entry rejected", body = SuccessResponse),
        (status = 400, description = "Missing reason or entry not pending", body = ErrorResponse)
    )
)]
pub async fn reject_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<RejectRequest>,
) -> ApiResult<PettyCashEntry> {
    let actor = actor(&state, &current).await?;
    let entry = state
        .petty_cash()
        .reject_entry(&actor, &id, &payload.reason)
        .await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.entry_reject", "petty_cash_entry")
                .entity(&id)
                .details(json!({ "reason": payload.reason })),
        )
        .await;

    ok(entry)
}

/// Approve several entries in one transaction. Entries that cannot be
/// approved are reported back instead of failing the batch.
#[utoipa::path(
    post,
    path = "/api/petty-cash/entries/bulk-approve",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    request_body = BulkApproveRequest,
    responses(
        (status = 200, description = "Approved ids and skipped entries with reasons", body = SuccessResponse),
        (status = 403, description = "Approver role required", body = ErrorResponse)
    )
)]
pub async fn bulk_approve(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<BulkApproveRequest>,
) -> ApiResult<BulkApproval> {
    let actor = actor(&state, &current).await?;
    let outcome = state.petty_cash().bulk_approve(&actor, &payload.ids).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.bulk_approve", "petty_cash_entry").details(json!({
                "approved": outcome.approved,
                "skipped": outcome.skipped.len(),
            })),
        )
        .await;

    ok(outcome)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/entries/{id}/receipts",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    responses(
        (status = 200, description = "Receipt files attached to the entry", body = SuccessResponse),
        (status = 404, description = "Unknown entry", body = ErrorResponse)
    )
)]
pub async fn list_entry_receipts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Vec<EntryReceipt>> {
    actor(&state, &current).await?;
    ok(state.petty_cash().receipts(&id).await?)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/entries/{id}/receipts",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Entry public id")),
    responses(
        (status = 200, description = "Receipt metadata stored", body = SuccessResponse),
        (status = 400, description = "Unsupported file type or size", body = ErrorResponse)
    )
)]
pub async fn add_entry_receipt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(input): ApiJson<EntryReceiptInput>,
) -> ApiResult<EntryReceipt> {
    let actor = actor(&state, &current).await?;
    let receipt = state.petty_cash().add_receipt(&actor, &id, &input).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.receipt_upload", "petty_cash_entry")
                .entity(&id)
                .details(json!({ "file_name": receipt.file_name })),
        )
        .await;

    ok(receipt)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/categories",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(CategoryQuery),
    responses((status = 200, description = "Categories", body = SuccessResponse))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> ApiResult<Vec<Category>> {
    actor(&state, &current).await?;
    ok(state.petty_cash().categories(query.include_inactive).await?)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/categories",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Category created", body = SuccessResponse),
        (status = 400, description = "Duplicate name or invalid budget", body = ErrorResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> ApiResult<Category> {
    let actor = actor(&state, &current).await?;
    let category = state.petty_cash().create_category(&actor, &input).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.category_create", "petty_cash_category")
                .entity(category.id)
                .details(json!({ "name": category.name, "budget_limit": category.budget_limit })),
        )
        .await;

    ok(category)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/categories/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = SuccessResponse),
        (status = 404, description = "Unknown category", body = ErrorResponse)
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Category> {
    actor(&state, &current).await?;
    ok(state.petty_cash().category(id).await?)
}

#[utoipa::path(
    put,
    path = "/api/petty-cash/categories/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category updated", body = SuccessResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> ApiResult<Category> {
    let actor = actor(&state, &current).await?;
    let category = state.petty_cash().update_category(&actor, id, &input).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.category_update", "petty_cash_category")
                .entity(id)
                .details(json!({ "name": category.name, "is_active": category.is_active })),
        )
        .await;

    ok(category)
}

/// Unused categories are deleted; ones with entries are deactivated.
#[utoipa::path(
    delete,
    path = "/api/petty-cash/categories/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "deleted or deactivated", body = SuccessResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn remove_category(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<CategoryRemovalResponse> {
    let actor = actor(&state, &current).await?;
    let outcome = state.petty_cash().remove_category(&actor, id).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.category_remove", "petty_cash_category")
                .entity(id)
                .details(json!({ "outcome": outcome })),
        )
        .await;

    ok(CategoryRemovalResponse { id, outcome })
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/reconciliations",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Reconciliations, latest period first", body = SuccessResponse))
)]
pub async fn list_reconciliations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<Reconciliation>> {
    actor(&state, &current).await?;
    ok(state.petty_cash().reconciliations().await?)
}

/// Close a period: approved entries inside it are locked and tied to the
/// reconciliation, and the counted cash is compared with the books.
#[utoipa::path(
    post,
    path = "/api/petty-cash/reconciliations",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "balanced or discrepancy", body = SuccessResponse),
        (status = 400, description = "Overlapping period or pending entries", body = ErrorResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<ReconciliationInput>,
) -> ApiResult<Reconciliation> {
    let actor = actor(&state, &current).await?;
    let reconciliation = state.petty_cash().reconcile(&actor, &input).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.reconcile", "petty_cash_reconciliation")
                .entity(reconciliation.id)
                .details(json!({
                    "period_start": reconciliation.period_start,
                    "period_end": reconciliation.period_end,
                    "difference": reconciliation.difference,
                    "status": reconciliation.status,
                })),
        )
        .await;

    ok(reconciliation)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/replenishments",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(ReplenishmentQuery),
    responses((status = 200, description = "Replenishment requests", body = SuccessResponse))
)]
pub async fn list_replenishments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<ReplenishmentQuery>,
) -> ApiResult<Vec<Replenishment>> {
    actor(&state, &current).await?;
    ok(state.petty_cash().replenishments(query.status).await?)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/replenishments",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Request filed as pending", body = SuccessResponse),
        (status = 400, description = "Invalid amount or reason", body = ErrorResponse)
    )
)]
pub async fn request_replenishment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<ReplenishmentInput>,
) -> ApiResult<Replenishment> {
    let actor = actor(&state, &current).await?;
    let request = state
        .petty_cash()
        .request_replenishment(&actor, &input)
        .await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.replenishment_request", "petty_cash_replenishment")
                .entity(&request.public_id)
                .details(json!({ "amount": request.amount })),
        )
        .await;

    ok(request)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/replenishments/{id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Replenishment public id")),
    responses(
        (status = 200, description = "Replenishment request", body = SuccessResponse),
        (status = 404, description = "Unknown request", body = ErrorResponse)
    )
)]
pub async fn get_replenishment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Replenishment> {
    actor(&state, &current).await?;
    ok(state.petty_cash().replenishment(&id).await?)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/replenishments/{id}/approve",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Replenishment public id")),
    responses(
        (status = 200, description = "Request approved", body = SuccessResponse),
        (status = 400, description = "Request is not pending", body = ErrorResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn approve_replenishment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Replenishment> {
    let actor = actor(&state, &current).await?;
    let request = state.petty_cash().approve_replenishment(&actor, &id).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.replenishment_approve", "petty_cash_replenishment")
                .entity(&id),
        )
        .await;

    ok(request)
}

#[utoipa::path(
    post,
    path = "/api/petty-cash/replenishments/{id}/reject",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Replenishment public id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Request rejected", body = SuccessResponse),
        (status = 400, description = "Missing reason or request not pending", body = ErrorResponse)
    )
)]
pub async fn reject_replenishment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<RejectRequest>,
) -> ApiResult<Replenishment> {
    let actor = actor(&state, &current).await?;
    let request = state
        .petty_cash()
        .reject_replenishment(&actor, &id, &payload.reason)
        .await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.replenishment_reject", "petty_cash_replenishment")
                .entity(&id)
                .details(json!({ "reason": payload.reason })),
        )
        .await;

    ok(request)
}

/// Post the approved amount into the box as an approved credit.
#[utoipa::path(
    post,
    path = "/api/petty-cash/replenishments/{id}/complete",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Replenishment public id")),
    responses(
        (status = 200, description = "Request completed and credit posted", body = SuccessResponse),
        (status = 400, description = "Request is not approved", body = ErrorResponse)
    )
)]
pub async fn complete_replenishment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Replenishment> {
    let actor = actor(&state, &current).await?;
    let request = state.petty_cash().complete_replenishment(&actor, &id).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.replenishment_complete", "petty_cash_replenishment")
                .entity(&id)
                .details(json!({
                    "amount": request.amount,
                    "transaction": request.transaction_public_id,
                })),
        )
        .await;

    ok(request)
}

#[utoipa::path(
    get,
    path = "/api/petty-cash/roles",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Petty cash role assignments", body = SuccessResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<RoleAssignment>> {
    let actor = actor(&state, &current).await?;
    ok(state.petty_cash().role_assignments(&actor).await?)
}

#[utoipa::path(
    put,
    path = "/api/petty-cash/roles/{user_id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("user_id" = String, Path, description = "User public id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = SuccessResponse),
        (status = 403, description = "Manager role required", body = ErrorResponse)
    )
)]
pub async fn assign_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(user_id): ApiPath<String>,
    ApiJson(payload): ApiJson<AssignRoleRequest>,
) -> ApiResult<RoleAssignment> {
    let actor = actor(&state, &current).await?;
    let assignment = state
        .petty_cash()
        .assign_role(&actor, &user_id, payload.role, payload.approval_limit)
        .await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.role_assign", "user")
                .entity(&user_id)
                .details(json!({
                    "role": assignment.role,
                    "approval_limit": assignment.approval_limit,
                })),
        )
        .await;

    ok(assignment)
}

#[utoipa::path(
    delete,
    path = "/api/petty-cash/roles/{user_id}",
    tag = "Petty Cash",
    security(("bearerAuth" = [])),
    params(("user_id" = String, Path, description = "User public id")),
    responses(
        (status = 200, description = "Role removed; the user falls back to viewer", body = SuccessResponse),
        (status = 404, description = "User has no petty cash role", body = ErrorResponse)
    )
)]
pub async fn remove_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<serde_json::Value> {
    let actor = actor(&state, &current).await?;
    state.petty_cash().remove_role(&actor, &user_id).await?;

    state
        .record_activity(
            &current,
            activity(&current, "petty_cash.role_remove", "user").entity(&user_id),
        )
        .await;

    ok(json!({ "removed": true }))
}
