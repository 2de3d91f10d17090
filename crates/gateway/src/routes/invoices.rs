use axum::{extract::State, Extension};
use chrono::Utc;
use feza_auth::permissions;
use feza_billing::{Invoice, InvoiceDocument, InvoiceFilter, InvoiceInput, InvoiceStatus, Receipt};
use feza_database::{NewActivity, Paginated};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::AppState;

/// Query string accepted by the invoice list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InvoiceListQuery {
    #[param(value_type = Option<String>, example = "sent")]
    pub status: Option<InvoiceStatus>,
    pub search: Option<String>,
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub from: Option<chrono::NaiveDate>,
    #[param(value_type = Option<String>, example = "2026-12-31")]
    pub to: Option<chrono::NaiveDate>,
}

impl From<InvoiceListQuery> for InvoiceFilter {
    fn from(query: InvoiceListQuery) -> Self {
        InvoiceFilter {
            status: query.status,
            search: query.search,
            from: query.from,
            to: query.to,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvoiceStatusRequest {
    #[schema(value_type = String, example = "sent")]
    pub status: InvoiceStatus,
}

#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(InvoiceListQuery, PageQuery),
    responses(
        (status = 200, description = "Invoices page, newest first", body = SuccessResponse),
        (status = 403, description = "Missing invoices.view", body = ErrorResponse)
    )
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<InvoiceListQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<Invoice>> {
    current.require(permissions::INVOICES_VIEW)?;
    let filter = InvoiceFilter::from(query);
    ok(state.invoices().list(&filter, page.page()).await?)
}

#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Invoice created with computed totals", body = SuccessResponse),
        (status = 400, description = "Invalid customer, dates or items", body = ErrorResponse)
    )
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<InvoiceInput>,
) -> ApiResult<InvoiceDocument> {
    current.require(permissions::INVOICES_CREATE)?;
    let document = state.invoices().create(&input, Some(current.id())).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "invoice.create", "invoice")
                .entity(&document.invoice.invoice_number)
                .details(json!({
                    "customer": document.invoice.customer_name,
                    "total": document.invoice.total,
                    "currency": document.invoice.currency,
                })),
        )
        .await;

    ok(document)
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Invoice public id")),
    responses(
        (status = 200, description = "Invoice with line items", body = SuccessResponse),
        (status = 404, description = "Unknown invoice", body = ErrorResponse)
    )
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<InvoiceDocument> {
    current.require(permissions::INVOICES_VIEW)?;
    ok(state.invoices().get(&id).await?)
}

#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Invoice public id")),
    responses(
        (status = 200, description = "Invoice replaced and totals recomputed", body = SuccessResponse),
        (status = 400, description = "Paid or cancelled invoices cannot change", body = ErrorResponse)
    )
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(input): ApiJson<InvoiceInput>,
) -> ApiResult<InvoiceDocument> {
    current.require(permissions::INVOICES_EDIT)?;
    let document = state.invoices().update(&id, &input).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "invoice.update", "invoice")
                .entity(&document.invoice.invoice_number)
                .details(json!({ "total": document.invoice.total })),
        )
        .await;

    ok(document)
}

#[utoipa::path(
    put,
    path = "/api/invoices/{id}/status",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Invoice public id")),
    request_body = InvoiceStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SuccessResponse),
        (status = 400, description = "Transition not allowed", body = ErrorResponse)
    )
)]
pub async fn set_invoice_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<InvoiceStatusRequest>,
) -> ApiResult<InvoiceDocument> {
    current.require(permissions::INVOICES_EDIT)?;
    let document = state.invoices().set_status(&id, payload.status).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "invoice.status", "invoice")
                .entity(&document.invoice.invoice_number)
                .details(json!({ "status": payload.status })),
        )
        .await;

    ok(document)
}

#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Invoice public id")),
    responses(
        (status = 200, description = "Invoice deleted", body = SuccessResponse),
        (status = 400, description = "Invoice has payments", body = ErrorResponse)
    )
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Invoice> {
    current.require(permissions::INVOICES_DELETE)?;
    let invoice = state.invoices().delete(&id).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "invoice.delete", "invoice")
                .entity(&invoice.invoice_number),
        )
        .await;

    ok(invoice)
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}/receipts",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Invoice public id")),
    responses(
        (status = 200, description = "Payments recorded against the invoice", body = SuccessResponse),
        (status = 404, description = "Unknown invoice", body = ErrorResponse)
    )
)]
pub async fn invoice_receipts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Vec<Receipt>> {
    current.require(permissions::RECEIPTS_VIEW)?;
    ok(state.invoices().receipts(&id).await?)
}

/// Flag every unpaid invoice past its due date.
#[utoipa::path(
    post,
    path = "/api/invoices/mark-overdue",
    tag = "Invoices",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Number of invoices flagged", body = SuccessResponse),
        (status = 403, description = "Missing invoices.edit", body = ErrorResponse)
    )
)]
pub async fn mark_overdue(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<serde_json::Value> {
    current.require(permissions::INVOICES_EDIT)?;
    let updated = state
        .invoices()
        .mark_overdue(Utc::now().date_naive())
        .await?;
    ok(json!({ "updated": updated }))
}
