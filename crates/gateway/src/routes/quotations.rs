use axum::{extract::State, Extension};
use feza_auth::permissions;
use feza_billing::{
    InvoiceDocument, Quotation, QuotationDocument, QuotationFilter, QuotationInput,
    QuotationStatus,
};
use feza_database::{NewActivity, Paginated};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuotationListQuery {
    #[param(value_type = Option<String>, example = "accepted")]
    pub status: Option<QuotationStatus>,
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub from: Option<chrono::NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuotationStatusRequest {
    #[schema(value_type = String, example = "accepted")]
    pub status: QuotationStatus,
}

#[utoipa::path(
    get,
    path = "/api/quotations",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    params(QuotationListQuery, PageQuery),
    responses(
        (status = 200, description = "Quotations page", body = SuccessResponse),
        (status = 403, description = "Missing quotations.view", body = ErrorResponse)
    )
)]
pub async fn list_quotations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<QuotationListQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<Quotation>> {
    current.require(permissions::QUOTATIONS_VIEW)?;
    let filter = QuotationFilter {
        status: query.status,
        search: query.search,
        from: query.from,
        to: query.to,
    };
    ok(state.quotations().list(&filter, page.page()).await?)
}

#[utoipa::path(
    post,
    path = "/api/quotations",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Quotation created", body = SuccessResponse),
        (status = 400, description = "Invalid customer, dates or items", body = ErrorResponse)
    )
)]
pub async fn create_quotation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<QuotationInput>,
) -> ApiResult<QuotationDocument> {
    current.require(permissions::QUOTATIONS_CREATE)?;
    let document = state.quotations().create(&input, Some(current.id())).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "quotation.create", "quotation")
                .entity(&document.quotation.quotation_number)
                .details(json!({
                    "customer": document.quotation.customer_name,
                    "total": document.quotation.total,
                })),
        )
        .await;

    ok(document)
}

#[utoipa::path(
    get,
    path = "/api/quotations/{id}",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Quotation public id")),
    responses(
        (status = 200, description = "Quotation with line items", body = SuccessResponse),
        (status = 404, description = "Unknown quotation", body = ErrorResponse)
    )
)]
pub async fn get_quotation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<QuotationDocument> {
    current.require(permissions::QUOTATIONS_VIEW)?;
    ok(state.quotations().get(&id).await?)
}

#[utoipa::path(
    put,
    path = "/api/quotations/{id}",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Quotation public id")),
    responses(
        (status = 200, description = "Quotation replaced", body = SuccessResponse),
        (status = 400, description = "Converted quotations are read-only", body = ErrorResponse)
    )
)]
pub async fn update_quotation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(input): ApiJson<QuotationInput>,
) -> ApiResult<QuotationDocument> {
    current.require(permissions::QUOTATIONS_EDIT)?;
    let document = state.quotations().update(&id, &input).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "quotation.update", "quotation")
                .entity(&document.quotation.quotation_number),
        )
        .await;

    ok(document)
}

#[utoipa::path(
    put,
    path = "/api/quotations/{id}/status",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Quotation public id")),
    request_body = QuotationStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SuccessResponse),
        (status = 400, description = "Transition not allowed", body = ErrorResponse)
    )
)]
pub async fn set_quotation_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<QuotationStatusRequest>,
) -> ApiResult<QuotationDocument> {
    current.require(permissions::QUOTATIONS_EDIT)?;
    let document = state.quotations().set_status(&id, payload.status).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "quotation.status", "quotation")
                .entity(&document.quotation.quotation_number)
                .details(json!({ "status": payload.status })),
        )
        .await;

    ok(document)
}

/// Turn a sent or accepted quotation into a draft invoice.
#[utoipa::path(
    post,
    path = "/api/quotations/{id}/convert",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Quotation public id")),
    responses(
        (status = 200, description = "The new invoice", body = SuccessResponse),
        (status = 400, description = "Quotation is not convertible", body = ErrorResponse)
    )
)]
pub async fn convert_quotation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<InvoiceDocument> {
    current.require(permissions::QUOTATIONS_EDIT)?;
    current.require(permissions::INVOICES_CREATE)?;
    let invoice = state.quotations().convert(&id, Some(current.id())).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "quotation.convert", "quotation")
                .entity(&id)
                .details(json!({ "invoice": invoice.invoice.invoice_number })),
        )
        .await;

    ok(invoice)
}

#[utoipa::path(
    delete,
    path = "/api/quotations/{id}",
    tag = "Quotations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Quotation public id")),
    responses(
        (status = 200, description = "Quotation deleted", body = SuccessResponse),
        (status = 400, description = "Converted quotations cannot be deleted", body = ErrorResponse)
    )
)]
pub async fn delete_quotation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Quotation> {
    current.require(permissions::QUOTATIONS_DELETE)?;
    let quotation = state.quotations().delete(&id).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "quotation.delete", "quotation")
                .entity(&quotation.quotation_number),
        )
        .await;

    ok(quotation)
}
