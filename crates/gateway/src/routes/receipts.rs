use axum::{extract::State, Extension};
use feza_auth::permissions;
use feza_billing::{PaymentMethod, Receipt, ReceiptFilter, ReceiptInput};
use feza_database::{NewActivity, Paginated};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReceiptListQuery {
    #[param(value_type = Option<String>, example = "mobile_money")]
    pub payment_method: Option<PaymentMethod>,
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub from: Option<chrono::NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<chrono::NaiveDate>,
}

/// A receipt together with the link printed on it
#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub receipt: Receipt,
    pub verification_url: String,
}

#[utoipa::path(
    get,
    path = "/api/receipts",
    tag = "Receipts",
    security(("bearerAuth" = [])),
    params(ReceiptListQuery, PageQuery),
    responses(
        (status = 200, description = "Receipts page", body = SuccessResponse),
        (status = 403, description = "Missing receipts.view", body = ErrorResponse)
    )
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<ReceiptListQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<Receipt>> {
    current.require(permissions::RECEIPTS_VIEW)?;
    let filter = ReceiptFilter {
        payment_method: query.payment_method,
        search: query.search,
        from: query.from,
        to: query.to,
    };
    ok(state.receipts().list(&filter, page.page()).await?)
}

/// Record a payment; a linked invoice moves to partially paid or paid.
#[utoipa::path(
    post,
    path = "/api/receipts",
    tag = "Receipts",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Receipt recorded", body = SuccessResponse),
        (status = 400, description = "Amount exceeds the balance due or invoice not payable", body = ErrorResponse)
    )
)]
pub async fn create_receipt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(input): ApiJson<ReceiptInput>,
) -> ApiResult<ReceiptResponse> {
    current.require(permissions::RECEIPTS_CREATE)?;
    let receipt = state.receipts().create(&input, Some(current.id())).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "receipt.create", "receipt")
                .entity(&receipt.receipt_number)
                .details(json!({
                    "invoice": receipt.invoice_number,
                    "amount": receipt.amount,
                    "payment_method": receipt.payment_method,
                })),
        )
        .await;

    let verification_url = state.receipts().verification_url(&receipt);
    ok(ReceiptResponse {
        receipt,
        verification_url,
    })
}

#[utoipa::path(
    get,
    path = "/api/receipts/{id}",
    tag = "Receipts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Receipt public id")),
    responses(
        (status = 200, description = "Receipt", body = SuccessResponse),
        (status = 404, description = "Unknown receipt", body = ErrorResponse)
    )
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<ReceiptResponse> {
    current.require(permissions::RECEIPTS_VIEW)?;
    let receipt = state.receipts().get(&id).await?;
    let verification_url = state.receipts().verification_url(&receipt);
    ok(ReceiptResponse {
        receipt,
        verification_url,
    })
}

#[utoipa::path(
    delete,
    path = "/api/receipts/{id}",
    tag = "Receipts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Receipt public id")),
    responses(
        (status = 200, description = "Receipt deleted and invoice balance restored", body = SuccessResponse),
        (status = 404, description = "Unknown receipt", body = ErrorResponse)
    )
)]
pub async fn delete_receipt(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Receipt> {
    current.require(permissions::RECEIPTS_DELETE)?;
    let receipt = state.receipts().delete(&id).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "receipt.delete", "receipt")
                .entity(&receipt.receipt_number)
                .details(json!({ "amount": receipt.amount, "invoice": receipt.invoice_number })),
        )
        .await;

    ok(receipt)
}
