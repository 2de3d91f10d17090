use axum::{extract::State, Extension};
use feza_auth::permissions;
use feza_billing::{DocumentKind, EmailDispatch, VerificationResult};
use feza_database::{EmailLog, NewActivity, Paginated};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiPath, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::{ApiError, AppState};

/// Parameters carried by the link printed on every document
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    /// `invoice`, `quotation` or `receipt`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Public id or document number
    #[serde(default)]
    pub id: String,
    pub hash: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EmailRequest {
    /// Overrides the customer address on file
    pub recipient: Option<String>,
}

/// Public check of a document's authenticity. No authentication.
#[utoipa::path(
    get,
    path = "/api/documents/verify",
    tag = "Documents",
    params(VerifyQuery),
    responses(
        (status = 200, description = "valid, hash_mismatch, not_found or invalid_request", body = SuccessResponse)
    )
)]
pub async fn verify_document(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VerifyQuery>,
) -> ApiResult<VerificationResult> {
    let result = state
        .documents()
        .verify(&query.kind, &query.id, query.hash.as_deref())
        .await?;
    ok(result)
}

#[utoipa::path(
    post,
    path = "/api/documents/{kind}/{id}/email",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(
        ("kind" = String, Path, description = "invoice, quotation or receipt"),
        ("id" = String, Path, description = "Document public id")
    ),
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Document emailed", body = SuccessResponse),
        (status = 400, description = "No recipient address", body = ErrorResponse),
        (status = 404, description = "Unknown document", body = ErrorResponse)
    )
)]
pub async fn email_document(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath((kind, id)): ApiPath<(String, String)>,
    payload: Option<ApiJson<EmailRequest>>,
) -> ApiResult<EmailDispatch> {
    let kind: DocumentKind = kind.parse().map_err(ApiError::bad_request)?;
    current.require(permissions::DOCUMENTS_SEND)?;
    current.require(match kind {
        DocumentKind::Invoice => permissions::INVOICES_VIEW,
        DocumentKind::Quotation => permissions::QUOTATIONS_VIEW,
        DocumentKind::Receipt => permissions::RECEIPTS_VIEW,
    })?;

    let recipient = payload.and_then(|ApiJson(request)| request.recipient);
    let dispatch = state
        .documents()
        .email(kind, &id, recipient.as_deref(), Some(current.id()))
        .await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "document.email", kind.as_str())
                .entity(&dispatch.document_number)
                .details(json!({ "recipient": dispatch.recipient })),
        )
        .await;

    ok(dispatch)
}

#[utoipa::path(
    get,
    path = "/api/documents/emails",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Outbound email log, newest first", body = SuccessResponse),
        (status = 403, description = "Missing documents.send", body = ErrorResponse)
    )
)]
pub async fn list_email_logs(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<EmailLog>> {
    current.require(permissions::DOCUMENTS_SEND)?;
    ok(state.email_logs().list(page.page()).await?)
}
