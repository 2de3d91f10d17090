use axum::{extract::State, Extension};
use feza_assistant::{AssistantReply, ChatLog};
use feza_auth::permissions;
use feza_database::{NewActivity, Paginated};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiQuery, ApiResult, PageQuery, SuccessResponse};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AskRequest {
    pub question: String,
}

/// Ask a question about the business data. Generated SQL that is not a
/// single read-only statement comes back with status `blocked`.
#[utoipa::path(
    post,
    path = "/api/assistant/query",
    tag = "Assistant",
    security(("bearerAuth" = [])),
    request_body = AskRequest,
    responses(
        (status = 200, description = "answered, executed or blocked", body = SuccessResponse),
        (status = 400, description = "Empty question or failing query", body = ErrorResponse),
        (status = 502, description = "Model server unavailable", body = ErrorResponse)
    )
)]
pub async fn ask(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<AskRequest>,
) -> ApiResult<AssistantReply> {
    current.require(permissions::ASSISTANT_USE)?;
    let reply = state.assistant().ask(current.id(), &payload.question).await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "assistant.query", "assistant").details(json!({
                "status": reply.status,
                "rows": reply.result.as_ref().map(|result| result.rows.len()),
            })),
        )
        .await;

    ok(reply)
}

#[utoipa::path(
    get,
    path = "/api/assistant/history",
    tag = "Assistant",
    security(("bearerAuth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "The caller's past questions, newest first", body = SuccessResponse),
        (status = 403, description = "Missing assistant.use", body = ErrorResponse)
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<ChatLog>> {
    current.require(permissions::ASSISTANT_USE)?;
    ok(state.assistant().history(current.id(), page.page()).await?)
}
