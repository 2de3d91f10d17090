use std::collections::BTreeMap;

use axum::{extract::State, Extension};
use feza_auth::permissions;
use feza_database::{NewActivity, Setting};
use serde_json::{json, Value};

use crate::error::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::util::{ok, ApiJson, ApiResult, SuccessResponse};
use crate::{ApiError, AppState};

const TEXT_SETTINGS: &[&str] = &["company_name", "company_email", "default_currency"];
const NUMERIC_SETTINGS: &[&str] = &["default_tax_rate", "petty_cash_low_balance"];

/// Check a settings update and turn it into stored string values.
fn normalize(update: BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::bad_request("no settings supplied"));
    }

    let mut values = BTreeMap::new();
    for (key, value) in update {
        let stored = if TEXT_SETTINGS.contains(&key.as_str()) {
            match value {
                Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ => return Err(ApiError::bad_request(format!("{key} must be a non-empty string"))),
            }
        } else if NUMERIC_SETTINGS.contains(&key.as_str()) {
            let number = match &value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            match number {
                Some(number) if number.is_finite() && number >= 0.0 => number.to_string(),
                _ => return Err(ApiError::bad_request(format!("{key} must be a non-negative number"))),
            }
        } else {
            return Err(ApiError::bad_request(format!("unknown setting {key}")));
        };

        if key == "default_currency" {
            values.insert(key, stored.to_uppercase());
        } else {
            values.insert(key, stored);
        }
    }

    if let Some(rate) = values
        .get("default_tax_rate")
        .and_then(|rate| rate.parse::<f64>().ok())
    {
        if rate > 100.0 {
            return Err(ApiError::bad_request("default_tax_rate must be at most 100"));
        }
    }

    Ok(values)
}

#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "Settings",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Business settings", body = SuccessResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse)
    )
)]
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Vec<Setting>> {
    ok(state.settings().all().await?)
}

#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "Settings",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Settings saved", body = SuccessResponse),
        (status = 400, description = "Unknown key or invalid value", body = ErrorResponse),
        (status = 403, description = "Missing settings.manage", body = ErrorResponse)
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(update): ApiJson<BTreeMap<String, Value>>,
) -> ApiResult<Vec<Setting>> {
    current.require(permissions::SETTINGS_MANAGE)?;
    let values = normalize(update)?;
    state
        .settings()
        .set_many(&values, Some(current.id()))
        .await?;

    state
        .record_activity(
            &current,
            NewActivity::new(Some(current.id()), "settings.update", "settings")
                .details(json!(values)),
        )
        .await;

    ok(state.settings().all().await?)
}
