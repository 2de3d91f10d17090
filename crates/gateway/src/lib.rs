//! HTTP surface of the Feza back office.
//!
//! Every response uses the envelope `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`. Routes under `/api` other than
//! login, OTP and document verification require a bearer session token.

mod docs;
mod error;
mod middleware;
mod state;
mod util;

pub mod routes;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use middleware::CurrentUser;
pub use state::AppState;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware::{from_fn, from_fn_with_state, map_response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_document))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify-otp", post(routes::auth::verify_otp))
        .route("/api/auth/resend-otp", post(routes::auth::resend_otp))
        .route(
            "/api/documents/verify",
            get(routes::documents::verify_document),
        );

    let protected = Router::new()
        // Session
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/me", get(routes::auth::me))
        .route(
            "/api/auth/change-password",
            post(routes::auth::change_password),
        )
        // Users and roles
        .route(
            "/api/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/api/users/:id/status", put(routes::users::set_user_status))
        .route("/api/users/:id/roles", put(routes::users::set_user_roles))
        .route("/api/users/:id/unlock", post(routes::users::unlock_user))
        .route("/api/permissions", get(routes::roles::list_permissions))
        .route(
            "/api/roles",
            get(routes::roles::list_roles).post(routes::roles::create_role),
        )
        .route(
            "/api/roles/:id",
            get(routes::roles::get_role)
                .put(routes::roles::update_role)
                .delete(routes::roles::delete_role),
        )
        // Invoices
        .route(
            "/api/invoices",
            get(routes::invoices::list_invoices).post(routes::invoices::create_invoice),
        )
        .route(
            "/api/invoices/mark-overdue",
            post(routes::invoices::mark_overdue),
        )
        .route(
            "/api/invoices/:id",
            get(routes::invoices::get_invoice)
                .put(routes::invoices::update_invoice)
                .delete(routes::invoices::delete_invoice),
        )
        .route(
            "/api/invoices/:id/status",
            put(routes::invoices::set_invoice_status),
        )
        .route(
            "/api/invoices/:id/receipts",
            get(routes::invoices::invoice_receipts),
        )
        // Quotations
        .route(
            "/api/quotations",
            get(routes::quotations::list_quotations).post(routes::quotations::create_quotation),
        )
        .route(
            "/api/quotations/:id",
            get(routes::quotations::get_quotation)
                .put(routes::quotations::update_quotation)
                .delete(routes::quotations::delete_quotation),
        )
        .route(
            "/api/quotations/:id/status",
            put(routes::quotations::set_quotation_status),
        )
        .route(
            "/api/quotations/:id/convert",
            post(routes::quotations::convert_quotation),
        )
        // Receipts and documents
        .route(
            "/api/receipts",
            get(routes::receipts::list_receipts).post(routes::receipts::create_receipt),
        )
        .route(
            "/api/receipts/:id",
            get(routes::receipts::get_receipt).delete(routes::receipts::delete_receipt),
        )
        .route(
            "/api/documents/emails",
            get(routes::documents::list_email_logs),
        )
        .route(
            "/api/documents/:kind/:id/email",
            post(routes::documents::email_document),
        )
        // Petty cash
        .route("/api/petty-cash/me", get(routes::petty_cash::my_role))
        .route("/api/petty-cash/summary", get(routes::petty_cash::summary))
        .route(
            "/api/petty-cash/entries",
            get(routes::petty_cash::list_entries).post(routes::petty_cash::create_entry),
        )
        .route(
            "/api/petty-cash/entries/bulk-approve",
            post(routes::petty_cash::bulk_approve),
        )
        .route(
            "/api/petty-cash/entries/:id",
            get(routes::petty_cash::get_entry)
                .put(routes::petty_cash::update_entry)
                .delete(routes::petty_cash::delete_entry),
        )
        .route(
            "/api/petty-cash/entries/:id/approve",
            post(routes::petty_cash::approve_entry),
        )
        .route(
            "/api/petty-cash/entries/:id/reject",
            post(routes::petty_cash::reject_entry),
        )
        .route(
            "/api/petty-cash/entries/:id/receipts",
            get(routes::petty_cash::list_entry_receipts)
                .post(routes::petty_cash::add_entry_receipt),
        )
        .route(
            "/api/petty-cash/categories",
            get(routes::petty_cash::list_categories).post(routes::petty_cash::create_category),
        )
        .route(
            "/api/petty-cash/categories/:id",
            get(routes::petty_cash::get_category)
                .put(routes::petty_cash::update_category)
                .delete(routes::petty_cash::remove_category),
        )
        .route(
            "/api/petty-cash/reconciliations",
            get(routes::petty_cash::list_reconciliations).post(routes::petty_cash::reconcile),
        )
        .route(
            "/api/petty-cash/replenishments",
            get(routes::petty_cash::list_replenishments)
                .post(routes::petty_cash::request_replenishment),
        )
        .route(
            "/api/petty-cash/replenishments/:id",
            get(routes::petty_cash::get_replenishment),
        )
        .route(
            "/api/petty-cash/replenishments/:id/approve",
            post(routes::petty_cash::approve_replenishment),
        )
        .route(
            "/api/petty-cash/replenishments/:id/reject",
            post(routes::petty_cash::reject_replenishment),
        )
        .route(
            "/api/petty-cash/replenishments/:id/complete",
            post(routes::petty_cash::complete_replenishment),
        )
        .route("/api/petty-cash/roles", get(routes::petty_cash::list_roles))
        .route(
            "/api/petty-cash/roles/:user_id",
            put(routes::petty_cash::assign_role).delete(routes::petty_cash::remove_role),
        )
        // Administration
        .route("/api/activity", get(routes::activity::list_activity))
        .route(
            "/api/settings",
            get(routes::settings::list_settings).put(routes::settings::update_settings),
        )
        .route("/api/assistant/query", post(routes::assistant::ask))
        .route("/api/assistant/history", get(routes::assistant::history))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    public
        .merge(protected)
        .fallback(route_not_found)
        .with_state(state)
        .layer(map_response(middleware::envelope_method_not_allowed))
        .layer(from_fn(middleware::logging_middleware))
        .layer(cors_layer())
}

async fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("route not found")
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
