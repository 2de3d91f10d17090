use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Feza Logistics back office API",
        description = "Invoicing, quotations, receipts, petty cash and administration"
    ),
    paths(
        routes::health::health_check,
        routes::auth::login,
        routes::auth::verify_otp,
        routes::auth::resend_otp,
        routes::auth::logout,
        routes::auth::me,
        routes::auth::change_password,
        routes::users::list_users,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::set_user_status,
        routes::users::set_user_roles,
        routes::users::unlock_user,
        routes::users::delete_user,
        routes::roles::list_permissions,
        routes::roles::list_roles,
        routes::roles::create_role,
        routes::roles::get_role,
        routes::roles::update_role,
        routes::roles::delete_role,
        routes::invoices::list_invoices,
        routes::invoices::create_invoice,
        routes::invoices::get_invoice,
        routes::invoices::update_invoice,
        routes::invoices::set_invoice_status,
        routes::invoices::delete_invoice,
        routes::invoices::invoice_receipts,
        routes::invoices::mark_overdue,
        routes::quotations::list_quotations,
        routes::quotations::create_quotation,
        routes::quotations::get_quotation,
        routes::quotations::update_quotation,
        routes::quotations::set_quotation_status,
        routes::quotations::convert_quotation,
        routes::quotations::delete_quotation,
        routes::receipts::list_receipts,
        routes::receipts::create_receipt,
        routes::receipts::get_receipt,
        routes::receipts::delete_receipt,
        routes::documents::verify_document,
        routes::documents::email_document,
        routes::documents::list_email_logs,
        routes::petty_cash::my_role,
        routes::petty_cash::summary,
        routes::petty_cash::list_entries,
        routes::petty_cash::create_entry,
        routes::petty_cash::get_entry,
        routes::petty_cash::update_entry,
        routes::petty_cash::delete_entry,
        routes::petty_cash::approve_entry,
        routes::petty_cash::reject_entry,
        routes::petty_cash::bulk_approve,
        routes::petty_cash::list_entry_receipts,
        routes::petty_cash::add_entry_receipt,
        routes::petty_cash::list_categories,
        routes::petty_cash::create_category,
        routes::petty_cash::get_category,
        routes::petty_cash::update_category,
        routes::petty_cash::remove_category,
        routes::petty_cash::list_reconciliations,
        routes::petty_cash::reconcile,
        routes::petty_cash::list_replenishments,
        routes::petty_cash::request_replenishment,
        routes::petty_cash::get_replenishment,
        routes::petty_cash::approve_replenishment,
        routes::petty_cash::reject_replenishment,
        routes::petty_cash::complete_replenishment,
        routes::petty_cash::list_roles,
        routes::petty_cash::assign_role,
        routes::petty_cash::remove_role,
        routes::activity::list_activity,
        routes::settings::list_settings,
        routes::settings::update_settings,
        routes::assistant::ask,
        routes::assistant::history
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::util::SuccessResponse,
        routes::health::HealthResponse,
        routes::auth::LoginRequest,
        routes::auth::VerifyOtpRequest,
        routes::auth::ResendOtpRequest,
        routes::auth::ChangePasswordRequest,
        routes::auth::SessionResponse,
        routes::auth::OtpChallengeResponse,
        routes::auth::LoginResponse,
        routes::auth::MeResponse,
        routes::auth::PasswordChangedResponse,
        routes::users::UserStatusRequest,
        routes::users::UserRolesRequest,
        routes::invoices::InvoiceStatusRequest,
        routes::quotations::QuotationStatusRequest,
        routes::receipts::ReceiptResponse,
        routes::documents::EmailRequest,
        routes::petty_cash::RejectRequest,
        routes::petty_cash::BulkApproveRequest,
        routes::petty_cash::AssignRoleRequest,
        routes::petty_cash::CategoryRemovalResponse,
        routes::assistant::AskRequest
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Login, second factor and sessions"),
        (name = "Users", description = "Account administration"),
        (name = "Roles", description = "Roles and permissions"),
        (name = "Invoices", description = "Customer invoices"),
        (name = "Quotations", description = "Quotations and conversion to invoices"),
        (name = "Receipts", description = "Recorded payments"),
        (name = "Documents", description = "Document email and public verification"),
        (name = "Petty Cash", description = "Cash box ledger, approvals and reconciliation"),
        (name = "Activity", description = "Audit trail"),
        (name = "Settings", description = "Business settings"),
        (name = "Assistant", description = "Natural-language data questions")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}
