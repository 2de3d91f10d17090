use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use feza_auth::{LockoutPolicy, NewAccount, UserAdmin};
use feza_config::{AppConfig, DatabaseConfig};
use feza_database::initialize_database;
use feza_gateway::{build_router, AppState};
use feza_mailer::OutboxMailer;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

const ADMIN_PASSWORD: &str = "Sup3rSecret!";

struct TestContext {
    temp_dir: TempDir,
    pool: SqlitePool,
    config: AppConfig,
    router: Router,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let mut config = AppConfig::default();
        config.auth.otp.enabled = false;
        Self::with_config(config).await
    }

    async fn with_config(mut config: AppConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("gateway.db").display()),
            max_connections: 5,
        };
        // Nothing listens here; assistant calls fail fast.
        config.assistant.base_url = "http://127.0.0.1:9".into();
        config.assistant.max_attempts = 1;
        config.assistant.retry_delay_ms = 0;

        let pool = initialize_database(&config.database).await?;
        let mailer = Arc::new(OutboxMailer::new(temp_dir.path().join("outbox")));
        let state = AppState::new(pool.clone(), &config, mailer)?;

        Ok(Self {
            temp_dir,
            pool,
            router: build_router(state),
            config,
        })
    }

    async fn create_user(&self, username: &str, roles: &[&str]) -> TestResult<String> {
        let admin = UserAdmin::new(
            self.pool.clone(),
            LockoutPolicy::from_config(&self.config.auth.lockout),
        );
        let details = admin
            .create(NewAccount {
                username: username.to_string(),
                email: format!("{username}@fezalogistics.com"),
                password: ADMIN_PASSWORD.to_string(),
                first_name: Some(username.to_string()),
                last_name: None,
                phone: None,
                roles: roles.iter().map(|role| role.to_string()).collect(),
            })
            .await?;
        Ok(details.user.public_id)
    }

    async fn login(&self, username: &str) -> TestResult<String> {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "identifier": username, "password": ADMIN_PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        let token = body["data"]["session"]["token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("no token in {body}"))?;
        Ok(token.to_string())
    }

    async fn admin_token(&self) -> TestResult<String> {
        self.create_user("admin", &["admin"]).await?;
        self.login("admin").await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }
}

fn invoice_payload() -> Value {
    json!({
        "customer_name": "Kigali Freight Ltd",
        "customer_email": "accounts@kigalifreight.rw",
        "issue_date": "2026-03-01",
        "due_date": "2026-03-31",
        "currency": "RWF",
        "tax_rate": 18.0,
        "items": [
            { "description": "Container haulage", "quantity": 2.0, "unit_price": 150000.0 },
            { "description": "Customs clearance", "quantity": 1.0, "unit_price": 40000.0 }
        ]
    })
}

#[tokio::test]
async fn health_reports_database_inside_the_envelope() -> TestResult {
    let ctx = TestContext::new().await?;

    let (status, body) = ctx.send(Method::GET, "/health", None, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "up");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> TestResult {
    let ctx = TestContext::new().await?;

    let (status, body) = ctx.send(Method::GET, "/api/invoices", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, _) = ctx
        .send(Method::GET, "/api/invoices", Some("not-a-real-token"), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_returns_a_session_usable_for_me() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (status, body) = ctx.send(Method::GET, "/api/auth/me", Some(&token), None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "admin");
    assert_eq!(body["data"]["access"]["is_admin"], true);
    assert!(body["data"]["user"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn logout_revokes_the_token() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (status, _) = ctx
        .send(Method::POST, "/api/auth/logout", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn repeated_failures_lock_the_account() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.create_user("cashier", &["accountant"]).await?;

    for _ in 0..3 {
        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "identifier": "cashier", "password": "wrong-pass1" })),
            )
            .await?;
        assert_ne!(status, StatusCode::OK, "unexpected success: {body}");
    }

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "identifier": "cashier", "password": ADMIN_PASSWORD })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let attempts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM activity_logs WHERE action = 'auth.login_failed'",
    )
    .fetch_one(&ctx.pool)
    .await?;
    assert!(attempts >= 2);
    Ok(())
}

#[tokio::test]
async fn otp_login_issues_a_challenge_instead_of_a_session() -> TestResult {
    let ctx = TestContext::with_config(AppConfig::default()).await?;
    ctx.create_user("admin", &["admin"]).await?;

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "identifier": "admin", "password": ADMIN_PASSWORD })),
        )
        .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["otp_required"], true);
    assert!(body["data"].get("session").is_none());
    assert!(body["data"]["challenge"]["user_id"].is_string());

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({
                "user_id": body["data"]["challenge"]["user_id"],
                "code": "000000x"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let outbox = ctx.temp_dir.path().join("outbox");
    assert!(std::fs::read_dir(outbox)?.count() >= 1);
    Ok(())
}

#[tokio::test]
async fn invoices_compute_tax_and_settle_through_receipts() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (status, body) = ctx
        .send(Method::POST, "/api/invoices", Some(&token), Some(invoice_payload()))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let invoice = &body["data"];
    assert_eq!(invoice["subtotal"].as_f64(), Some(340000.0));
    assert_eq!(invoice["tax_amount"].as_f64(), Some(61200.0));
    assert_eq!(invoice["total"].as_f64(), Some(401200.0));
    assert_eq!(invoice["items"].as_array().map(Vec::len), Some(2));
    let invoice_id = invoice["public_id"].as_str().unwrap_or_default().to_string();

    let (status, body) = ctx
        .send(
            Method::PUT,
            &format!("/api/invoices/{invoice_id}/status"),
            Some(&token),
            Some(json!({ "status": "sent" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/receipts",
            Some(&token),
            Some(json!({
                "invoice_id": invoice_id,
                "amount": 401200.0,
                "payment_method": "mobile_money",
                "payment_date": "2026-03-10"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["verification_url"]
        .as_str()
        .is_some_and(|url| url.contains("type=receipt")));

    let (_, body) = ctx
        .send(Method::GET, &format!("/api/invoices/{invoice_id}"), Some(&token), None)
        .await?;
    assert_eq!(body["data"]["status"], "paid");
    assert_eq!(body["data"]["amount_paid"].as_f64(), Some(401200.0));

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/receipts",
            Some(&token),
            Some(json!({
                "invoice_id": invoice_id,
                "amount": 10.0,
                "payment_method": "cash"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    Ok(())
}

#[tokio::test]
async fn issued_documents_verify_publicly() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (_, body) = ctx
        .send(Method::POST, "/api/invoices", Some(&token), Some(invoice_payload()))
        .await?;
    let number = body["data"]["invoice_number"].as_str().unwrap_or_default().to_string();
    let hash = body["data"]["verification_hash"].as_str().unwrap_or_default().to_string();

    let (status, body) = ctx
        .send(
            Method::GET,
            &format!("/api/documents/verify?type=invoice&id={number}&hash={hash}"),
            None,
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "valid");
    assert_eq!(body["data"]["document"]["number"], number.as_str());

    let (_, body) = ctx
        .send(
            Method::GET,
            &format!("/api/documents/verify?type=invoice&id={number}&hash=deadbeef"),
            None,
            None,
        )
        .await?;
    assert_eq!(body["data"]["status"], "hash_mismatch");

    for uri in ["/api/documents/verify?type=invoice", "/api/documents/verify"] {
        let (status, body) = ctx.send(Method::GET, uri, None, None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["data"]["status"], "invalid_request", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn emailing_an_invoice_writes_to_the_outbox_and_log() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (_, body) = ctx
        .send(Method::POST, "/api/invoices", Some(&token), Some(invoice_payload()))
        .await?;
    let invoice_id = body["data"]["public_id"].as_str().unwrap_or_default().to_string();

    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("/api/documents/invoice/{invoice_id}/email"),
            Some(&token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["recipient"], "accounts@kigalifreight.rw");

    let (status, body) = ctx
        .send(Method::GET, "/api/documents/emails", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn viewers_cannot_create_invoices() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.create_user("auditor", &["viewer"]).await?;
    let token = ctx.login("auditor").await?;

    let (status, _) = ctx.send(Method::GET, "/api/invoices", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .send(Method::POST, "/api/invoices", Some(&token), Some(invoice_payload()))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = ctx.send(Method::GET, "/api/activity", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn petty_cash_entries_need_a_second_approver() -> TestResult {
    let ctx = TestContext::new().await?;
    let admin = ctx.admin_token().await?;
    let approver_id = ctx.create_user("approver", &["accountant"]).await?;

    let (status, body) = ctx
        .send(
            Method::PUT,
            &format!("/api/petty-cash/roles/{approver_id}"),
            Some(&admin),
            Some(json!({ "role": "approver", "approval_limit": 100000.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/petty-cash/entries",
            Some(&admin),
            Some(json!({
                "transaction_date": "2026-03-02",
                "description": "Float top-up",
                "amount": 80000.0,
                "transaction_type": "credit"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["approval_status"], "pending");
    let entry_id = body["data"]["public_id"].as_str().unwrap_or_default().to_string();

    let (status, _) = ctx
        .send(
            Method::POST,
            &format!("/api/petty-cash/entries/{entry_id}/approve"),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let approver = ctx.login("approver").await?;
    let (status, body) = ctx
        .send(
            Method::POST,
            &format!("/api/petty-cash/entries/{entry_id}/approve"),
            Some(&approver),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["approval_status"], "approved");

    let (status, body) = ctx
        .send(Method::GET, "/api/petty-cash/summary", Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"].as_f64(), Some(80000.0));
    Ok(())
}

#[tokio::test]
async fn settings_accept_known_keys_only() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (status, body) = ctx
        .send(
            Method::PUT,
            "/api/settings",
            Some(&token),
            Some(json!({ "default_tax_rate": 16, "default_currency": "usd" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = ctx.send(Method::GET, "/api/settings", Some(&token), None).await?;
    let settings = body["data"].as_array().cloned().unwrap_or_default();
    let value_of = |key: &str| {
        settings
            .iter()
            .find(|setting| setting["key"] == key)
            .map(|setting| setting["value"].clone())
    };
    assert_eq!(value_of("default_currency"), Some(json!("USD")));
    assert_eq!(value_of("default_tax_rate"), Some(json!("16")));

    let (status, _) = ctx
        .send(
            Method::PUT,
            "/api/settings",
            Some(&token),
            Some(json!({ "smtp_password": "hunter2" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unreachable_model_surfaces_as_bad_gateway() -> TestResult {
    let ctx = TestContext::new().await?;
    let token = ctx.admin_token().await?;

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/assistant/query",
            Some(&token),
            Some(json!({ "question": "How many invoices are overdue?" })),
        )
        .await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_methods_use_the_envelope() -> TestResult {
    let ctx = TestContext::new().await?;

    let (status, body) = ctx.send(Method::GET, "/api/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = ctx.send(Method::DELETE, "/health", None, None).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn openapi_document_lists_the_routes() -> TestResult {
    let ctx = TestContext::new().await?;

    let (status, body) = ctx
        .send(Method::GET, "/api-docs/openapi.json", None, None)
        .await?;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/invoices").is_some());
    assert!(body["paths"].get("/api/petty-cash/entries").is_some());
    assert!(body["components"]["securitySchemes"].get("bearerAuth").is_some());
    Ok(())
}
