use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use feza_billing::{
    InvoiceInput, InvoiceService, InvoiceStatus, QuotationInput, QuotationService, QuotationStatus,
};
use feza_config::AppConfig;
use feza_runtime::{BackendServices, MaintenanceReport};
use serde_json::json;
use tempfile::TempDir;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = 2;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_creates_the_directory_and_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let config = build_config(sqlite_url(&db_dir.join("feza.db")));

    assert!(!db_dir.exists());
    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");

    let roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = 'admin'")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(roles, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_reports_unusable_database_urls() -> Result<()> {
    let config = build_config("postgres://localhost/feza".into());

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected a non-sqlite url to be refused"),
        Err(error) => error,
    };
    assert!(format!("{error:?}").contains("failed to initialise database"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_on_an_empty_database_changes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("empty.db")));
    let services = initialise(&config).await?;

    let report = services
        .maintenance(&config)
        .run_once(NaiveDate::from_ymd_opt(2026, 6, 1).context("date")?)
        .await;

    assert_eq!(report, MaintenanceReport::default());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_flags_sent_invoices_past_due_and_purges_sessions() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("sweep.db")));
    let services = initialise(&config).await?;
    let pool = &services.db_pool;

    let invoices = InvoiceService::new(pool.clone(), &config.documents);
    let input: InvoiceInput = serde_json::from_value(json!({
        "customer_name": "Musanze Traders",
        "issue_date": "2026-01-05",
        "due_date": "2026-02-04",
        "items": [{ "description": "Warehousing", "quantity": 1.0, "unit_price": 90000.0 }]
    }))?;
    let created = invoices.create(&input, None).await?;
    invoices
        .set_status(&created.invoice.public_id, InvoiceStatus::Sent)
        .await?;

    sqlx::query(
        "INSERT INTO users (public_id, username, email, password_hash, status, created_at, updated_at)
         VALUES ('u1', 'clerk', 'clerk@fezalogistics.com', 'x', 'active', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO sessions (user_id, token, created_at, expires_at)
         SELECT id, 'stale-token', '2026-01-01T00:00:00+00:00', '2026-01-02T00:00:00+00:00'
         FROM users WHERE public_id = 'u1'",
    )
    .execute(pool)
    .await?;

    let maintenance = services.maintenance(&config);
    let report = maintenance
        .run_once(NaiveDate::from_ymd_opt(2026, 3, 1).context("date")?)
        .await;

    assert_eq!(report.overdue_invoices, 1);
    assert_eq!(report.purged_sessions, 1);

    let refreshed = invoices.get(&created.invoice.public_id).await?;
    assert_eq!(refreshed.invoice.status, InvoiceStatus::Overdue);

    let second = maintenance
        .run_once(NaiveDate::from_ymd_opt(2026, 3, 2).context("date")?)
        .await;
    assert_eq!(second.overdue_invoices, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_expires_lapsed_quotations_only() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("quotes.db")));
    let services = initialise(&config).await?;

    let quotations = QuotationService::new(services.db_pool.clone(), &config.documents);
    let input: QuotationInput = serde_json::from_value(json!({
        "customer_name": "Rubavu Cargo",
        "issue_date": "2026-02-01",
        "valid_until": "2026-02-28",
        "items": [{ "description": "Container haulage", "quantity": 1.0, "unit_price": 250000.0 }]
    }))?;
    let sent = quotations.create(&input, None).await?.quotation.public_id;
    let accepted = quotations.create(&input, None).await?.quotation.public_id;
    quotations.set_status(&sent, QuotationStatus::Sent).await?;
    quotations.set_status(&accepted, QuotationStatus::Accepted).await?;

    let report = services
        .maintenance(&config)
        .run_once(NaiveDate::from_ymd_opt(2026, 3, 1).context("date")?)
        .await;
    assert_eq!(report.expired_quotations, 1);

    assert_eq!(quotations.get(&sent).await?.quotation.status, QuotationStatus::Expired);
    assert_eq!(
        quotations.get(&accepted).await?.quotation.status,
        QuotationStatus::Accepted
    );
    Ok(())
}
