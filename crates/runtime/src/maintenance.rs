//! Periodic housekeeping: overdue invoices, expired quotations and stale
//! sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use feza_auth::Authenticator;
use feza_billing::{InvoiceService, QuotationService};
use feza_config::AppConfig;
use feza_mailer::Mailer;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub overdue_invoices: u64,
    pub expired_quotations: u64,
    pub purged_sessions: u64,
}

#[derive(Clone)]
pub struct Maintenance {
    invoices: InvoiceService,
    quotations: QuotationService,
    authenticator: Authenticator,
}

impl Maintenance {
    pub fn new(pool: SqlitePool, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            invoices: InvoiceService::new(pool.clone(), &config.documents),
            quotations: QuotationService::new(pool.clone(), &config.documents),
            authenticator: Authenticator::new(pool, &config.auth, mailer, config.mail.clone()),
        }
    }

    /// One sweep. A failing step is logged and does not stop the others.
    pub async fn run_once(&self, today: NaiveDate) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.invoices.mark_overdue(today).await {
            Ok(count) => report.overdue_invoices = count,
            Err(error) => warn!(%error, "marking overdue invoices failed"),
        }
        match self.quotations.mark_expired(today).await {
            Ok(count) => report.expired_quotations = count,
            Err(error) => warn!(%error, "expiring quotations failed"),
        }
        match self.authenticator.purge_expired_sessions().await {
            Ok(count) => report.purged_sessions = count,
            Err(error) => warn!(%error, "purging expired sessions failed"),
        }

        report
    }

    /// Run a sweep now and then every `every` until the task is aborted.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = self.run_once(Utc::now().date_naive()).await;
                if report != MaintenanceReport::default() {
                    info!(
                        overdue_invoices = report.overdue_invoices,
                        expired_quotations = report.expired_quotations,
                        purged_sessions = report.purged_sessions,
                        "maintenance sweep"
                    );
                }
            }
        })
    }
}
