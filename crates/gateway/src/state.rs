use std::sync::Arc;

use feza_assistant::Assistant;
use feza_auth::{AccessControl, AuthSession, Authenticator, LockoutPolicy, UserAdmin};
use feza_billing::{DocumentService, InvoiceService, QuotationService, ReceiptService};
use feza_config::AppConfig;
use feza_database::{
    ActivityRepository, EmailLogRepository, NewActivity, SettingsRepository, User,
};
use feza_mailer::Mailer;
use feza_petty_cash::PettyCashService;
use sqlx::SqlitePool;
use tracing::warn;

use crate::middleware::CurrentUser;
use crate::ApiError;

struct Services {
    pool: SqlitePool,
    authenticator: Authenticator,
    access: AccessControl,
    users: UserAdmin,
    invoices: InvoiceService,
    quotations: QuotationService,
    receipts: ReceiptService,
    documents: DocumentService,
    petty_cash: PettyCashService,
    assistant: Assistant,
    activity: ActivityRepository,
    settings: SettingsRepository,
    email_logs: EmailLogRepository,
}

#[derive(Clone)]
pub struct AppState {
    services: Arc<Services>,
}

impl AppState {
    /// Wire every service onto one pool.
    pub fn new(
        pool: SqlitePool,
        config: &AppConfig,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        let assistant = Assistant::new(pool.clone(), &config.assistant)
            .map_err(|e| anyhow::anyhow!("failed to build the assistant client: {e}"))?;

        let services = Services {
            authenticator: Authenticator::new(
                pool.clone(),
                &config.auth,
                mailer.clone(),
                config.mail.clone(),
            ),
            access: AccessControl::new(pool.clone()),
            users: UserAdmin::new(
                pool.clone(),
                LockoutPolicy::from_config(&config.auth.lockout),
            ),
            invoices: InvoiceService::new(pool.clone(), &config.documents),
            quotations: QuotationService::new(pool.clone(), &config.documents),
            receipts: ReceiptService::new(pool.clone(), &config.documents),
            documents: DocumentService::new(
                pool.clone(),
                mailer,
                config.mail.clone(),
                &config.documents,
            ),
            petty_cash: PettyCashService::new(pool.clone()),
            assistant,
            activity: ActivityRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool.clone()),
            email_logs: EmailLogRepository::new(pool.clone()),
            pool,
        };

        Ok(Self {
            services: Arc::new(services),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.services.pool
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.services.authenticator
    }

    pub fn access(&self) -> &AccessControl {
        &self.services.access
    }

    pub fn users(&self) -> &UserAdmin {
        &self.services.users
    }

    pub fn invoices(&self) -> &InvoiceService {
        &self.services.invoices
    }

    pub fn quotations(&self) -> &QuotationService {
        &self.services.quotations
    }

    pub fn receipts(&self) -> &ReceiptService {
        &self.services.receipts
    }

    pub fn documents(&self) -> &DocumentService {
        &self.services.documents
    }

    pub fn petty_cash(&self) -> &PettyCashService {
        &self.services.petty_cash
    }

    pub fn assistant(&self) -> &Assistant {
        &self.services.assistant
    }

    pub fn activity(&self) -> &ActivityRepository {
        &self.services.activity
    }

    pub fn settings(&self) -> &SettingsRepository {
        &self.services.settings
    }

    pub fn email_logs(&self) -> &EmailLogRepository {
        &self.services.email_logs
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.services
            .authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }

    /// Append to the activity log on behalf of the caller.
    ///
    /// A failed write is logged and otherwise ignored so the request that
    /// triggered it still succeeds.
    pub async fn record_activity(&self, current: &CurrentUser, activity: NewActivity) {
        let activity = activity.ip(current.ip.clone());
        self.record(activity).await;
    }

    pub async fn record(&self, activity: NewActivity) {
        if let Err(error) = self.services.activity.record(&activity).await {
            warn!(%error, action = %activity.action, "failed to record activity");
        }
    }
}
