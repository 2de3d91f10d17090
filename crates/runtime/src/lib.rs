use std::sync::Arc;

use anyhow::{Context, Result};
use feza_config::AppConfig;
use feza_database::initialize_database;
use feza_mailer::{mailer_from_config, Mailer};
use sqlx::SqlitePool;
use tracing::info;

pub mod maintenance;

pub use maintenance::{Maintenance, MaintenanceReport};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(true)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Process-wide resources shared by the HTTP server and the CLI commands.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub mailer: Arc<dyn Mailer>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let mailer = mailer_from_config(&config.mail);
        match config.mail.outbox_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => info!(outbox = dir, "mail outbox ready"),
            _ => info!("no mail outbox configured, outgoing mail is only logged"),
        }

        info!(url = %config.database.url, "database ready");

        Ok(Self { db_pool, mailer })
    }

    pub fn maintenance(&self, config: &AppConfig) -> Maintenance {
        Maintenance::new(self.db_pool.clone(), config, self.mailer.clone())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
