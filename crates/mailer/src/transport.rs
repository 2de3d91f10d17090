use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::info;

use crate::{DeliveryReceipt, MailMessage, MailResult, Mailer};

/// Writes each message as an `.eml` file into a spool directory
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: &MailMessage) -> MailResult<DeliveryReceipt> {
        message.validate()?;

        let now = Utc::now();
        fs::create_dir_all(&self.dir).await?;

        let local_id = message
            .message_id
            .split('@')
            .next()
            .unwrap_or(&message.message_id);
        let path = self
            .dir
            .join(format!("{}-{local_id}.eml", now.format("%Y%m%dT%H%M%S")));
        fs::write(&path, message.to_mime(now)).await?;

        info!(
            message_id = %message.message_id,
            recipients = message.to.len(),
            path = %path.display(),
            "mail written to outbox"
        );

        Ok(DeliveryReceipt {
            message_id: message.message_id.clone(),
            location: Some(path.display().to_string()),
        })
    }
}

/// Logs messages instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> MailResult<DeliveryReceipt> {
        message.validate()?;
        let recipients: Vec<&str> = message.to.iter().map(|m| m.address()).collect();
        info!(
            message_id = %message.message_id,
            to = ?recipients,
            subject = %message.subject,
            "mail delivery skipped, no outbox configured"
        );
        Ok(DeliveryReceipt {
            message_id: message.message_id.clone(),
            location: None,
        })
    }
}
