//! Outbound mail for the Feza backend.
//!
//! Messages are composed as MIME `multipart/alternative` documents and handed
//! to a [`Mailer`]. The crate ships an outbox implementation that drops `.eml`
//! files into a directory for a relay to pick up, and a logging
//! implementation used when no outbox is configured.

mod message;
mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use feza_config::MailConfig;
use thiserror::Error;

pub use message::{Attachment, MailMessage, Mailbox};
pub use transport::{LogMailer, OutboxMailer};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("message has no recipients")]
    NoRecipients,
    #[error("message has no body")]
    EmptyBody,
    #[error("mail delivery failed: {0}")]
    Delivery(#[from] std::io::Error),
}

pub type MailResult<T> = Result<T, MailError>;

/// Outcome of a successful hand-off to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub location: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> MailResult<DeliveryReceipt>;
}

/// Pick the transport described by the configuration.
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match config.outbox_dir.as_deref() {
        Some(dir) if !dir.trim().is_empty() => Arc::new(OutboxMailer::new(dir)),
        _ => Arc::new(LogMailer),
    }
}

/// Sender mailbox from configuration.
pub fn default_sender(config: &MailConfig) -> MailResult<Mailbox> {
    Mailbox::new(Some(config.from_name.clone()), config.from_address.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_is_used_only_when_configured() {
        let mut config = MailConfig::default();
        let _log = mailer_from_config(&config);

        config.outbox_dir = Some("   ".into());
        let _still_log = mailer_from_config(&config);

        config.outbox_dir = Some("/tmp/outbox".into());
        let _outbox = mailer_from_config(&config);
    }

    #[test]
    fn default_sender_uses_configured_identity() {
        let config = MailConfig::default();
        let sender = default_sender(&config).unwrap();
        assert_eq!(sender.address(), config.from_address);
        assert_eq!(
            sender.to_header(),
            format!("\"{}\" <{}>", config.from_name, config.from_address)
        );
    }
}
