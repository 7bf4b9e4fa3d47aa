//! Outgoing mail and its send history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use cafekiosk_core::{Entity, MailHistoryId};

use crate::store::{Store, StoreError};

/// External mail gateway.
#[async_trait::async_trait]
pub trait MailSendClient: Send + Sync {
    /// Returns whether the gateway accepted the message.
    async fn send_email(&self, from: &str, to: &str, subject: &str, content: &str) -> bool;
}

#[async_trait::async_trait]
impl<C> MailSendClient for Arc<C>
where
    C: MailSendClient + ?Sized,
{
    async fn send_email(&self, from: &str, to: &str, subject: &str, content: &str) -> bool {
        (**self).send_email(from, to, subject, content).await
    }
}

/// Client that only writes the message to the log and always reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMailSendClient;

#[async_trait::async_trait]
impl MailSendClient for LoggingMailSendClient {
    async fn send_email(&self, from: &str, to: &str, subject: &str, content: &str) -> bool {
        info!(from, to, subject, content, "mail sent");
        true
    }
}

/// A mail that is about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMailSendHistory {
    pub from_email: String,
    pub to_email: String,
    pub subject: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewMailSendHistory {
    pub fn with_id(self, id: MailHistoryId) -> MailSendHistory {
        MailSendHistory {
            id,
            from_email: self.from_email,
            to_email: self.to_email,
            subject: self.subject,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Record of a mail the gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSendHistory {
    pub id: MailHistoryId,
    pub from_email: String,
    pub to_email: String,
    pub subject: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for MailSendHistory {
    type Id = MailHistoryId;

    fn id(&self) -> &MailHistoryId {
        &self.id
    }
}

/// Sends mail through the gateway and keeps a history of accepted messages.
pub struct MailService<S, C> {
    store: S,
    client: C,
}

impl<S, C> MailService<S, C>
where
    S: Store,
    C: MailSendClient,
{
    pub fn new(store: S, client: C) -> Self {
        Self { store, client }
    }

    /// Returns `Ok(false)` (and records nothing) when the gateway refuses the message.
    #[instrument(skip(self, content), err)]
    pub async fn send_mail(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        if !self.client.send_email(from, to, subject, content).await {
            warn!(to, "mail gateway refused the message");
            return Ok(false);
        }

        let mut tx = self.store.begin().await?;
        let history = tx
            .save_mail_history(NewMailSendHistory {
                from_email: from.to_string(),
                to_email: to.to_string(),
                subject: subject.to_string(),
                content: content.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        tx.commit().await?;

        info!(history_id = %history.id, "mail send recorded");
        Ok(true)
    }
}
