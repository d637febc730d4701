//! Mailbox connector: the boundary to the (out-of-scope) Outlook/IMAP
//! mail-store. Only the interface is specified here; a real implementation
//! would live behind the same trait with no change to the ingester.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// One message as returned by the mail store, before any persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxMessage {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub received_at: DateTime<Utc>,
    pub raw_bytes: Vec<u8>,
}

/// Read-only access to a mailbox: messages received after `since`, sorted
/// ascending, restricted to senders on `allowlist` (empty allowlist means
/// "allow all" — see `sentinel_core::config::MailboxConfig::is_allowed`).
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn fetch_since(
        &self,
        since: DateTime<Utc>,
        allowlist: &[String],
    ) -> Result<Vec<MailboxMessage>, ConnectorError>;
}

/// A fixed in-memory mailbox, useful for tests and for environments where
/// the real Outlook/IMAP connector is wired in out-of-process. Messages are
/// filtered by `received_at > since` and by the allow-list, matching the
/// real connector's documented contract exactly.
#[derive(Debug, Clone, Default)]
pub struct StaticMailbox {
    messages: Vec<MailboxMessage>,
}

impl StaticMailbox {
    pub fn new(messages: Vec<MailboxMessage>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl MailboxConnector for StaticMailbox {
    async fn fetch_since(
        &self,
        since: DateTime<Utc>,
        allowlist: &[String],
    ) -> Result<Vec<MailboxMessage>, ConnectorError> {
        let mut matched: Vec<MailboxMessage> = self
            .messages
            .iter()
            .filter(|m| m.received_at > since)
            .filter(|m| allowlist.is_empty() || allowlist.iter().any(|a| a.eq_ignore_ascii_case(&m.sender)))
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.received_at);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(subject: &str, sender: &str, received_at: &str) -> MailboxMessage {
        MailboxMessage {
            subject: subject.to_string(),
            body: "body".to_string(),
            sender: sender.to_string(),
            received_at: received_at.parse().unwrap(),
            raw_bytes: vec![],
        }
    }

    #[tokio::test]
    async fn filters_by_since_and_sorts_ascending() {
        let mailbox = StaticMailbox::new(vec![
            msg("second", "a@b.com", "2025-01-07T11:00:00Z"),
            msg("first", "a@b.com", "2025-01-07T10:00:00Z"),
            msg("too-old", "a@b.com", "2025-01-06T00:00:00Z"),
        ]);
        let since = "2025-01-06T12:00:00Z".parse().unwrap();
        let result = mailbox.fetch_since(since, &[]).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].subject, "first");
        assert_eq!(result[1].subject, "second");
    }

    #[tokio::test]
    async fn unknown_senders_are_filtered_out() {
        let mailbox = StaticMailbox::new(vec![msg("x", "stranger@evil.com", "2025-01-07T10:00:00Z")]);
        let since = "2025-01-01T00:00:00Z".parse().unwrap();
        let result = mailbox
            .fetch_since(since, &["alerts@example.com".to_string()])
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
