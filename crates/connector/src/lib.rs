//! External-system boundary clients: the mailbox connector and the issue
//! tracker. Both are named interfaces per spec §6 — only the mailbox side
//! stays a trait-plus-test-double (the real Outlook/IMAP connector is
//! out of scope); the tracker gets a concrete REST client since the
//! actioner drives it directly.

pub mod error;
pub mod mailbox;
pub mod tracker;

pub use error::ConnectorError;
pub use mailbox::{MailboxConnector, MailboxMessage, StaticMailbox};
pub use tracker::{is_open_status, IssueDetails, IssueTracker, JiraTracker, NewIssue, TrackerUser, OPEN_STATUSES};
