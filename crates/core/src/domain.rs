//! Persisted entities and in-process pipeline payloads.
//!
//! The persisted entities mirror the relational schema: one struct per table,
//! `email_id` as the join key threaded through `RawEmail` -> `SegregatedEmail`
//! -> `SummaryTable` -> `JiraEntry`. The pipeline payloads (`IngestedAlert`,
//! `ClassifiedAlert`) are the tagged variants carried on the broker between
//! stages; each stage produces the next variant instead of mutating a shared
//! dict.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic id for a mailbox message: `SHA256(subject || "|" || received_at.iso8601())`.
pub fn email_id_for(subject: &str, received_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(b"|");
    hasher.update(received_at.to_rfc3339().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether an alert requires a ticket and notification, or is logged only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Actionable,
    Informational,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Actionable => write!(f, "actionable"),
            AlertType::Informational => write!(f, "informational"),
        }
    }
}

// ── Persisted entities ─────────────────────────────────────────

/// A raw mailbox message as ingested, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEmail {
    pub email_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Path to the stored message body on local disk (`<root>/<email_id>.msg`).
    pub email_path: Option<String>,
    pub received_at: DateTime<Utc>,
    pub inserted_at: DateTime<Utc>,
    /// Whether this message was enqueued to the classifier.
    pub status: bool,
}

impl RawEmail {
    pub fn new(sender: String, subject: String, body: String, received_at: DateTime<Utc>) -> Self {
        let email_id = email_id_for(&subject, received_at);
        Self {
            email_id,
            sender,
            subject,
            body,
            email_path: None,
            received_at,
            inserted_at: Utc::now(),
            status: true,
        }
    }
}

/// Classification output for an email: priority/type/trigger/resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegregatedEmail {
    pub email_id: String,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub resource_name: Option<String>,
    pub trigger_name: Option<String>,
    pub generated_summary: Option<String>,
    pub recommended_action: Option<String>,
    pub inserted_at: DateTime<Utc>,
    pub status: bool,
}

/// Narrative summary produced by the summarizer stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTable {
    pub email_id: String,
    pub summary: String,
    pub inserted_at: DateTime<Utc>,
    pub status: bool,
}

/// A ticket created in the tracker for an actionable alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraEntry {
    pub jira_id: i64,
    pub email_id: String,
    pub jiraticket_id: String,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub teams_flag: String,
    pub teams_channel: Option<String>,
    pub inserted_at: DateTime<Utc>,
}

/// A suppressed duplicate: `duplicate_email_id` is the later message that was
/// folded into the earlier `email_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateEmail {
    pub email_id: String,
    pub duplicate_email_id: String,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub received_at: DateTime<Utc>,
    pub inserted_at: DateTime<Utc>,
}

/// One reference row mapping a monitoring trigger name to a responsible team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerMapping {
    pub trigger_name: String,
    pub team: String,
    pub priority: String,
    pub responsible_person: Option<String>,
    /// Free-text remediation advice carried into `SegregatedEmail.recommended_action`
    /// and the summarizer's narrative (spec §3/§4.4).
    pub recommended_action: Option<String>,
    /// Whether an alert matching this trigger opens a ticket, or is
    /// informational-only (spec §3's `actionable` column).
    pub actionable: bool,
}

/// A machine-containment edge: `child_id`'s parent is `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentChildRelationship {
    pub parent_id: String,
    pub child_id: String,
}

/// A declared maintenance interval for a server. Ongoing-ness is computed
/// from `(start_time, end_time, now)`, not stored as a flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub server_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceStatus {
    Scheduled,
    Ongoing,
    Expired,
}

impl MaintenanceWindow {
    pub fn status_at(&self, now: DateTime<Utc>) -> MaintenanceStatus {
        if now < self.start_time {
            MaintenanceStatus::Scheduled
        } else if now > self.end_time {
            MaintenanceStatus::Expired
        } else {
            MaintenanceStatus::Ongoing
        }
    }

    pub fn is_ongoing(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == MaintenanceStatus::Ongoing
    }
}

/// A server-to-group membership row. A server with more than one row belongs
/// to more than one group; see `GroupSelectionStrategy` in `sentinel-router`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub server_name: String,
    pub group_name: String,
}

/// A scheduled job's run bookkeeping (ingester interval, last-run timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTable {
    pub job_id: i64,
    pub job_start_time: Option<DateTime<Utc>>,
    pub job_end_time: Option<DateTime<Utc>>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub frequency: String,
    pub job_name: String,
    pub inserted_at: DateTime<Utc>,
}

/// A persisted, admin-refreshable override of the ingester's scheduling
/// interval, keyed by job name. Distinct from the env-sourced `Config`:
/// this is the row an operator edits at runtime via the admin refresh path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfigRow {
    pub job_name: String,
    pub interval_unit: String,
    pub interval_value: u32,
}

// ── Pipeline payloads ──────────────────────────────────────────

/// The payload enqueued to the classifier: a raw message plus its persisted id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedAlert {
    pub email_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl From<&RawEmail> for IngestedAlert {
    fn from(raw: &RawEmail) -> Self {
        Self {
            email_id: raw.email_id.clone(),
            sender: raw.sender.clone(),
            subject: raw.subject.clone(),
            body: raw.body.clone(),
            received_at: raw.received_at,
        }
    }
}

/// The payload enqueued to the summarizer: an `IngestedAlert` enriched with
/// classification fields. Fields the classifier produced but that have no
/// fixed slot on this struct live in `extension`, never merged into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedAlert {
    pub email_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub trigger_name: String,
    pub resource_name: String,
    pub priority: String,
    pub alert_type: AlertType,
    pub recommended_action: Option<String>,
    #[serde(default)]
    pub extension: BTreeMap<String, serde_json::Value>,
}

impl ClassifiedAlert {
    pub fn from_ingested(
        ingested: IngestedAlert,
        trigger_name: String,
        resource_name: String,
        priority: String,
        alert_type: AlertType,
        recommended_action: Option<String>,
    ) -> Self {
        Self {
            email_id: ingested.email_id,
            sender: ingested.sender,
            subject: ingested.subject,
            body: ingested.body,
            received_at: ingested.received_at,
            trigger_name,
            resource_name,
            priority,
            alert_type,
            recommended_action,
            extension: BTreeMap::new(),
        }
    }

    /// Signature used for in-batch and cross-ticket dedup: `(trigger, resource)`.
    pub fn dedup_signature(&self) -> (String, String) {
        (self.trigger_name.clone(), self.resource_name.clone())
    }

    /// Signature used for in-batch dedup within a single ingestion pass:
    /// `trigger|resource|subject`, following the source's batch-dedup signature.
    pub fn batch_signature(&self) -> String {
        format!("{}|{}|{}", self.trigger_name, self.resource_name, self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_id_is_deterministic() {
        let t = "2025-01-07T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let a = email_id_for("High CPU on hostA", t);
        let b = email_id_for("High CPU on hostA", t);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn email_id_differs_on_subject_or_time() {
        let t = "2025-01-07T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let t2 = "2025-01-07T10:00:01Z".parse::<DateTime<Utc>>().unwrap();
        assert_ne!(email_id_for("a", t), email_id_for("b", t));
        assert_ne!(email_id_for("a", t), email_id_for("a", t2));
    }

    #[test]
    fn maintenance_status_boundaries() {
        let start = "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let end = "2025-01-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let window = MaintenanceWindow { server_name: "hostA".into(), start_time: start, end_time: end };

        assert_eq!(window.status_at(start - chrono::Duration::seconds(1)), MaintenanceStatus::Scheduled);
        assert_eq!(window.status_at(start), MaintenanceStatus::Ongoing);
        assert_eq!(window.status_at(end), MaintenanceStatus::Ongoing);
        assert_eq!(window.status_at(end + chrono::Duration::seconds(1)), MaintenanceStatus::Expired);
    }

    #[test]
    fn batch_signature_matches_original_format() {
        let ingested = IngestedAlert {
            email_id: "id1".into(),
            sender: "a@b.com".into(),
            subject: "High CPU".into(),
            body: "body".into(),
            received_at: Utc::now(),
        };
        let classified = ClassifiedAlert::from_ingested(
            ingested,
            "High CPU".into(),
            "hostA".into(),
            "P1".into(),
            AlertType::Actionable,
            None,
        );
        assert_eq!(classified.batch_signature(), "High CPU|hostA|High CPU");
        assert_eq!(classified.dedup_signature(), ("High CPU".into(), "hostA".into()));
    }
}
