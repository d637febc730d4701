//! Dedup/suppression logic: in-batch signature, optional time-window
//! suppression, and the cross-ticket open-ticket check.
//!
//! In-batch signature and its simple string-concatenation form are grounded
//! on `BatchDeduplication.create_signature` (stateless, one batch at a time).
//! Time-window suppression generalizes that to a process-lifetime recent-alert
//! map, gated off by default per spec §9 Open Question 1.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use sentinel_connector::{is_open_status, ConnectorError, IssueTracker};
use sentinel_core::ClassifiedAlert;

use crate::db::Database;
use crate::error::ServerError;

/// In-process batch signature map, reset at the start of each ingestion run.
/// Mirrors `BatchDeduplication`'s `seen_signatures`: stateless across runs.
/// Maps a signature to the `email_id` that first claimed it in this batch,
/// so a later duplicate within the same batch can be recorded against it —
/// the same shape as the cross-ticket dedup decision, just scoped to one
/// ingestion run instead of the whole ticket history.
pub struct BatchDedup {
    seen: Mutex<HashMap<String, String>>,
}

impl BatchDedup {
    pub fn new() -> Self {
        Self { seen: Mutex::new(HashMap::new()) }
    }

    /// Clear every recorded signature. Called by the ingester at the start
    /// of each run so in-batch dedup never carries state across batches.
    pub fn reset(&self) {
        self.seen.lock().expect("batch dedup map poisoned").clear();
    }

    /// Record `alert`'s batch signature if unseen; if it was already claimed
    /// earlier in this batch, return the `email_id` that claimed it.
    pub fn check_and_record(&self, alert: &ClassifiedAlert) -> Option<String> {
        let mut seen = self.seen.lock().expect("batch dedup map poisoned");
        let signature = alert.batch_signature();
        match seen.get(&signature) {
            Some(prior_email_id) => Some(prior_email_id.clone()),
            None => {
                seen.insert(signature, alert.email_id.clone());
                None
            }
        }
    }
}

impl Default for BatchDedup {
    fn default() -> Self {
        Self::new()
    }
}

/// Recent-alert map for the optional time-window suppression path (spec §9 Q1).
/// Keyed by `(trigger_name, resource_name)`, each entry expires after
/// `window`. Disabled unless `TIME_WINDOW_DEDUP_ENABLED=true`.
pub struct TimeWindowDedup {
    window: Duration,
    recent: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl TimeWindowDedup {
    pub fn new(window_hours: u32) -> Self {
        Self { window: Duration::hours(window_hours as i64), recent: Mutex::new(HashMap::new()) }
    }

    /// Record this alert as seen now, and report whether an equivalent alert
    /// was already seen within the window. Equivalent to a single
    /// check-and-insert to avoid a second lock acquisition.
    pub fn check_and_record(&self, trigger_name: &str, resource_name: &str, now: DateTime<Utc>) -> bool {
        let key = (trigger_name.to_string(), resource_name.to_string());
        let mut recent = self.recent.lock().expect("time-window dedup map poisoned");

        let is_duplicate = match recent.get(&key) {
            Some(seen_at) => now.signed_duration_since(*seen_at) < self.window,
            None => false,
        };

        if !is_duplicate {
            recent.insert(key, now);
        }
        is_duplicate
    }
}

/// Result of the actioner's cross-ticket dedup check.
pub enum CrossTicketDecision {
    /// No open prior ticket for this signature; proceed to create one.
    CreateNew,
    /// An open prior ticket exists; suppress and record against it.
    Suppress { prior_email_id: String, prior_ticket_key: String },
}

/// Find the most recent prior ticket for `(trigger_name, resource_name)`,
/// excluding `email_id`, and check whether its tracker status is still open.
/// Per spec §4.5: a tracker lookup failure is not a reason to skip dedup
/// silently, but it also must not block ticket creation indefinitely — we
/// treat a tracker error as "status unknown, assume closed" and proceed to
/// create a new ticket, logging the failure.
pub async fn check_cross_ticket_dedup(
    db: &Database,
    tracker: &dyn IssueTracker,
    trigger_name: &str,
    resource_name: &str,
    email_id: &str,
) -> Result<CrossTicketDecision, ServerError> {
    let prior = db.find_prior_ticket_by_signature(trigger_name, resource_name, email_id).await?;

    let Some((prior_email_id, prior_ticket_key)) = prior else {
        return Ok(CrossTicketDecision::CreateNew);
    };

    match tracker.get_issue(&prior_ticket_key).await {
        Ok(details) if is_open_status(&details.status.name) => {
            Ok(CrossTicketDecision::Suppress { prior_email_id, prior_ticket_key })
        }
        Ok(_) => Ok(CrossTicketDecision::CreateNew),
        Err(ConnectorError::TrackerApi { status, .. }) => {
            tracing::warn!(prior_ticket_key, status, "tracker status lookup failed, treating as closed");
            Ok(CrossTicketDecision::CreateNew)
        }
        Err(e) => {
            tracing::warn!(prior_ticket_key, error = %e, "tracker status lookup failed, treating as closed");
            Ok(CrossTicketDecision::CreateNew)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::AlertType;

    fn classified(email_id: &str, trigger: &str, resource: &str, subject: &str) -> ClassifiedAlert {
        ClassifiedAlert {
            email_id: email_id.into(),
            sender: "a@b.com".into(),
            subject: subject.into(),
            body: "body".into(),
            received_at: Utc::now(),
            trigger_name: trigger.into(),
            resource_name: resource.into(),
            priority: "P1".into(),
            alert_type: AlertType::Actionable,
            recommended_action: None,
            extension: Default::default(),
        }
    }

    #[test]
    fn batch_dedup_flags_repeated_signature_only() {
        let dedup = BatchDedup::new();
        assert_eq!(dedup.check_and_record(&classified("id1", "High CPU", "hostA", "High CPU on hostA")), None);
        assert_eq!(
            dedup.check_and_record(&classified("id2", "High CPU", "hostA", "High CPU on hostA")),
            Some("id1".to_string())
        );
        assert_eq!(dedup.check_and_record(&classified("id3", "High CPU", "hostB", "High CPU on hostB")), None);
    }

    #[test]
    fn batch_dedup_reset_clears_seen_signatures() {
        let dedup = BatchDedup::new();
        assert_eq!(dedup.check_and_record(&classified("id1", "High CPU", "hostA", "High CPU on hostA")), None);
        dedup.reset();
        assert_eq!(dedup.check_and_record(&classified("id2", "High CPU", "hostA", "High CPU on hostA")), None);
    }

    #[test]
    fn time_window_dedup_expires_after_window() {
        let dedup = TimeWindowDedup::new(1);
        let t0 = "2025-01-07T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!dedup.check_and_record("High CPU", "hostA", t0));

        let within_window = t0 + Duration::minutes(30);
        assert!(dedup.check_and_record("High CPU", "hostA", within_window));

        let after_window = t0 + Duration::hours(2);
        assert!(!dedup.check_and_record("High CPU", "hostA", after_window));
    }
}
