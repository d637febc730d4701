//! Q1 consumer: classify a raw message into trigger/resource/priority/type,
//! apply the graceful-shutdown special case, maintenance suppression, and
//! optional time-window suppression, then enqueue actionable alerts to Q2.
//!
//! Grounded on spec §4.3. The "two classification passes through an
//! external text generator, merge the two result dictionaries" step is
//! realized as one text-generator call for subject/body enrichment plus the
//! router's fuzzy match against the `TriggerMapping` snapshot for the
//! trigger/team/priority fields (spec §4.3's note that one similarity
//! mechanism serves both needs).

use std::sync::Arc;

use regex::Regex;
use sentinel_core::domain::{AlertType, ClassifiedAlert, DuplicateEmail, IngestedAlert, SegregatedEmail};
use sentinel_graph::check_suppression;
use sentinel_textgen::GenerationRequest;
use tracing::info;

use crate::dedup::TimeWindowDedup;
use crate::pipeline::Outcome;
use crate::state::AppContext;

const NA: &str = "N/A";

/// Matches "machine shutdown gracefully" case-insensitively, tolerant of any
/// run of whitespace between the words.
fn graceful_shutdown_pattern() -> Regex {
    Regex::new(r"(?i)machine\s+shut\s*down\s+gracefully").expect("static pattern is valid")
}

pub async fn handle(ctx: Arc<AppContext>, payload: Vec<u8>, _retries: u32) -> Outcome {
    let ingested: IngestedAlert = match serde_json::from_slice(&payload) {
        Ok(v) => v,
        Err(e) => return Outcome::Fatal(format!("malformed Q1 payload: {e}")),
    };

    match classify(&ctx, ingested).await {
        Ok(()) => Outcome::Done,
        Err(e) => Outcome::Retry(e.to_string()),
    }
}

async fn classify(ctx: &AppContext, ingested: IngestedAlert) -> Result<(), crate::error::ServerError> {
    // Step 1: already classified and enqueued downstream.
    if let Some(existing) = ctx.db.get_segregated_email(&ingested.email_id).await? {
        if existing.status {
            return Ok(());
        }
    }

    let combined = format!("{} {}", ingested.subject, ingested.body);

    // Step 3: graceful-shutdown special case short-circuits before any
    // text-generation call or routing lookup.
    if graceful_shutdown_pattern().is_match(&combined) {
        let row = SegregatedEmail {
            email_id: ingested.email_id.clone(),
            priority: Some("Informational".to_string()),
            alert_type: Some(AlertType::Informational.to_string()),
            resource_name: None,
            trigger_name: None,
            generated_summary: None,
            recommended_action: Some(NA.to_string()),
            inserted_at: chrono::Utc::now(),
            status: true,
        };
        ctx.db.upsert_segregated_email(&row).await?;
        info!(email_id = %ingested.email_id, "graceful shutdown, classified informational");
        return Ok(());
    }

    // Step 2: resolve trigger/resource via the text generator then route.
    let enrichment = run_text_generation_pass(ctx, &ingested).await?;
    let matched = ctx.router.match_trigger(&enrichment.trigger_name);

    let alert_type = if matched.actionable { AlertType::Actionable } else { AlertType::Informational };

    let classified = ClassifiedAlert::from_ingested(
        ingested,
        matched.matched_trigger.clone(),
        enrichment.resource_name.clone(),
        matched.priority.clone(),
        alert_type,
        matched.recommended_action.clone(),
    );

    // In-batch dedup (spec §2/§9 glossary's `(trigger_name, resource_name,
    // subject)` signature): a repeat within this same ingestion run is
    // recorded against the email that first claimed the signature instead of
    // being classified again.
    if let Some(prior_email_id) = ctx.batch_dedup.check_and_record(&classified) {
        let duplicate = DuplicateEmail {
            email_id: prior_email_id,
            duplicate_email_id: classified.email_id.clone(),
            subject: classified.subject.clone(),
            body: classified.body.clone(),
            sender: classified.sender.clone(),
            received_at: classified.received_at,
            inserted_at: chrono::Utc::now(),
        };
        ctx.db.insert_duplicate(&duplicate).await?;
        persist_segregated(ctx, &classified, false).await?;
        info!(email_id = %classified.email_id, "suppressed by in-batch dedup");
        return Ok(());
    }

    // Step 4: maintenance-window suppression.
    let suppression = check_suppression(&ctx.parent_graph, &MaintenanceSourceAdapter(ctx), &classified.resource_name).await;
    if suppression.suppressed {
        persist_segregated(ctx, &classified, false).await?;
        info!(email_id = %classified.email_id, blocking_entity = ?suppression.blocking_entity, "suppressed by maintenance window");
        return Ok(());
    }

    // Step 5: optional time-window suppression.
    if ctx.config.dedup.time_window_dedup_enabled {
        if ctx.time_window_dedup.check_and_record(&classified.trigger_name, &classified.resource_name, chrono::Utc::now()) {
            persist_segregated(ctx, &classified, false).await?;
            info!(email_id = %classified.email_id, "suppressed by time-window dedup");
            return Ok(());
        }
    }

    // Step 6/7: only P1/P2 alerts continue to summarization.
    if matches!(classified.priority.as_str(), "P1" | "P2") {
        let summary_text = build_summary_text(&classified);
        persist_segregated(ctx, &classified, true).await?;

        let summary = sentinel_core::domain::SummaryTable {
            email_id: classified.email_id.clone(),
            summary: summary_text,
            inserted_at: chrono::Utc::now(),
            status: true,
        };
        ctx.db.upsert_summary(&summary).await?;

        let bytes = serde_json::to_vec(&classified)?;
        ctx.broker.publish(&ctx.broker.topology().summ.name, &bytes, 0).await?;
    } else {
        persist_segregated(ctx, &classified, false).await?;
    }

    Ok(())
}

async fn persist_segregated(ctx: &AppContext, classified: &ClassifiedAlert, status: bool) -> Result<(), crate::error::ServerError> {
    let row = SegregatedEmail {
        email_id: classified.email_id.clone(),
        priority: Some(classified.priority.clone()),
        alert_type: Some(classified.alert_type.to_string()),
        resource_name: Some(classified.resource_name.clone()),
        trigger_name: Some(classified.trigger_name.clone()),
        generated_summary: classified.recommended_action.clone(),
        recommended_action: classified.recommended_action.clone(),
        inserted_at: chrono::Utc::now(),
        status,
    };
    ctx.db.upsert_segregated_email(&row).await
}

fn build_summary_text(classified: &ClassifiedAlert) -> String {
    match &classified.recommended_action {
        Some(action) if !action.is_empty() => format!("{} on {}. Recommended action: {}", classified.trigger_name, classified.resource_name, action),
        _ => format!("{} on {}.", classified.trigger_name, classified.resource_name),
    }
}

struct Enrichment {
    trigger_name: String,
    resource_name: String,
}

/// First text-generation pass: subject+body -> structured trigger/resource
/// fields. Offloaded through the worker pool per spec §5.
async fn run_text_generation_pass(ctx: &AppContext, ingested: &IngestedAlert) -> Result<Enrichment, crate::error::ServerError> {
    let prompt = format!(
        "Extract the monitoring trigger name and the affected resource name from this alert.\nSubject: {}\nBody: {}",
        ingested.subject, ingested.body
    );
    let request = GenerationRequest { prompt, max_tokens: 128, temperature: 0.0 };
    let raw = ctx.worker_pool.generate(ctx.text_generator.as_ref(), request).await?;

    Ok(parse_enrichment(&raw, ingested))
}

/// Parse the generator's response as `trigger: <x>\nresource: <y>`, falling
/// back to the raw subject/sender when the generator's output doesn't match
/// the expected shape — a malformed response from a best-effort text
/// generator is a degraded classification, not a fatal error.
fn parse_enrichment(raw: &str, ingested: &IngestedAlert) -> Enrichment {
    let mut trigger_name = None;
    let mut resource_name = None;

    for line in raw.lines() {
        if let Some(value) = line.strip_prefix("trigger:").or_else(|| line.strip_prefix("Trigger:")) {
            trigger_name = Some(value.trim().to_string());
        }
        if let Some(value) = line.strip_prefix("resource:").or_else(|| line.strip_prefix("Resource:")) {
            resource_name = Some(value.trim().to_string());
        }
    }

    Enrichment {
        trigger_name: trigger_name.unwrap_or_else(|| ingested.subject.clone()),
        resource_name: resource_name.unwrap_or_else(|| ingested.sender.clone()),
    }
}

struct MaintenanceSourceAdapter<'a>(&'a AppContext);

#[async_trait::async_trait]
impl<'a> sentinel_graph::MaintenanceSource for MaintenanceSourceAdapter<'a> {
    async fn is_ongoing(&self, server_name: &str) -> Result<bool, sentinel_graph::GraphError> {
        self.0
            .db
            .is_ongoing(server_name, chrono::Utc::now())
            .await
            .map_err(|e| sentinel_graph::GraphError::Source(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graceful_shutdown_pattern_tolerates_case_and_whitespace() {
        let re = graceful_shutdown_pattern();
        assert!(re.is_match("Machine shut down gracefully."));
        assert!(re.is_match("MACHINE   SHUTDOWN   GRACEFULLY"));
        assert!(!re.is_match("machine is down unexpectedly"));
    }

    #[test]
    fn parse_enrichment_falls_back_when_unstructured() {
        let ingested = IngestedAlert {
            email_id: "id".into(),
            sender: "a@b.com".into(),
            subject: "High CPU on hostA".into(),
            body: "body".into(),
            received_at: chrono::Utc::now(),
        };
        let enrichment = parse_enrichment("unstructured garbage", &ingested);
        assert_eq!(enrichment.trigger_name, "High CPU on hostA");
        assert_eq!(enrichment.resource_name, "a@b.com");
    }

    #[test]
    fn parse_enrichment_reads_structured_fields() {
        let ingested = IngestedAlert {
            email_id: "id".into(),
            sender: "a@b.com".into(),
            subject: "x".into(),
            body: "y".into(),
            received_at: chrono::Utc::now(),
        };
        let enrichment = parse_enrichment("trigger: High CPU\nresource: hostA\n", &ingested);
        assert_eq!(enrichment.trigger_name, "High CPU");
        assert_eq!(enrichment.resource_name, "hostA");
    }
}
