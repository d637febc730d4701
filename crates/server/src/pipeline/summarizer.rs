//! Q2 consumer: ensure a summary exists for a classified alert, then enqueue
//! to Q3 for ticket creation. Grounded on spec §4.4.

use std::sync::Arc;

use sentinel_core::domain::{ClassifiedAlert, SummaryTable};
use tracing::info;

use crate::pipeline::Outcome;
use crate::state::AppContext;

pub async fn handle(ctx: Arc<AppContext>, payload: Vec<u8>, _retries: u32) -> Outcome {
    let classified: ClassifiedAlert = match serde_json::from_slice(&payload) {
        Ok(v) => v,
        Err(e) => return Outcome::Fatal(format!("malformed Q2 payload: {e}")),
    };

    match summarize(&ctx, classified).await {
        Ok(()) => Outcome::Done,
        Err(e) => Outcome::Retry(e.to_string()),
    }
}

async fn summarize(ctx: &AppContext, classified: ClassifiedAlert) -> Result<(), crate::error::ServerError> {
    let existing = ctx.db.get_summary(&classified.email_id).await?;

    if existing.is_none() {
        let summary_text = match &classified.recommended_action {
            Some(action) if !action.is_empty() => format!("{} on {}. Recommended action: {}", classified.trigger_name, classified.resource_name, action),
            _ => format!("{} on {}.", classified.trigger_name, classified.resource_name),
        };

        let row = SummaryTable {
            email_id: classified.email_id.clone(),
            summary: summary_text,
            inserted_at: chrono::Utc::now(),
            status: true,
        };
        ctx.db.upsert_summary(&row).await?;
    }

    let bytes = serde_json::to_vec(&classified)?;
    ctx.broker.publish(&ctx.broker.topology().jira.name, &bytes, 0).await?;
    info!(email_id = %classified.email_id, "summarized and enqueued for ticket creation");
    Ok(())
}
