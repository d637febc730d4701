//! Periodic mailbox pull (spec §4.1): read the last run's high-water mark,
//! fetch new messages, persist them idempotently, and enqueue to Q1.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use sentinel_core::domain::{email_id_for, IngestedAlert, RawEmail};

use crate::error::ServerError;
use crate::state::AppContext;

const WINDOW_FLOOR_FALLBACK_HOURS: i64 = 24;

/// Run one ingest pass: fetch everything since the last recorded run, persist
/// and enqueue each message, and record the new high-water mark.
///
/// Per-message failures (mailbox parse error, publish error) are logged and
/// skipped; they never abort the run.
pub async fn run_once(ctx: &AppContext, job_name: &str) -> Result<(), ServerError> {
    let start = Utc::now();
    // Each ingest pass is its own batch for in-batch dedup: the classifier
    // consumes messages enqueued from this run with a clean signature set.
    ctx.batch_dedup.reset();
    let since = window_floor(ctx, job_name).await;

    let messages = ctx.mailbox.fetch_since(since, &ctx.config.mailbox.address_allowlist).await?;

    let mut high_water = since;
    for message in &messages {
        if !ctx.config.mailbox.is_allowed(&message.sender) {
            continue;
        }

        match ingest_one(ctx, message).await {
            Ok(()) => {
                if message.received_at > high_water {
                    high_water = message.received_at;
                }
            }
            Err(e) => {
                warn!(subject = %message.subject, error = %e, "failed to ingest message, skipping");
            }
        }
    }

    let end = Utc::now();
    ctx.db
        .record_job_run(job_name, start, end, high_water, &ctx.config.scheduler.interval_unit)
        .await?;

    Ok(())
}

async fn ingest_one(ctx: &AppContext, message: &sentinel_connector::MailboxMessage) -> Result<(), ServerError> {
    let email_id = email_id_for(&message.subject, message.received_at);

    if let Some(existing) = ctx.db.get_raw_email(&email_id).await? {
        if existing.status {
            return Ok(());
        }
    }

    let email_path = persist_body(ctx, &email_id, &message.raw_bytes).await.ok();

    let raw = RawEmail {
        email_id: email_id.clone(),
        sender: message.sender.clone(),
        subject: message.subject.clone(),
        body: message.body.clone(),
        email_path,
        received_at: message.received_at,
        inserted_at: Utc::now(),
        status: false,
    };
    ctx.db.upsert_raw_email_if_absent(&raw).await?;

    let payload = IngestedAlert::from(&raw);
    let bytes = serde_json::to_vec(&payload)?;
    ctx.broker.publish(&ctx.broker.topology().class.name, &bytes, 0).await?;

    ctx.db.mark_raw_email_enqueued(&email_id).await?;
    Ok(())
}

async fn persist_body(ctx: &AppContext, email_id: &str, raw_bytes: &[u8]) -> Result<String, ServerError> {
    let path = format!("{}/{}.msg", ctx.storage_root.trim_end_matches('/'), email_id);
    tokio::fs::create_dir_all(&ctx.storage_root).await?;
    tokio::fs::write(&path, raw_bytes).await?;
    Ok(path)
}

async fn window_floor(ctx: &AppContext, job_name: &str) -> DateTime<Utc> {
    match ctx.db.latest_job_run(job_name).await {
        Ok(Some(job)) => job.last_run_time.unwrap_or_else(|| Utc::now() - Duration::hours(WINDOW_FLOOR_FALLBACK_HOURS)),
        Ok(None) => Utc::now() - Duration::hours(WINDOW_FLOOR_FALLBACK_HOURS),
        Err(e) => {
            warn!(error = %e, "could not read last job run, falling back to window floor");
            Utc::now() - Duration::hours(WINDOW_FLOOR_FALLBACK_HOURS)
        }
    }
}
