//! Q3 consumer: cross-ticket dedup, ticket creation, assignment, attachment,
//! persistence, and chat notification. Grounded on spec §4.5.

use std::sync::Arc;

use sentinel_connector::NewIssue;
use sentinel_core::domain::{ClassifiedAlert, DuplicateEmail, JiraEntry};
use sentinel_notify::{build_card, default_greeting_template, CardInput};
use tracing::{info, warn};

use crate::dedup::{check_cross_ticket_dedup, CrossTicketDecision};
use crate::pipeline::Outcome;
use crate::state::AppContext;

pub async fn handle(ctx: Arc<AppContext>, payload: Vec<u8>, _retries: u32) -> Outcome {
    let classified: ClassifiedAlert = match serde_json::from_slice(&payload) {
        Ok(v) => v,
        Err(e) => return Outcome::Fatal(format!("malformed Q3 payload: {e}")),
    };

    match act(&ctx, classified).await {
        Ok(()) => Outcome::Done,
        Err(e) => Outcome::Retry(e.to_string()),
    }
}

/// Map our internal priority label to the tracker's priority name.
fn tracker_priority(priority: &str) -> &'static str {
    match priority {
        "P1" => "Highest",
        "P2" => "High",
        "P3" => "Medium",
        "Informational" => "Low",
        "NA" => "Lowest",
        _ => "Medium",
    }
}

async fn act(ctx: &AppContext, classified: ClassifiedAlert) -> Result<(), crate::error::ServerError> {
    let decision = check_cross_ticket_dedup(
        &ctx.db,
        ctx.tracker.as_ref(),
        &classified.trigger_name,
        &classified.resource_name,
        &classified.email_id,
    )
    .await?;

    let prior_email_id = match decision {
        CrossTicketDecision::Suppress { prior_email_id, prior_ticket_key } => {
            let duplicate = DuplicateEmail {
                email_id: prior_email_id.clone(),
                duplicate_email_id: classified.email_id.clone(),
                subject: classified.subject.clone(),
                body: classified.body.clone(),
                sender: classified.sender.clone(),
                received_at: classified.received_at,
                inserted_at: chrono::Utc::now(),
            };
            ctx.db.insert_duplicate(&duplicate).await?;
            info!(email_id = %classified.email_id, prior_ticket_key, "suppressed, open prior ticket exists");
            return Ok(());
        }
        CrossTicketDecision::CreateNew => None,
    };
    let _ = prior_email_id;

    let summary = ctx.db.get_summary(&classified.email_id).await?;
    let description = summary.map(|s| s.summary).unwrap_or_else(|| format!("{} on {}.", classified.trigger_name, classified.resource_name));

    let matched = ctx.router.match_trigger(&classified.trigger_name);

    let new_issue = NewIssue {
        project_key: &ctx.config.tracker.project_key,
        summary: &format!("{} - {}", classified.trigger_name, classified.resource_name),
        description: &description,
        issue_type: &ctx.config.tracker.issue_type,
        priority: tracker_priority(&classified.priority),
    };
    let ticket_key = ctx.tracker.create_issue(new_issue).await?;

    let assignee = assign_team(ctx, &ticket_key, &matched.team, matched.responsible_person.as_deref()).await;

    attach_original_message(ctx, &ticket_key, &classified).await;

    let jira_entry = JiraEntry {
        jira_id: 0,
        email_id: classified.email_id.clone(),
        jiraticket_id: ticket_key.clone(),
        assigned_to: assignee.clone(),
        created_at: chrono::Utc::now(),
        teams_flag: matched.team.clone(),
        teams_channel: ctx.router.resolve_channel(&matched.team),
        inserted_at: chrono::Utc::now(),
    };
    ctx.db.insert_jira_entry(&jira_entry).await?;

    notify(ctx, &classified, &matched.team, &ticket_key, assignee.as_deref()).await;

    info!(email_id = %classified.email_id, ticket_key, "ticket created and actioned");
    Ok(())
}

/// Resolve the team's external UUID and the matched trigger's responsible
/// person, then assign the ticket to that person's tracker account. A
/// missing UUID mapping or responsible person skips assignment entirely
/// (spec §9 Open Question 3) rather than failing ticket creation.
async fn assign_team(ctx: &AppContext, ticket_key: &str, team: &str, responsible_person: Option<&str>) -> Option<String> {
    let _team_uuid = ctx.router.team_uuid_for(team)?;
    let responsible_person = responsible_person?;

    let users = ctx.tracker.search_users(responsible_person).await.ok()?;
    let user = users.into_iter().next()?;

    if let Err(e) = ctx
        .tracker
        .update_issue(ticket_key, serde_json::json!({ "assignee": { "accountId": user.account_id } }))
        .await
    {
        warn!(ticket_key, error = %e, "failed to assign ticket");
        return None;
    }

    Some(user.display_name)
}

/// Attach the original message file, if present and non-empty. Missing or
/// empty files are logged but non-fatal per spec §4.5.
async fn attach_original_message(ctx: &AppContext, ticket_key: &str, classified: &ClassifiedAlert) {
    let raw = match ctx.db.get_raw_email(&classified.email_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return,
        Err(e) => {
            warn!(ticket_key, error = %e, "could not load raw email for attachment");
            return;
        }
    };

    let Some(path) = raw.email_path else { return };

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) if !b.is_empty() => b,
        Ok(_) => {
            warn!(ticket_key, path, "attachment file is empty, skipping");
            return;
        }
        Err(e) => {
            warn!(ticket_key, path, error = %e, "attachment file missing, skipping");
            return;
        }
    };

    let filename = format!("{}.msg", classified.email_id);
    if let Err(e) = ctx.tracker.add_attachment(ticket_key, &filename, bytes).await {
        warn!(ticket_key, error = %e, "failed to attach original message");
    }
}

async fn notify(ctx: &AppContext, classified: &ClassifiedAlert, team: &str, ticket_key: &str, assignee: Option<&str>) {
    let Some(webhook_url) = ctx.router.resolve_channel(team) else { return };

    let ticket_url = ctx.config.tracker.base_url.as_ref().map(|base| format!("{}/browse/{}", base.trim_end_matches('/'), ticket_key));

    let input = CardInput {
        source: "ControlUp".to_string(),
        resource: classified.resource_name.clone(),
        trigger: classified.trigger_name.clone(),
        priority: classified.priority.clone(),
        timestamp: classified.received_at,
        infrastructure: team.to_string(),
        assignee: assignee.map(|s| s.to_string()),
        ticket_key: Some(ticket_key.to_string()),
        ticket_url,
    };

    let card = match build_card(&input, default_greeting_template()) {
        Ok(c) => c,
        Err(e) => {
            warn!(ticket_key, error = %e, "failed to build notification card");
            return;
        }
    };

    if let Err(e) = ctx.notifier.post_card(&webhook_url, &card).await {
        warn!(ticket_key, error = %e, "failed to post chat notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_priority_to_tracker_names() {
        assert_eq!(tracker_priority("P1"), "Highest");
        assert_eq!(tracker_priority("P2"), "High");
        assert_eq!(tracker_priority("P3"), "Medium");
        assert_eq!(tracker_priority("Informational"), "Low");
        assert_eq!(tracker_priority("NA"), "Lowest");
        assert_eq!(tracker_priority("unknown"), "Medium");
    }
}
