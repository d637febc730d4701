//! Adaptive-card JSON payload for the chat notification.
//!
//! Fixed structure per spec §4.5/§6: a header block, an intro paragraph
//! greeting the assignee, a two-column fact table, and an optional
//! action-button block linking to the created ticket.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::NotifyError;
use crate::templating::{GreetingContext, TemplateRenderer, DEFAULT_GREETING_TEMPLATE};

/// Everything the card needs to render; callers assemble this from the
/// `ClassifiedAlert`, the tracker's response, and the router's resolution.
#[derive(Debug, Clone)]
pub struct CardInput {
    pub source: String,
    pub resource: String,
    pub trigger: String,
    pub priority: String,
    pub timestamp: DateTime<Utc>,
    pub infrastructure: String,
    pub assignee: Option<String>,
    pub ticket_key: Option<String>,
    pub ticket_url: Option<String>,
}

/// Build the adaptive-card document. Rendering the greeting line is the
/// only fallible step (a malformed operator-configured template); everything
/// else is plain JSON assembly.
pub fn build_card(input: &CardInput, greeting_template: &str) -> Result<Value, NotifyError> {
    let renderer = TemplateRenderer::new();
    let greeting = renderer.render(
        greeting_template,
        &GreetingContext {
            assignee: input.assignee.clone(),
            trigger_name: input.trigger.clone(),
            resource_name: input.resource.clone(),
            priority: input.priority.clone(),
        },
    )?;

    let body = vec![
        json!({
            "type": "TextBlock",
            "text": format!("{} alert: {}", input.priority, input.trigger),
            "weight": "Bolder",
            "size": "Large",
            "wrap": true,
        }),
        json!({
            "type": "TextBlock",
            "text": greeting,
            "wrap": true,
        }),
        json!({
            "type": "FactSet",
            "facts": [
                {"title": "Source", "value": input.source},
                {"title": "Resource", "value": input.resource},
                {"title": "Trigger", "value": input.trigger},
                {"title": "Priority", "value": input.priority},
                {"title": "Timestamp", "value": input.timestamp.to_rfc3339()},
                {"title": "Infrastructure", "value": input.infrastructure},
                {"title": "Ticket", "value": input.ticket_key.clone().unwrap_or_else(|| "none".to_string())},
            ],
        }),
    ];

    let mut card = json!({
        "type": "AdaptiveCard",
        "version": "1.4",
        "body": body,
    });

    if let (Some(url), Some(key)) = (&input.ticket_url, &input.ticket_key) {
        card["actions"] = json!([{
            "type": "Action.OpenUrl",
            "title": format!("View {key}"),
            "url": url,
        }]);
    }

    Ok(card)
}

pub fn default_greeting_template() -> &'static str {
    DEFAULT_GREETING_TEMPLATE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CardInput {
        CardInput {
            source: "ControlUp".to_string(),
            resource: "hostA".to_string(),
            trigger: "High CPU".to_string(),
            priority: "P1".to_string(),
            timestamp: "2025-01-07T10:00:00Z".parse().unwrap(),
            infrastructure: "SAP Basis".to_string(),
            assignee: Some("Jane Doe".to_string()),
            ticket_key: Some("OPS-123".to_string()),
            ticket_url: Some("https://tracker.example.com/browse/OPS-123".to_string()),
        }
    }

    #[test]
    fn builds_header_and_fact_table() {
        let card = build_card(&input(), DEFAULT_GREETING_TEMPLATE).unwrap();
        assert_eq!(card["type"], "AdaptiveCard");
        let facts = card["body"][2]["facts"].as_array().unwrap();
        assert_eq!(facts.len(), 7);
        assert_eq!(facts[0]["title"], "Source");
        assert_eq!(facts[6]["title"], "Ticket");
        assert_eq!(facts[6]["value"], "OPS-123");
    }

    #[test]
    fn action_button_present_when_ticket_created() {
        let card = build_card(&input(), DEFAULT_GREETING_TEMPLATE).unwrap();
        assert_eq!(card["actions"][0]["url"], "https://tracker.example.com/browse/OPS-123");
    }

    #[test]
    fn no_action_button_without_a_ticket() {
        let mut i = input();
        i.ticket_key = None;
        i.ticket_url = None;
        let card = build_card(&i, DEFAULT_GREETING_TEMPLATE).unwrap();
        assert!(card.get("actions").is_none());
    }

    #[test]
    fn greets_team_when_assignee_unresolved() {
        let mut i = input();
        i.assignee = None;
        let card = build_card(&i, DEFAULT_GREETING_TEMPLATE).unwrap();
        let greeting = card["body"][1]["text"].as_str().unwrap();
        assert!(greeting.starts_with("Hi Team,"));
    }
}
