//! Minijinja rendering for the chat notification's intro paragraph.
//!
//! A fresh [`minijinja::Environment`] is built per render call, same as the
//! teacher's notifier: the greeting line is a short operator-configurable
//! string, not a pre-registered template file.

use crate::error::NotifyError;

/// Context available to the greeting-line template.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GreetingContext {
    /// The resolved assignee's display name, or `None` if the router
    /// couldn't resolve one — templates should use `| or_team` on this.
    pub assignee: Option<String>,
    pub trigger_name: String,
    pub resource_name: String,
    pub priority: String,
}

pub const DEFAULT_GREETING_TEMPLATE: &str = "Hi {{ assignee | or_team }}, a new {{ priority | upper }} alert needs your attention.";

#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("or_team", or_team_filter);
        env.add_filter("upper", upper_filter);
        env.add_filter("lower", lower_filter);
        env.add_function("env", env_function);
        env
    }

    pub fn render(&self, template_str: &str, ctx: &GreetingContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

/// `{{ assignee | or_team }}` — the resolved assignee's name, or the literal
/// `"Team"` when the router couldn't resolve one. Grounded on spec §4.5's
/// greeting fallback rule.
fn or_team_filter(value: Option<String>) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Team".to_string())
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "environment variable not found, returning empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(assignee: Option<&str>) -> GreetingContext {
        GreetingContext {
            assignee: assignee.map(|s| s.to_string()),
            trigger_name: "High CPU".to_string(),
            resource_name: "hostA".to_string(),
            priority: "p1".to_string(),
        }
    }

    #[test]
    fn greets_resolved_assignee_by_name() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render(DEFAULT_GREETING_TEMPLATE, &ctx(Some("Jane Doe"))).unwrap();
        assert_eq!(result, "Hi Jane Doe, a new P1 alert needs your attention.");
    }

    #[test]
    fn falls_back_to_team_when_unresolved() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render(DEFAULT_GREETING_TEMPLATE, &ctx(None)).unwrap();
        assert_eq!(result, "Hi Team, a new P1 alert needs your attention.");
    }

    #[test]
    fn falls_back_to_team_on_empty_string() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render(DEFAULT_GREETING_TEMPLATE, &ctx(Some(""))).unwrap();
        assert_eq!(result, "Hi Team, a new P1 alert needs your attention.");
    }

    #[test]
    fn validate_rejects_malformed_template() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.validate("{{ unclosed").is_err());
    }

    #[test]
    fn env_function_missing_returns_empty() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("[{{ env('DEFINITELY_NOT_SET_XYZ') }}]", &ctx(None)).unwrap();
        assert_eq!(result, "[]");
    }
}
