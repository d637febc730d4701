//! Chat-webhook delivery: POST an adaptive-card JSON document to a team's
//! configured webhook URL.
//!
//! Env-var resolution (`${VAR_NAME}`) in the URL is kept from the teacher's
//! generic webhook notifier — team webhook URLs are sourced from
//! `WEBHOOK_TEAM_<NAME>` and may themselves reference a secret-store env var.

use serde_json::Value;

use crate::error::NotifyError;

#[derive(Debug)]
pub struct ChatNotifier {
    client: reqwest::Client,
}

impl Default for ChatNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatNotifier {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    /// POST `card` to `url` (already resolved). A non-2xx response is
    /// reported as an error; per spec §4.5 the caller logs and moves on
    /// rather than failing the actioner stage on notification failure.
    pub async fn post_card(&self, url: &str, card: &Value) -> Result<(), NotifyError> {
        let resolved = resolve_env_vars(url)?;

        let response = self
            .client
            .post(&resolved)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(card)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %resolved, %status, body = %body, "chat webhook returned non-2xx status");
            return Err(NotifyError::Config(format!("webhook returned {status}: {body}")));
        }

        tracing::debug!(url = %resolved, %status, "chat notification delivered");
        Ok(())
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!("unclosed env var reference in: {input}")));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("NOTIFY_TEST_HOST", "example.com");
        let result = resolve_env_vars("https://${NOTIFY_TEST_HOST}/hook").unwrap();
        assert_eq!(result, "https://example.com/hook");
        std::env::remove_var("NOTIFY_TEST_HOST");
    }

    #[test]
    fn resolve_env_vars_missing() {
        let result = resolve_env_vars("https://${ABSOLUTELY_NOT_SET_12345}/hook");
        assert!(result.is_err());
    }

    #[test]
    fn resolve_env_vars_unclosed() {
        let result = resolve_env_vars("https://${UNCLOSED/hook");
        assert!(result.is_err());
    }

    #[test]
    fn resolve_env_vars_no_vars() {
        let result = resolve_env_vars("https://plain.example.com/hook").unwrap();
        assert_eq!(result, "https://plain.example.com/hook");
    }
}
