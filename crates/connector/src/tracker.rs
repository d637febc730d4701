//! Issue-tracker client: the five REST operations the actioner needs,
//! documented in spec §6. Concrete implementation targets a Jira-shaped
//! REST API (create/get/update issue, attach file, search users by email);
//! any tracker exposing the same five operations can sit behind
//! `IssueTracker` with no change to the actioner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ConnectorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueStatus {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDetails {
    pub key: String,
    pub status: IssueStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerUser {
    pub account_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct NewIssue<'a> {
    pub project_key: &'a str,
    pub summary: &'a str,
    pub description: &'a str,
    pub issue_type: &'a str,
    /// Tracker-native priority name (already mapped by the caller).
    pub priority: &'a str,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, issue: NewIssue<'_>) -> Result<String, ConnectorError>;
    async fn get_issue(&self, ticket_key: &str) -> Result<IssueDetails, ConnectorError>;
    async fn update_issue(&self, ticket_key: &str, fields: serde_json::Value) -> Result<(), ConnectorError>;
    async fn add_attachment(&self, ticket_key: &str, filename: &str, bytes: Vec<u8>) -> Result<(), ConnectorError>;
    async fn search_users(&self, email: &str) -> Result<Vec<TrackerUser>, ConnectorError>;
}

/// Statuses that count as "still open" for cross-ticket dedup (spec §4.5).
pub const OPEN_STATUSES: &[&str] = &[
    "open",
    "in progress",
    "to do",
    "new",
    "reopened",
    "pending",
    "waiting",
    "in review",
];

pub fn is_open_status(status_name: &str) -> bool {
    let lowered = status_name.to_lowercase();
    OPEN_STATUSES.contains(&lowered.as_str())
}

pub struct JiraTracker {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraTracker {
    pub fn new(base_url: String, email: String, api_token: String) -> Self {
        Self { client: reqwest::Client::new(), base_url, email, api_token }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl IssueTracker for JiraTracker {
    async fn create_issue(&self, issue: NewIssue<'_>) -> Result<String, ConnectorError> {
        let body = json!({
            "fields": {
                "project": { "key": issue.project_key },
                "summary": issue.summary,
                "description": issue.description,
                "issuetype": { "name": issue.issue_type },
                "priority": { "name": issue.priority },
            }
        });

        let response = self
            .client
            .post(self.url("/rest/api/2/issue"))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::TrackerApi { status: status.as_u16(), body: text });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| ConnectorError::Parse(e.to_string()))?;
        parsed["key"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ConnectorError::Parse("create_issue response missing 'key'".to_string()))
    }

    async fn get_issue(&self, ticket_key: &str) -> Result<IssueDetails, ConnectorError> {
        let response = self
            .client
            .get(self.url(&format!("/rest/api/2/issue/{ticket_key}")))
            .basic_auth(&self.email, Some(&self.api_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::TrackerApi { status: status.as_u16(), body: text });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| ConnectorError::Parse(e.to_string()))?;
        let status_name = parsed["fields"]["status"]["name"]
            .as_str()
            .ok_or_else(|| ConnectorError::Parse("get_issue response missing fields.status.name".to_string()))?
            .to_string();

        Ok(IssueDetails { key: ticket_key.to_string(), status: IssueStatus { name: status_name } })
    }

    async fn update_issue(&self, ticket_key: &str, fields: serde_json::Value) -> Result<(), ConnectorError> {
        let response = self
            .client
            .put(self.url(&format!("/rest/api/2/issue/{ticket_key}")))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::TrackerApi { status: status.as_u16(), body: text });
        }
        Ok(())
    }

    async fn add_attachment(&self, ticket_key: &str, filename: &str, bytes: Vec<u8>) -> Result<(), ConnectorError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(&format!("/rest/api/2/issue/{ticket_key}/attachments")))
            .basic_auth(&self.email, Some(&self.api_token))
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::TrackerApi { status: status.as_u16(), body: text });
        }
        Ok(())
    }

    async fn search_users(&self, email: &str) -> Result<Vec<TrackerUser>, ConnectorError> {
        let response = self
            .client
            .get(self.url("/rest/api/2/user/search"))
            .query(&[("query", email), ("maxResults", "1")])
            .basic_auth(&self.email, Some(&self.api_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::TrackerApi { status: status.as_u16(), body: text });
        }

        let parsed: Vec<serde_json::Value> = response.json().await.map_err(|e| ConnectorError::Parse(e.to_string()))?;
        Ok(parsed
            .into_iter()
            .filter_map(|v| {
                Some(TrackerUser {
                    account_id: v["accountId"].as_str()?.to_string(),
                    display_name: v["displayName"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_statuses_match_case_insensitively() {
        assert!(is_open_status("Open"));
        assert!(is_open_status("IN PROGRESS"));
        assert!(is_open_status("in review"));
        assert!(!is_open_status("Done"));
        assert!(!is_open_status("Closed"));
        assert!(!is_open_status("Resolved"));
    }
}
