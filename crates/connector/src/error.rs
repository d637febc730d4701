use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker returned status {status}: {body}")]
    TrackerApi { status: u16, body: String },

    #[error("mailbox connector error: {0}")]
    Mailbox(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("connector not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
