use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator returned status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("failed to parse generator response: {0}")]
    ParseError(String),

    #[error("generator not configured")]
    NotConfigured,
}
