use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("raw email not found: {0}")]
    RawEmailNotFound(String),

    #[error("trigger mapping not found for: {0}")]
    TriggerMappingNotFound(String),

    #[error("server not found: {0}")]
    ServerNotFound(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}
