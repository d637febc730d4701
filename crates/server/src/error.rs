use thiserror::Error;

/// The server crate's own fallible operations. Broker/connector/notify
/// errors from the lower crates are wrapped rather than flattened, so a
/// caller can still match on their specific variants if needed.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("broker error: {0}")]
    Broker(#[from] sentinel_broker::error::BrokerError),

    #[error("connector error: {0}")]
    Connector(#[from] sentinel_connector::ConnectorError),

    #[error("text generation error: {0}")]
    TextGen(#[from] sentinel_textgen::TextGenError),

    #[error("notification error: {0}")]
    Notify(#[from] sentinel_notify::NotifyError),

    #[error("graph error: {0}")]
    Graph(#[from] sentinel_graph::error::GraphError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}
