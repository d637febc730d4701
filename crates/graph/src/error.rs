//! Graph/maintenance error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("maintenance source error: {0}")]
    Source(String),
}
