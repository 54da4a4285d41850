//! Client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or non-2xx status.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Exchange answered `{"status":"err"}`.
    #[error("Exchange rejected request: {0}")]
    Rejected(String),

    /// Body did not match the expected shape.
    #[error("Response parse error: {0}")]
    Parse(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
