//! Control-plane error types.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by control-plane operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested entity does not exist. Callers use this for
    /// lookup-or-create flows; it is not inherently fatal.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("control plane request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected control plane response ({status}): {body}")]
    Unexpected { status: u16, body: String },
}

impl ApiError {
    /// True when the error is an entity lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
