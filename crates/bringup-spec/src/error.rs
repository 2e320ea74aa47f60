//! Error types for spec loading and validation.

use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors raised while loading or validating a cluster document.
///
/// All of these are configuration errors: fatal, never retried, and
/// surfaced verbatim to the invoker.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read cluster document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse cluster document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown service type: {0}")]
    UnknownService(String),

    #[error("[{0}] at least one role must be declared per service")]
    NoRoles(String),

    #[error("[{0}] both group and hosts must be specified per role")]
    InvalidRole(String),

    #[error("cluster host list is empty")]
    NoHosts,
}
