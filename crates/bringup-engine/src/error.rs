//! Engine error types.
//!
//! The taxonomy follows the run's failure semantics: configuration
//! errors and terminal parcel errors are fatal and never retried;
//! transient control-plane conditions are raised as errors only after
//! the relevant bounded retry policy is exhausted; everything
//! unclassified fails closed.

use thiserror::Error;

use bringup_api::ApiError;
use bringup_spec::SpecError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort a convergence run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("parcel {product}-{version} reported errors: {errors:?}")]
    ParcelErrors {
        product: String,
        version: String,
        errors: Vec<String>,
    },

    #[error(
        "no configured repository serves parcel {product} {version}; \
         specify a parcel repo in the cluster document"
    )]
    MissingParcelRepo { product: String, version: String },

    #[error("still waiting on parcel {product}-{version} to reach {want}")]
    ParcelNotReady {
        product: String,
        version: String,
        want: String,
    },

    #[error("command {name} failed: {message}")]
    CommandFailed { name: String, message: String },

    #[error("service {service} failed to start: {message}")]
    StartFailed { service: String, message: String },

    #[error("host inspection failed: {message}")]
    InspectionFailed { message: String },

    #[error("management services did not start up properly")]
    MgmtNotStarted,

    #[error("a license must be provided or trial mode enabled")]
    MissingLicense,

    #[error("failed to enable license")]
    LicenseNotEnabled,
}
