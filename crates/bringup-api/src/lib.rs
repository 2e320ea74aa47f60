//! Control-plane interface for cluster bring-up.
//!
//! The cluster manager is the system of record: every entity exposed
//! here (parcel, service, role, command) is a proxy that callers
//! re-fetch rather than cache, because the control plane mutates them
//! asynchronously and out-of-band partial runs may have advanced them
//! already.
//!
//! The [`ControlPlane`] trait covers exactly the operations the
//! convergence engine needs. [`HttpControlPlane`] talks to a live
//! manager over its REST API; [`testing::FakeControlPlane`] is an
//! in-memory scriptable implementation for tests.

mod error;
mod http;
mod plane;
pub mod testing;
mod types;

pub use error::{ApiError, ApiResult};
pub use http::HttpControlPlane;
pub use plane::{ControlPlane, REMOTE_PARCEL_REPO_URLS};
pub use types::{
    ClusterInfo, CommandRef, CommandStatus, ConfigValue, LicenseInfo, ParcelInfo, ParcelStage,
    RoleInfo, RunState, ServiceInfo, GATEWAY_ROLE_TYPE,
};
