//! Desired-state document for a cluster bring-up run.
//!
//! A run is driven by a single `cluster.yaml` document describing the
//! control-plane endpoint, the cluster identity and host inventory, the
//! parcels to activate, and the per-service role layout. The document is
//! loaded once, validated before any control-plane mutation, and treated
//! as immutable for the rest of the run.

mod error;
mod model;
mod service_type;

pub use error::{SpecError, SpecResult};
pub use model::{
    ClusterConfig, ClusterSpec, CmConfig, ConfigMap, ParcelSpec, RoleSpec, ServiceSpec,
};
pub use service_type::{ServiceType, ADDITIONAL_SERVICES, BASE_SERVICES, MGMT_SERVICE_KEY};
