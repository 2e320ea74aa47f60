//! Cluster bring-up convergence engine.
//!
//! Takes a validated [`bringup_spec::ClusterSpec`] and a
//! [`bringup_api::ControlPlane`] and drives the live cluster toward the
//! declared state: license, hosts, parcels, management service, then
//! every declared service deployed, initialized, and started. Every
//! stage is idempotent, so a failed run is fixed by fixing the cause
//! and running again.

pub mod command;
mod error;
pub mod mgmt;
mod orchestrator;
pub mod parcels;
mod retry;
pub mod service;
pub mod services;

pub use error::{EngineError, EngineResult};
pub use orchestrator::Orchestrator;
pub use retry::{Outcome, RetryPolicy, RetryTunings};
