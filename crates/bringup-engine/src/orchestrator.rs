//! The convergence run.
//!
//! Seven stages, each idempotent: license, cluster membership, parcels,
//! host inspection, management service, base services in strict order,
//! then everything else. A re-run after a failure walks the same
//! stages and falls through the ones that already converged.

use tracing::{debug, info, warn};

use bringup_api::ControlPlane;
use bringup_spec::{ClusterSpec, ServiceSpec, ServiceType, ADDITIONAL_SERVICES, BASE_SERVICES};

use crate::command::{self, NOT_AVAILABLE_MARKER};
use crate::error::{EngineError, EngineResult};
use crate::mgmt;
use crate::parcels::ParcelDistributor;
use crate::retry::{Outcome, RetryTunings};
use crate::service::ServiceHandle;
use crate::services;

/// Drives a cluster document to convergence against a control plane.
pub struct Orchestrator<'a, C: ControlPlane> {
    api: &'a C,
    spec: &'a ClusterSpec,
    trial: bool,
    license: Option<String>,
    tunings: RetryTunings,
}

impl<'a, C: ControlPlane> Orchestrator<'a, C> {
    pub fn new(api: &'a C, spec: &'a ClusterSpec) -> Self {
        Self {
            api,
            spec,
            trial: false,
            license: None,
            tunings: RetryTunings::default(),
        }
    }

    /// Fall back to a trial license when none is installed.
    pub fn with_trial(mut self, trial: bool) -> Self {
        self.trial = trial;
        self
    }

    /// License text to install when none is present.
    pub fn with_license(mut self, license: Option<String>) -> Self {
        self.license = license;
        self
    }

    pub fn with_tunings(mut self, tunings: RetryTunings) -> Self {
        self.tunings = tunings;
        self
    }

    /// Run every stage in order. Fatal errors unwind here; the caller
    /// reports them once.
    pub async fn run(&self) -> EngineResult<()> {
        self.enable_license().await?;
        self.ensure_cluster().await?;
        self.activate_parcels().await?;
        self.inspect_hosts().await?;

        if let Some(mgmt_spec) = self.spec.mgmt() {
            mgmt::deploy_mgmt(self.api, mgmt_spec, &self.tunings).await?;
        }

        self.converge_base().await?;
        self.converge_additional().await?;
        info!(cluster = %self.spec.cluster.name, "cluster converged");
        Ok(())
    }

    /// Install a license or begin a trial, then verify one took effect.
    /// Already-licensed control planes are left alone.
    async fn enable_license(&self) -> EngineResult<()> {
        match self.api.get_license().await {
            Ok(license) => {
                debug!(stage = "LICENSE", owner = %license.owner, "already licensed");
                return Ok(());
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(text) = &self.license {
            info!(stage = "LICENSE", "installing license");
            self.api.update_license(text).await?;
        } else if self.trial {
            info!(stage = "LICENSE", "beginning trial");
            self.api.begin_trial().await?;
        } else {
            return Err(EngineError::MissingLicense);
        }

        match self.api.get_license().await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Err(EngineError::LicenseNotEnabled),
            Err(err) => Err(err.into()),
        }
    }

    /// Create the cluster if needed and union in any hosts the document
    /// declares that the cluster does not yet have. Hosts are never
    /// removed.
    async fn ensure_cluster(&self) -> EngineResult<()> {
        let cluster = &self.spec.cluster;
        match self.api.get_cluster(&cluster.name).await {
            Ok(_) => debug!(stage = "CLUSTER", name = %cluster.name, "cluster already exists"),
            Err(err) if err.is_not_found() => {
                info!(stage = "CLUSTER", name = %cluster.name, "creating cluster");
                self.api
                    .create_cluster(&cluster.name, &cluster.version, &cluster.full_version)
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        let existing = self.api.list_cluster_hosts(&cluster.name).await?;
        let missing: Vec<String> = cluster
            .hosts
            .iter()
            .filter(|h| !existing.contains(h))
            .cloned()
            .collect();
        if !missing.is_empty() {
            info!(stage = "CLUSTER", hosts = ?missing, "adding hosts");
            self.api.add_cluster_hosts(&cluster.name, &missing).await?;
        }
        Ok(())
    }

    async fn activate_parcels(&self) -> EngineResult<()> {
        for parcel in &self.spec.parcels {
            ParcelDistributor::new(self.api, &self.spec.cluster.name, parcel, &self.tunings)
                .ensure_activated()
                .await?;
        }
        Ok(())
    }

    /// Trigger one fleet-wide host inspection and poll that command
    /// until it resolves. Still-running and "not available" results
    /// are worth waiting out; a command that resolves to any other
    /// failure is not.
    async fn inspect_hosts(&self) -> EngineResult<()> {
        info!(stage = "INSPECT", "inspecting hosts");
        let cmd = self.api.inspect_hosts().await?;
        let cmd = &cmd;
        self.tunings
            .host_inspect
            .run(|| async move {
                let status = match self.api.command_status(cmd.id).await {
                    Ok(status) => status,
                    Err(err) => return Outcome::Fatal(err.into()),
                };
                match status.success {
                    Some(true) => Outcome::Done(()),
                    None => Outcome::Transient(EngineError::InspectionFailed {
                        message: "still waiting on host inspection".to_string(),
                    }),
                    Some(false) => {
                        let message = status.message().to_string();
                        let err = EngineError::InspectionFailed { message: message.clone() };
                        if message.contains(NOT_AVAILABLE_MARKER) {
                            Outcome::Transient(err)
                        } else {
                            Outcome::Fatal(err)
                        }
                    }
                }
            })
            .await
    }

    /// Base services carry the dependencies of everything else and come
    /// up one at a time, each through its full lifecycle, in a fixed
    /// order.
    async fn converge_base(&self) -> EngineResult<()> {
        for ty in BASE_SERVICES {
            let Some(service_spec) = self.spec.service(*ty) else {
                warn!(service = ty.name(), "base service not declared, skipping");
                continue;
            };
            self.converge_service(*ty, service_spec).await?;
        }
        Ok(())
    }

    /// Remaining services deploy and prepare as a batch, share one
    /// cluster-wide client configuration deploy, then start.
    async fn converge_additional(&self) -> EngineResult<()> {
        let mut to_start = Vec::new();
        for ty in ADDITIONAL_SERVICES {
            let Some(service_spec) = self.spec.service(*ty) else {
                continue;
            };
            let svc = ServiceHandle::new(
                self.api,
                &self.spec.cluster.name,
                *ty,
                service_spec,
                &self.tunings,
            );
            if started(&svc).await? {
                debug!(service = svc.name(), "already converged");
                continue;
            }
            svc.ensure_deployed().await?;
            services::pre_start(&svc).await?;
            to_start.push(svc);
        }

        if to_start.is_empty() {
            return Ok(());
        }

        match self.api.deploy_client_config(&self.spec.cluster.name).await {
            Ok(cmd) => {
                command::run_bulk(
                    self.api,
                    vec![cmd],
                    self.tunings.command_timeout,
                    "client configuration deploy failed",
                )
                .await?;
            }
            Err(err) => {
                warn!(error = %err, "client configuration deploy could not be issued");
            }
        }

        for svc in &to_start {
            svc.start().await?;
            services::post_start(svc).await?;
        }
        Ok(())
    }

    async fn converge_service(&self, ty: ServiceType, spec: &ServiceSpec) -> EngineResult<()> {
        let svc = ServiceHandle::new(self.api, &self.spec.cluster.name, ty, spec, &self.tunings);
        if started(&svc).await? {
            debug!(service = svc.name(), "already converged");
            return Ok(());
        }
        svc.ensure_deployed().await?;
        services::pre_start(&svc).await?;
        svc.start().await?;
        services::post_start(&svc).await?;
        Ok(())
    }
}

/// Started predicate that treats a missing service entity as not
/// started rather than an error.
async fn started<C: ControlPlane>(svc: &ServiceHandle<'_, C>) -> EngineResult<bool> {
    match svc.is_started().await {
        Ok(started) => Ok(started),
        Err(EngineError::Api(err)) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}
