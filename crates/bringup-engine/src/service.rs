//! Shared service lifecycle plumbing.
//!
//! Every service type deploys, verifies, and starts the same way; the
//! differences between types live in the catalog and hooks under
//! [`crate::services`]. Role and role-group names are deterministic so
//! a re-run finds the entities a previous run created.

use tracing::{debug, info};

use bringup_api::{ControlPlane, RunState};
use bringup_spec::{RoleSpec, ServiceSpec, ServiceType};

use crate::command::{self, ALREADY_PENDING_MARKER, NOT_AVAILABLE_MARKER};
use crate::error::{EngineError, EngineResult};
use crate::retry::{Outcome, RetryTunings};
use crate::services::{self, InitCommand};

/// One declared service bound to a cluster and a control plane.
pub struct ServiceHandle<'a, C: ControlPlane> {
    api: &'a C,
    cluster: &'a str,
    ty: ServiceType,
    spec: &'a ServiceSpec,
    tunings: &'a RetryTunings,
}

impl<'a, C: ControlPlane> ServiceHandle<'a, C> {
    pub fn new(
        api: &'a C,
        cluster: &'a str,
        ty: ServiceType,
        spec: &'a ServiceSpec,
        tunings: &'a RetryTunings,
    ) -> Self {
        Self {
            api,
            cluster,
            ty,
            spec,
            tunings,
        }
    }

    pub fn service_type(&self) -> ServiceType {
        self.ty
    }

    /// Canonical entity name, e.g. `ZOOKEEPER`.
    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub(crate) fn api(&self) -> &'a C {
        self.api
    }

    pub(crate) fn cluster(&self) -> &'a str {
        self.cluster
    }

    pub(crate) fn tunings(&self) -> &'a RetryTunings {
        self.tunings
    }

    /// Create the service entity, push its configuration, and ensure
    /// every declared role exists on its host.
    pub async fn ensure_deployed(&self) -> EngineResult<()> {
        match self.api.get_service(self.cluster, self.name()).await {
            Ok(_) => {
                debug!(service = self.name(), "service already exists");
            }
            Err(err) if err.is_not_found() => {
                info!(stage = self.name(), "creating service");
                self.api
                    .create_service(self.cluster, self.name(), self.name())
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        if !self.spec.config.is_empty() {
            self.api
                .update_service_config(self.cluster, self.name(), &self.spec.config)
                .await?;
        }

        for role in &self.spec.roles {
            self.ensure_role_group(role).await?;
        }
        Ok(())
    }

    /// Push the role group's configuration and create its per-host role
    /// instances, named `{SERVICE}-{group}-{ordinal}` with 1-based
    /// ordinals following host order in the declaration.
    async fn ensure_role_group(&self, role: &RoleSpec) -> EngineResult<()> {
        let group = format!("{}-{}-BASE", self.name(), role.group);
        if !role.config.is_empty() {
            self.api
                .update_role_group_config(self.cluster, self.name(), &group, &role.config)
                .await?;
        }

        for (idx, host) in role.hosts.iter().enumerate() {
            let ordinal = idx + 1;
            let role_name = format!("{}-{}-{}", self.name(), role.group, ordinal);
            match self
                .api
                .get_role(self.cluster, self.name(), &role_name)
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    info!(stage = self.name(), role = %role_name, host = %host, "creating role");
                    self.api
                        .create_role(self.cluster, self.name(), &role_name, &role.group, host)
                        .await?;
                }
                Err(err) => return Err(err.into()),
            }

            // Pushed whether the role was found or created: a run that
            // stopped between the two calls must still converge.
            let overrides = services::role_config_overrides(self.ty, &role.group, ordinal);
            if !overrides.is_empty() {
                self.api
                    .update_role_config(self.cluster, self.name(), &role_name, &overrides)
                    .await?;
            }
        }
        Ok(())
    }

    /// A service counts as started only when the service aggregate is
    /// STARTED and every non-gateway role is too.
    pub async fn is_started(&self) -> EngineResult<bool> {
        let service = self.api.get_service(self.cluster, self.name()).await?;
        if service.state != RunState::Started {
            return Ok(false);
        }
        let roles = self.api.list_roles(self.cluster, self.name()).await?;
        Ok(roles
            .iter()
            .filter(|r| !r.is_gateway())
            .all(|r| r.state == RunState::Started))
    }

    /// Start the service and wait until it reports started.
    ///
    /// "Already pending" and "not available" results are transient: a
    /// concurrent or half-finished start will resolve, so re-issue
    /// under the start policy. Other failures are fatal. The started
    /// predicate is re-checked on fresh state after the command, never
    /// assumed from command success.
    pub async fn start(&self) -> EngineResult<()> {
        if self.is_started().await? {
            debug!(service = self.name(), "service already started");
            return Ok(());
        }

        info!(stage = self.name(), "starting service");
        self.tunings
            .service_start
            .run(|| async move {
                let cmd = match self.api.start_service(self.cluster, self.name()).await {
                    Ok(cmd) => cmd,
                    Err(err) => return Outcome::Fatal(err.into()),
                };
                let status = match command::wait(self.api, &cmd, self.tunings.command_timeout).await
                {
                    Ok(status) => status,
                    Err(err) => return Outcome::Fatal(err),
                };

                if !status.succeeded() {
                    let message = status.message().to_string();
                    let err = EngineError::StartFailed {
                        service: self.name().to_string(),
                        message: message.clone(),
                    };
                    if message.contains(ALREADY_PENDING_MARKER)
                        || message.contains(NOT_AVAILABLE_MARKER)
                    {
                        return Outcome::Transient(err);
                    }
                    return Outcome::Fatal(err);
                }

                match self.is_started().await {
                    Ok(true) => Outcome::Done(()),
                    Ok(false) => Outcome::Transient(EngineError::StartFailed {
                        service: self.name().to_string(),
                        message: "not all roles reached STARTED".to_string(),
                    }),
                    Err(err) => Outcome::Fatal(err),
                }
            })
            .await
    }

    /// Run one catalog init command against the service.
    pub async fn run_init(&self, init: &InitCommand) -> EngineResult<()> {
        let fail_msg = format!("command {} failed", init.name);
        command::run_retrying(
            self.api,
            self.tunings.command,
            init.timeout,
            &fail_msg,
            init.essential,
            || self.api.service_command(self.cluster, self.name(), init.name),
        )
        .await
    }
}
