//! Management service deployment.
//!
//! The management service lives outside any cluster and carries one
//! role per monitoring daemon. Role names are `{group}-{ordinal}` and
//! group configuration goes to `mgmt-{group}-BASE`. The run does not
//! proceed past this stage until the service reports STARTED.

use std::collections::BTreeSet;

use tracing::{debug, info};

use bringup_api::{ControlPlane, RunState};
use bringup_spec::ServiceSpec;

use crate::command;
use crate::error::{EngineError, EngineResult};
use crate::retry::RetryTunings;

/// Deploy and start the management service described by `spec`.
pub async fn deploy_mgmt<C: ControlPlane>(
    api: &C,
    spec: &ServiceSpec,
    tunings: &RetryTunings,
) -> EngineResult<()> {
    match api.get_mgmt_service().await {
        Ok(_) => debug!(stage = "MGMT", "management service already exists"),
        Err(err) if err.is_not_found() => {
            info!(stage = "MGMT", "creating management service");
            api.create_mgmt_service().await?;
        }
        Err(err) => return Err(err.into()),
    }

    let existing: BTreeSet<String> = api
        .list_mgmt_roles()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();

    for role in &spec.roles {
        for (idx, host) in role.hosts.iter().enumerate() {
            let name = format!("{}-{}", role.group, idx + 1);
            if !existing.contains(&name) {
                info!(stage = "MGMT", role = %name, host = %host, "creating role");
                api.create_mgmt_role(&name, &role.group, host).await?;
            }
        }
        if !role.config.is_empty() {
            let group = format!("mgmt-{}-BASE", role.group);
            api.update_mgmt_role_group_config(&group, &role.config).await?;
        }
    }

    start_mgmt(api, tunings).await
}

async fn start_mgmt<C: ControlPlane>(api: &C, tunings: &RetryTunings) -> EngineResult<()> {
    if api.get_mgmt_service().await?.state == RunState::Started {
        debug!(stage = "MGMT", "management service already started");
        return Ok(());
    }

    info!(stage = "MGMT", "starting management service");
    let cmd = api.start_mgmt_service().await?;
    command::wait(api, &cmd, tunings.command_timeout).await?;

    // Trust the fresh service state, not the command result.
    if api.get_mgmt_service().await?.state != RunState::Started {
        return Err(EngineError::MgmtNotStarted);
    }
    Ok(())
}
