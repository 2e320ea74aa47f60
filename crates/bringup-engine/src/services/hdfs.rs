//! HDFS first-start preparation.
//!
//! The filesystem must be formatted exactly once, and a high-availability
//! deployment needs its journal quorum and standby namenode brought up in
//! a strict order before the service-level start. Every step here is
//! best-effort: on a re-run the format and bootstrap commands fail with
//! "already formatted"-style results and the run converges past them.

use tracing::{info, warn};

use bringup_api::{CommandRef, ControlPlane, RoleInfo};

use crate::command;
use crate::error::EngineResult;
use crate::service::ServiceHandle;

const NAMENODE: &str = "NAMENODE";
const SECONDARY_NAMENODE: &str = "SECONDARYNAMENODE";
const JOURNALNODE: &str = "JOURNALNODE";
const FAILOVER_CONTROLLER: &str = "FAILOVERCONTROLLER";

pub async fn pre_start<C: ControlPlane>(svc: &ServiceHandle<'_, C>) -> EngineResult<()> {
    let mut roles = svc.api().list_roles(svc.cluster(), svc.name()).await?;
    roles.sort_by(|a, b| a.name.cmp(&b.name));

    let namenodes = of_type(&roles, NAMENODE);
    let has_secondary = !of_type(&roles, SECONDARY_NAMENODE).is_empty();

    if !has_secondary && namenodes.len() >= 2 {
        ha_first_start(svc, &roles, &namenodes).await
    } else {
        format_namenode(svc, &namenodes).await
    }
}

/// Plain deployment: format the (single) namenode.
async fn format_namenode<C: ControlPlane>(
    svc: &ServiceHandle<'_, C>,
    namenodes: &[String],
) -> EngineResult<()> {
    let Some(primary) = namenodes.first() else {
        warn!(service = svc.name(), "no namenode role declared, skipping format");
        return Ok(());
    };
    info!(stage = svc.name(), namenode = %primary, "formatting filesystem");
    let cmds = svc
        .api()
        .role_command(svc.cluster(), svc.name(), "hdfsFormat", &[primary.clone()])
        .await?;
    wait_step(svc, cmds, "namenode format failed").await
}

/// High-availability deployment. The first namenode by ordinal is the
/// active, the second the standby; failover controllers follow the same
/// order. Each step's commands complete before the next step begins.
async fn ha_first_start<C: ControlPlane>(
    svc: &ServiceHandle<'_, C>,
    roles: &[RoleInfo],
    namenodes: &[String],
) -> EngineResult<()> {
    info!(stage = svc.name(), "preparing high-availability namenodes");

    let init = svc
        .api()
        .service_command(svc.cluster(), svc.name(), "hdfsInitializeAutoFailover")
        .await?;
    wait_step(svc, vec![init], "auto-failover initialization failed").await?;

    let journals = of_type(roles, JOURNALNODE);
    run_on(svc, "start", &journals, "journal node start failed").await?;

    let active = &namenodes[0];
    let standby = &namenodes[1];
    run_on(svc, "hdfsFormat", std::slice::from_ref(active), "active namenode format failed")
        .await?;
    run_on(svc, "start", std::slice::from_ref(active), "active namenode start failed").await?;
    run_on(
        svc,
        "hdfsBootstrapStandby",
        std::slice::from_ref(standby),
        "standby bootstrap failed",
    )
    .await?;
    run_on(svc, "start", std::slice::from_ref(standby), "standby namenode start failed").await?;

    for controller in of_type(roles, FAILOVER_CONTROLLER) {
        run_on(svc, "start", std::slice::from_ref(&controller), "failover controller start failed")
            .await?;
    }
    Ok(())
}

async fn run_on<C: ControlPlane>(
    svc: &ServiceHandle<'_, C>,
    cmd: &str,
    roles: &[String],
    fail_msg: &str,
) -> EngineResult<()> {
    if roles.is_empty() {
        return Ok(());
    }
    let cmds = svc
        .api()
        .role_command(svc.cluster(), svc.name(), cmd, roles)
        .await?;
    wait_step(svc, cmds, fail_msg).await
}

async fn wait_step<C: ControlPlane>(
    svc: &ServiceHandle<'_, C>,
    cmds: Vec<CommandRef>,
    fail_msg: &str,
) -> EngineResult<()> {
    command::run_bulk(svc.api(), cmds, svc.tunings().command_timeout, fail_msg).await
}

fn of_type(roles: &[RoleInfo], role_type: &str) -> Vec<String> {
    roles
        .iter()
        .filter(|r| r.role_type == role_type)
        .map(|r| r.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryTunings;
    use crate::services;
    use bringup_api::testing::{CommandScript, FakeControlPlane};
    use bringup_spec::{ConfigMap, RoleSpec, ServiceSpec, ServiceType};

    fn role(group: &str, hosts: &[&str]) -> RoleSpec {
        RoleSpec {
            group: group.to_string(),
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            config: ConfigMap::new(),
        }
    }

    async fn deployed(fake: &FakeControlPlane, spec: &ServiceSpec, tunings: &RetryTunings) {
        fake.create_cluster("c", "CDH5", "5.6.0").await.unwrap();
        let svc = ServiceHandle::new(fake, "c", ServiceType::Hdfs, spec, tunings);
        svc.ensure_deployed().await.unwrap();
    }

    #[tokio::test]
    async fn plain_deployment_formats_first_namenode_only() {
        let fake = FakeControlPlane::new();
        let spec = ServiceSpec {
            config: ConfigMap::new(),
            roles: vec![
                role("NAMENODE", &["h1"]),
                role("SECONDARYNAMENODE", &["h2"]),
                role("DATANODE", &["h1", "h2", "h3"]),
            ],
        };
        let tunings = RetryTunings::immediate();
        deployed(&fake, &spec, &tunings).await;
        let svc = ServiceHandle::new(&fake, "c", ServiceType::Hdfs, &spec, &tunings);

        services::pre_start(&svc).await.unwrap();

        assert_eq!(
            fake.calls_with_prefix("role_command HDFS:hdfsFormat"),
            vec!["role_command HDFS:hdfsFormat HDFS-NAMENODE-1"]
        );
        assert!(fake.calls_with_prefix("command HDFS:hdfsInitializeAutoFailover").is_empty());
    }

    #[tokio::test]
    async fn ha_deployment_runs_the_full_sequence_in_order() {
        let fake = FakeControlPlane::new();
        let spec = ServiceSpec {
            config: ConfigMap::new(),
            roles: vec![
                role("NAMENODE", &["h1", "h2"]),
                role("JOURNALNODE", &["h1", "h2", "h3"]),
                role("FAILOVERCONTROLLER", &["h1", "h2"]),
                role("DATANODE", &["h1", "h2", "h3"]),
            ],
        };
        let tunings = RetryTunings::immediate();
        deployed(&fake, &spec, &tunings).await;
        let svc = ServiceHandle::new(&fake, "c", ServiceType::Hdfs, &spec, &tunings);

        services::pre_start(&svc).await.unwrap();

        let steps: Vec<_> = fake
            .calls()
            .into_iter()
            .filter(|c| {
                c.starts_with("command HDFS:") || c.starts_with("role_command HDFS:")
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                "command HDFS:hdfsInitializeAutoFailover",
                "role_command HDFS:start HDFS-JOURNALNODE-1",
                "role_command HDFS:start HDFS-JOURNALNODE-2",
                "role_command HDFS:start HDFS-JOURNALNODE-3",
                "role_command HDFS:hdfsFormat HDFS-NAMENODE-1",
                "role_command HDFS:start HDFS-NAMENODE-1",
                "role_command HDFS:hdfsBootstrapStandby HDFS-NAMENODE-2",
                "role_command HDFS:start HDFS-NAMENODE-2",
                "role_command HDFS:start HDFS-FAILOVERCONTROLLER-1",
                "role_command HDFS:start HDFS-FAILOVERCONTROLLER-2",
            ]
        );
    }

    #[tokio::test]
    async fn ha_sequence_survives_failed_steps_in_order() {
        let fake = FakeControlPlane::new();
        let spec = ServiceSpec {
            config: ConfigMap::new(),
            roles: vec![
                role("NAMENODE", &["h1", "h2"]),
                role("JOURNALNODE", &["h1", "h2", "h3"]),
                role("FAILOVERCONTROLLER", &["h1", "h2"]),
            ],
        };
        let tunings = RetryTunings::immediate();
        deployed(&fake, &spec, &tunings).await;
        let svc = ServiceHandle::new(&fake, "c", ServiceType::Hdfs, &spec, &tunings);
        // A re-run hits these on an already-prepared filesystem.
        fake.script_command(
            "HDFS",
            "hdfsFormat",
            CommandScript::failed("filesystem is already formatted"),
        );
        fake.script_command(
            "HDFS",
            "hdfsBootstrapStandby",
            CommandScript::failed("standby is already bootstrapped"),
        );

        services::pre_start(&svc).await.unwrap();

        let steps: Vec<_> = fake
            .calls()
            .into_iter()
            .filter(|c| {
                c.starts_with("command HDFS:") || c.starts_with("role_command HDFS:")
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                "command HDFS:hdfsInitializeAutoFailover",
                "role_command HDFS:start HDFS-JOURNALNODE-1",
                "role_command HDFS:start HDFS-JOURNALNODE-2",
                "role_command HDFS:start HDFS-JOURNALNODE-3",
                "role_command HDFS:hdfsFormat HDFS-NAMENODE-1",
                "role_command HDFS:start HDFS-NAMENODE-1",
                "role_command HDFS:hdfsBootstrapStandby HDFS-NAMENODE-2",
                "role_command HDFS:start HDFS-NAMENODE-2",
                "role_command HDFS:start HDFS-FAILOVERCONTROLLER-1",
                "role_command HDFS:start HDFS-FAILOVERCONTROLLER-2",
            ]
        );
    }

    #[tokio::test]
    async fn already_formatted_does_not_abort() {
        let fake = FakeControlPlane::new();
        let spec = ServiceSpec {
            config: ConfigMap::new(),
            roles: vec![role("NAMENODE", &["h1"]), role("SECONDARYNAMENODE", &["h2"])],
        };
        let tunings = RetryTunings::immediate();
        deployed(&fake, &spec, &tunings).await;
        let svc = ServiceHandle::new(&fake, "c", ServiceType::Hdfs, &spec, &tunings);
        fake.script_command(
            "HDFS",
            "hdfsFormat",
            CommandScript::failed("filesystem is already formatted"),
        );

        services::pre_start(&svc).await.unwrap();
    }
}
