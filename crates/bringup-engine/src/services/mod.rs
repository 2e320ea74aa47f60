//! Per-service behavior registry.
//!
//! Most services differ only in which one-shot init commands run
//! before or after first start; those are data, not code. The closed
//! catalog below keeps dispatch exhaustive: adding a service type
//! means adding a match arm here, not registering a string somewhere.
//!
//! Commands are best-effort by default. Most init commands fail
//! harmlessly on a re-run (the schema exists, the directory exists)
//! and the run should converge past them.

mod hdfs;

use std::time::Duration;

use serde_json::json;

use bringup_api::ControlPlane;
use bringup_spec::{ConfigMap, ServiceType};

use crate::error::EngineResult;
use crate::service::ServiceHandle;

/// A one-shot service-level command run around first start.
#[derive(Debug, Clone, Copy)]
pub struct InitCommand {
    pub name: &'static str,
    pub timeout: Duration,
    /// Essential commands abort the run on failure; the rest warn.
    pub essential: bool,
}

impl InitCommand {
    const fn best_effort(name: &'static str, secs: u64) -> Self {
        Self {
            name,
            timeout: Duration::from_secs(secs),
            essential: false,
        }
    }
}

const ZOOKEEPER_PRE: &[InitCommand] = &[InitCommand::best_effort("zooKeeperInit", 60)];
const SPARK_ON_YARN_PRE: &[InitCommand] = &[
    InitCommand::best_effort("CreateSparkUserDirCommand", 60),
    InitCommand::best_effort("CreateSparkHistoryDirCommand", 60),
    InitCommand::best_effort("SparkUploadJarServiceCommand", 60),
];
const HBASE_PRE: &[InitCommand] = &[InitCommand::best_effort("hbaseCreateRoot", 60)];
const HIVE_PRE: &[InitCommand] = &[InitCommand::best_effort("hiveCreateHiveWarehouse", 60)];
const IMPALA_PRE: &[InitCommand] = &[InitCommand::best_effort("impalaCreateUserDir", 60)];
const OOZIE_PRE: &[InitCommand] = &[
    InitCommand::best_effort("createOozieDb", 300),
    InitCommand::best_effort("installOozieShareLib", 300),
];
const SQOOP_PRE: &[InitCommand] = &[
    InitCommand::best_effort("createSqoopUserDir", 300),
    InitCommand::best_effort("createSqoopDatabaseTables", 300),
];
const SOLR_PRE: &[InitCommand] = &[
    InitCommand::best_effort("initSolr", 300),
    InitCommand::best_effort("createSolrHdfsHomeDir", 300),
];
const SENTRY_PRE: &[InitCommand] = &[InitCommand::best_effort("createSentryDatabaseTables", 300)];
const HDFS_POST: &[InitCommand] = &[InitCommand::best_effort("hdfsCreateTmpDir", 60)];

/// Init commands to run after deploy, before the service starts.
pub fn pre_start_commands(ty: ServiceType) -> &'static [InitCommand] {
    match ty {
        ServiceType::Zookeeper => ZOOKEEPER_PRE,
        ServiceType::SparkOnYarn => SPARK_ON_YARN_PRE,
        ServiceType::Hbase => HBASE_PRE,
        ServiceType::Hive => HIVE_PRE,
        ServiceType::Impala => IMPALA_PRE,
        ServiceType::Oozie => OOZIE_PRE,
        ServiceType::Sqoop => SQOOP_PRE,
        ServiceType::Solr => SOLR_PRE,
        ServiceType::Sentry => SENTRY_PRE,
        ServiceType::Hdfs
        | ServiceType::Yarn
        | ServiceType::Flume
        | ServiceType::Kafka
        | ServiceType::Hue => &[],
    }
}

/// Init commands to run once the service is up.
pub fn post_start_commands(ty: ServiceType) -> &'static [InitCommand] {
    match ty {
        ServiceType::Hdfs => HDFS_POST,
        _ => &[],
    }
}

/// Per-role configuration derived from the role's position rather than
/// the cluster document. Zookeeper quorum members need a distinct
/// integer id matching their ordinal.
pub fn role_config_overrides(ty: ServiceType, group: &str, ordinal: usize) -> ConfigMap {
    let mut config = ConfigMap::new();
    if ty == ServiceType::Zookeeper && group.eq_ignore_ascii_case("SERVER") {
        config.insert("serverId".to_string(), json!(ordinal));
    }
    config
}

/// Run a service's pre-start hook: code hooks first, then the catalog.
pub async fn pre_start<C: ControlPlane>(svc: &ServiceHandle<'_, C>) -> EngineResult<()> {
    if svc.service_type() == ServiceType::Hdfs {
        hdfs::pre_start(svc).await?;
    }
    for init in pre_start_commands(svc.service_type()) {
        svc.run_init(init).await?;
    }
    Ok(())
}

/// Run a service's post-start catalog commands.
pub async fn post_start<C: ControlPlane>(svc: &ServiceHandle<'_, C>) -> EngineResult<()> {
    for init in post_start_commands(svc.service_type()) {
        svc.run_init(init).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryTunings;
    use bringup_api::testing::FakeControlPlane;
    use bringup_spec::{RoleSpec, ServiceSpec};

    fn spec(group: &str, hosts: &[&str]) -> ServiceSpec {
        ServiceSpec {
            config: ConfigMap::new(),
            roles: vec![RoleSpec {
                group: group.to_string(),
                hosts: hosts.iter().map(|h| h.to_string()).collect(),
                config: ConfigMap::new(),
            }],
        }
    }

    #[test]
    fn base_services_with_hooks() {
        assert_eq!(pre_start_commands(ServiceType::Zookeeper).len(), 1);
        assert!(pre_start_commands(ServiceType::Yarn).is_empty());
        assert!(pre_start_commands(ServiceType::Hdfs).is_empty());
        assert_eq!(post_start_commands(ServiceType::Hdfs)[0].name, "hdfsCreateTmpDir");
    }

    #[test]
    fn catalog_entries_are_well_formed() {
        for ty in ServiceType::all() {
            for init in pre_start_commands(ty).iter().chain(post_start_commands(ty)) {
                assert!(!init.name.is_empty(), "{ty} has an unnamed init command");
                assert!(init.timeout >= Duration::from_secs(60));
                assert!(!init.essential, "{ty} init commands default to best-effort");
            }
        }
    }

    #[test]
    fn zookeeper_servers_get_their_ordinal() {
        let config = role_config_overrides(ServiceType::Zookeeper, "SERVER", 3);
        assert_eq!(config.get("serverId"), Some(&json!(3)));
        assert!(role_config_overrides(ServiceType::Kafka, "KAFKA_BROKER", 3).is_empty());
        assert!(role_config_overrides(ServiceType::Zookeeper, "GATEWAY", 1).is_empty());
    }

    #[tokio::test]
    async fn oozie_pre_start_runs_catalog_in_order() {
        let fake = FakeControlPlane::new();
        fake.create_cluster("c", "CDH5", "5.6.0").await.unwrap();
        let spec = spec("OOZIE_SERVER", &["h1"]);
        let tunings = RetryTunings::immediate();
        let svc = ServiceHandle::new(&fake, "c", ServiceType::Oozie, &spec, &tunings);
        svc.ensure_deployed().await.unwrap();

        pre_start(&svc).await.unwrap();

        let cmds: Vec<_> = fake.calls_with_prefix("command OOZIE:");
        assert_eq!(
            cmds,
            vec!["command OOZIE:createOozieDb", "command OOZIE:installOozieShareLib"]
        );
    }
}
