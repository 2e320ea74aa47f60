//! End-to-end convergence against the in-memory control plane.

use bringup_api::testing::FakeControlPlane;
use bringup_api::{ControlPlane, ParcelStage, RunState};
use bringup_engine::{Orchestrator, RetryTunings};
use bringup_spec::ClusterSpec;

const CLUSTER_DOC: &str = r#"
cm:
  host: cm.example.com
  username: admin
  password: admin
cluster:
  name: prod
  version: CDH5
  fullVersion: 5.6.0
  hosts: [h1, h2, h3, h4]
parcels:
  - product: CDH
    version: 5.6.0-1.cdh5.6.0.p0.45
services:
  MGMT:
    roles:
      - group: SERVICEMONITOR
        hosts: [h1]
      - group: HOSTMONITOR
        hosts: [h1]
  ZOOKEEPER:
    config:
      zookeeper_datadir_autocreate: true
    roles:
      - group: SERVER
        hosts: [h1, h2, h3]
  HDFS:
    roles:
      - group: NAMENODE
        hosts: [h1]
      - group: SECONDARYNAMENODE
        hosts: [h2]
      - group: DATANODE
        hosts: [h2, h3, h4]
  YARN:
    roles:
      - group: RESOURCEMANAGER
        hosts: [h1]
      - group: JOBHISTORY
        hosts: [h1]
      - group: NODEMANAGER
        hosts: [h2, h3, h4]
  HIVE:
    roles:
      - group: HIVESERVER2
        hosts: [h2]
      - group: HIVEMETASTORE
        hosts: [h2]
"#;

fn fake() -> FakeControlPlane {
    let fake = FakeControlPlane::new();
    fake.add_parcel(
        "prod",
        "CDH",
        "5.6.0-1.cdh5.6.0.p0.45",
        ParcelStage::AvailableRemotely,
    );
    fake
}

fn position(calls: &[String], entry: &str) -> usize {
    calls
        .iter()
        .position(|c| c == entry)
        .unwrap_or_else(|| panic!("no `{entry}` in call log: {calls:#?}"))
}

#[tokio::test]
async fn full_run_converges_the_cluster() {
    let fake = fake();
    let spec = ClusterSpec::from_yaml(CLUSTER_DOC).unwrap();
    let orch = Orchestrator::new(&fake, &spec)
        .with_trial(true)
        .with_tunings(RetryTunings::immediate());

    orch.run().await.unwrap();

    // Parcel reached activation.
    assert_eq!(
        fake.parcel_stage("prod", "CDH", "5.6.0-1.cdh5.6.0.p0.45"),
        Some(ParcelStage::Activated)
    );

    // Every declared service is started with its declared roles.
    assert_eq!(
        fake.role_names("prod", "ZOOKEEPER"),
        vec!["ZOOKEEPER-SERVER-1", "ZOOKEEPER-SERVER-2", "ZOOKEEPER-SERVER-3"]
    );
    for service in ["ZOOKEEPER", "HDFS", "YARN", "HIVE"] {
        let info = fake.get_service("prod", service).await.unwrap();
        assert_eq!(info.state, RunState::Started, "{service} not started");
    }
    assert_eq!(
        fake.get_mgmt_service().await.unwrap().state,
        RunState::Started
    );

    let calls = fake.calls();

    // Stage ordering: license, hosts, parcel, inspection, mgmt, base
    // services strictly in order, then the rest.
    let trial = position(&calls, "begin_trial");
    let hosts = position(&calls, "add_hosts prod h1,h2,h3,h4");
    let download = position(&calls, "parcel_download CDH-5.6.0-1.cdh5.6.0.p0.45");
    let inspect = position(&calls, "inspect_hosts");
    let mgmt_start = position(&calls, "start_mgmt");
    let zk_start = position(&calls, "start_service ZOOKEEPER");
    let hdfs_start = position(&calls, "start_service HDFS");
    let yarn_start = position(&calls, "start_service YARN");
    let hive_start = position(&calls, "start_service HIVE");

    assert!(trial < hosts && hosts < download && download < inspect);
    assert!(inspect < mgmt_start && mgmt_start < zk_start);
    assert!(zk_start < hdfs_start && hdfs_start < yarn_start && yarn_start < hive_start);

    // Base-service init hooks ran on the right side of the start.
    assert!(position(&calls, "command ZOOKEEPER:zooKeeperInit") < zk_start);
    assert!(position(&calls, "role_command HDFS:hdfsFormat HDFS-NAMENODE-1") < hdfs_start);
    assert!(position(&calls, "command HDFS:hdfsCreateTmpDir") > hdfs_start);

    // Additional services get a cluster-wide client config deploy
    // between prepare and start.
    let client_config = position(&calls, "deploy_client_config prod");
    assert!(position(&calls, "command HIVE:hiveCreateHiveWarehouse") < client_config);
    assert!(client_config < hive_start);
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let fake = fake();
    let spec = ClusterSpec::from_yaml(CLUSTER_DOC).unwrap();
    let orch = Orchestrator::new(&fake, &spec)
        .with_trial(true)
        .with_tunings(RetryTunings::immediate());

    orch.run().await.unwrap();
    let converged = fake.calls().len();

    orch.run().await.unwrap();
    let second_run: Vec<_> = fake.calls().split_off(converged);

    // Already-converged stages issue no mutations or lifecycle
    // triggers; only the per-run host inspection recurs.
    for call in &second_run {
        assert!(
            !call.starts_with("create_")
                && !call.starts_with("start_")
                && !call.starts_with("parcel_")
                && !call.starts_with("add_hosts")
                && !call.starts_with("begin_trial")
                && !call.starts_with("command ")
                && !call.starts_with("role_command "),
            "unexpected mutation on re-run: {call}"
        );
    }
}
