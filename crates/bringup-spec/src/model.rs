//! cluster.yaml document model.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ServiceType, SpecError, SpecResult, MGMT_SERVICE_KEY};

/// Free-form configuration key/value map pushed verbatim to the control
/// plane. Values keep their YAML scalar types (strings, ints, bools).
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// The complete desired-state document for one bring-up run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub cm: CmConfig,
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub parcels: Vec<ParcelSpec>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

/// Control-plane endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmConfig {
    pub host: String,
    #[serde(default = "default_cm_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tls: bool,
}

fn default_cm_port() -> u16 {
    7180
}

/// Cluster identity and host inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub version: String,
    #[serde(rename = "fullVersion")]
    pub full_version: String,
    pub hosts: Vec<String>,
}

/// One distributable software parcel to bring to the ACTIVATED stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelSpec {
    #[serde(default = "default_product")]
    pub product: String,
    pub version: String,
    /// Alternate parcel repository, appended to the control plane's
    /// repository list when no configured repo serves `version`.
    #[serde(default)]
    pub repo: Option<String>,
}

fn default_product() -> String {
    "CDH".to_string()
}

/// Per-service configuration and role layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
}

/// One role group and the hosts its per-host roles land on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub group: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub config: ConfigMap,
}

impl ClusterSpec {
    /// Load and validate a document from a YAML file.
    pub fn from_file(path: &Path) -> SpecResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load and validate a document from a YAML string.
    pub fn from_yaml(content: &str) -> SpecResult<Self> {
        let spec: ClusterSpec = serde_yaml::from_str(content)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reject malformed documents before any control-plane mutation.
    ///
    /// Every service must declare at least one role; every role must name
    /// a group and a non-empty host list; every service key other than
    /// `MGMT` must be a known service type.
    pub fn validate(&self) -> SpecResult<()> {
        if self.cluster.hosts.is_empty() {
            return Err(SpecError::NoHosts);
        }
        for (name, svc) in &self.services {
            if name != MGMT_SERVICE_KEY {
                ServiceType::from_str(name)?;
            }
            if svc.roles.is_empty() {
                return Err(SpecError::NoRoles(name.clone()));
            }
            for role in &svc.roles {
                if role.group.is_empty() || role.hosts.is_empty() {
                    return Err(SpecError::InvalidRole(name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Spec for a managed service type, if the document declares it.
    pub fn service(&self, ty: ServiceType) -> Option<&ServiceSpec> {
        self.services.get(ty.name())
    }

    /// Spec for the management/monitoring service, if declared.
    pub fn mgmt(&self) -> Option<&ServiceSpec> {
        self.services.get(MGMT_SERVICE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
cm:
  host: cm.example.com
  username: admin
  password: admin
cluster:
  name: test-cluster
  version: CDH5
  fullVersion: 5.6.0
  hosts: [h1, h2, h3]
parcels:
  - version: 5.6.0-1.cdh5.6.0.p0.45
services:
  ZOOKEEPER:
    config:
      zookeeper_datadir_autocreate: true
    roles:
      - group: SERVER
        hosts: [h1, h2, h3]
"#;

    #[test]
    fn parse_minimal_document() {
        let spec = ClusterSpec::from_yaml(MINIMAL).unwrap();
        assert_eq!(spec.cluster.name, "test-cluster");
        assert_eq!(spec.cluster.hosts.len(), 3);
        assert_eq!(spec.cm.port, 7180);
        assert_eq!(spec.parcels[0].product, "CDH");
        assert!(spec.parcels[0].repo.is_none());

        let zk = spec.service(ServiceType::Zookeeper).unwrap();
        assert_eq!(zk.roles[0].group, "SERVER");
        assert_eq!(zk.roles[0].hosts, vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn reject_service_without_roles() {
        let doc = r#"
cm: { host: cm, username: admin, password: admin }
cluster: { name: c, version: CDH5, fullVersion: 5.6.0, hosts: [h1] }
services:
  HDFS:
    config: {}
"#;
        let err = ClusterSpec::from_yaml(doc).unwrap_err();
        assert!(matches!(err, SpecError::NoRoles(ref s) if s == "HDFS"));
    }

    #[test]
    fn reject_role_without_hosts() {
        let doc = r#"
cm: { host: cm, username: admin, password: admin }
cluster: { name: c, version: CDH5, fullVersion: 5.6.0, hosts: [h1] }
services:
  HDFS:
    roles:
      - group: DATANODE
        hosts: []
"#;
        let err = ClusterSpec::from_yaml(doc).unwrap_err();
        assert!(matches!(err, SpecError::InvalidRole(_)));
    }

    #[test]
    fn reject_unknown_service_type() {
        let doc = r#"
cm: { host: cm, username: admin, password: admin }
cluster: { name: c, version: CDH5, fullVersion: 5.6.0, hosts: [h1] }
services:
  FROBNICATOR:
    roles:
      - group: SERVER
        hosts: [h1]
"#;
        let err = ClusterSpec::from_yaml(doc).unwrap_err();
        assert!(matches!(err, SpecError::UnknownService(_)));
    }

    #[test]
    fn mgmt_key_is_not_a_service_type() {
        let doc = r#"
cm: { host: cm, username: admin, password: admin }
cluster: { name: c, version: CDH5, fullVersion: 5.6.0, hosts: [h1] }
services:
  MGMT:
    roles:
      - group: SERVICEMONITOR
        hosts: [h1]
"#;
        let spec = ClusterSpec::from_yaml(doc).unwrap();
        assert!(spec.mgmt().is_some());
    }

    #[test]
    fn reject_empty_host_inventory() {
        let doc = r#"
cm: { host: cm, username: admin, password: admin }
cluster: { name: c, version: CDH5, fullVersion: 5.6.0, hosts: [] }
"#;
        let err = ClusterSpec::from_yaml(doc).unwrap_err();
        assert!(matches!(err, SpecError::NoHosts));
    }

    #[test]
    fn config_values_keep_scalar_types() {
        let spec = ClusterSpec::from_yaml(MINIMAL).unwrap();
        let zk = spec.service(ServiceType::Zookeeper).unwrap();
        assert_eq!(
            zk.config.get("zookeeper_datadir_autocreate"),
            Some(&serde_json::Value::Bool(true))
        );
    }
}
