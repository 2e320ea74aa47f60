//! Control-plane entity model.

use serde::{Deserialize, Serialize};

/// Role type that carries client configuration only and runs no daemon.
/// Excluded from service health/started checks.
pub const GATEWAY_ROLE_TYPE: &str = "GATEWAY";

/// An installed license (or active trial) on the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub owner: String,
    pub uuid: String,
}

/// A control-plane-wide configuration entry. The effective value is the
/// explicit value when set, else the control plane's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: Option<String>,
    pub default: Option<String>,
}

impl ConfigValue {
    pub fn effective(&self) -> Option<&str> {
        self.value.as_deref().or(self.default.as_deref())
    }
}

/// A cluster entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "fullVersion")]
    pub full_version: String,
}

/// Discrete stages of a parcel's lifecycle on the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStage {
    Unavailable,
    AvailableRemotely,
    Downloading,
    Downloaded,
    Distributing,
    Distributed,
    Activating,
    Activated,
    #[serde(rename = "INUSE")]
    InUse,
}

impl std::fmt::Display for ParcelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParcelStage::Unavailable => "UNAVAILABLE",
            ParcelStage::AvailableRemotely => "AVAILABLE_REMOTELY",
            ParcelStage::Downloading => "DOWNLOADING",
            ParcelStage::Downloaded => "DOWNLOADED",
            ParcelStage::Distributing => "DISTRIBUTING",
            ParcelStage::Distributed => "DISTRIBUTED",
            ParcelStage::Activating => "ACTIVATING",
            ParcelStage::Activated => "ACTIVATED",
            ParcelStage::InUse => "INUSE",
        };
        f.write_str(s)
    }
}

/// Snapshot of a parcel. The error set is terminal: any non-empty
/// `errors` aborts the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelInfo {
    pub product: String,
    pub version: String,
    pub stage: ParcelStage,
    pub progress: u64,
    pub total_progress: u64,
    pub errors: Vec<String>,
}

/// Aggregate run state of a service or role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Started,
    Starting,
    Stopped,
    Stopping,
    Na,
    #[serde(other)]
    Unknown,
}

/// Snapshot of a service entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub state: RunState,
}

/// Snapshot of a role instance bound to one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub role_type: String,
    pub host: String,
    pub state: RunState,
}

impl RoleInfo {
    /// Gateways have no daemon and never report a meaningful run state.
    pub fn is_gateway(&self) -> bool {
        self.role_type == GATEWAY_ROLE_TYPE
    }
}

/// Handle to an asynchronous control-plane command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRef {
    pub id: u64,
    pub name: String,
}

/// Polled status of an asynchronous command. `success` is `None` while
/// the command is still running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStatus {
    pub id: u64,
    pub name: String,
    pub active: bool,
    pub success: Option<bool>,
    pub result_message: Option<String>,
}

impl CommandStatus {
    pub fn succeeded(&self) -> bool {
        self.success == Some(true)
    }

    /// The result message, or an empty string when none was reported.
    pub fn message(&self) -> &str {
        self.result_message.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parcel_stage_serde_names() {
        let stage: ParcelStage = serde_json::from_str("\"AVAILABLE_REMOTELY\"").unwrap();
        assert_eq!(stage, ParcelStage::AvailableRemotely);
        let stage: ParcelStage = serde_json::from_str("\"INUSE\"").unwrap();
        assert_eq!(stage, ParcelStage::InUse);
        assert_eq!(serde_json::to_string(&ParcelStage::Activated).unwrap(), "\"ACTIVATED\"");
    }

    #[test]
    fn run_state_unknown_fallback() {
        let state: RunState = serde_json::from_str("\"HISTORY_NOT_AVAILABLE\"").unwrap();
        assert_eq!(state, RunState::Unknown);
        let state: RunState = serde_json::from_str("\"STARTED\"").unwrap();
        assert_eq!(state, RunState::Started);
    }

    #[test]
    fn config_value_effective_prefers_explicit() {
        let cv = ConfigValue {
            value: Some("a,b".into()),
            default: Some("d".into()),
        };
        assert_eq!(cv.effective(), Some("a,b"));

        let cv = ConfigValue {
            value: None,
            default: Some("d".into()),
        };
        assert_eq!(cv.effective(), Some("d"));
    }

    #[test]
    fn gateway_detection() {
        let role = RoleInfo {
            name: "HDFS-GATEWAY-1".into(),
            role_type: "GATEWAY".into(),
            host: "h1".into(),
            state: RunState::Na,
        };
        assert!(role.is_gateway());
    }
}
