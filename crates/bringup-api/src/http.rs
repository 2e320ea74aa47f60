//! HTTP implementation of [`ControlPlane`] against the cluster
//! manager's REST API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bringup_spec::{CmConfig, ConfigMap};

use crate::plane::ControlPlane;
use crate::types::*;
use crate::{ApiError, ApiResult};

/// REST client for a live control plane.
pub struct HttpControlPlane {
    client: reqwest::Client,
    base: String,
    username: String,
    password: String,
}

impl HttpControlPlane {
    /// Build a client for the given endpoint.
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        tls: bool,
    ) -> ApiResult<Self> {
        let scheme = if tls { "https" } else { "http" };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base: format!("{scheme}://{host}:{port}/api/v11"),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Build a client from the `cm` section of a cluster document.
    pub fn from_cm_config(cm: &CmConfig) -> ApiResult<Self> {
        Self::new(&cm.host, cm.port, &cm.username, &cm.password, cm.tls)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn check(path: &str, resp: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        debug!(%path, "GET");
        let resp = self
            .client
            .get(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(Self::check(path, resp).await?.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> ApiResult<T> {
        debug!(%path, "POST");
        let resp = self
            .client
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        Ok(Self::check(path, resp).await?.json().await?)
    }

    async fn post_unit(&self, path: &str, body: &impl Serialize) -> ApiResult<()> {
        debug!(%path, "POST");
        let resp = self
            .client
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        Self::check(path, resp).await?;
        Ok(())
    }

    async fn put_unit(&self, path: &str, body: &impl Serialize) -> ApiResult<()> {
        debug!(%path, "PUT");
        let resp = self
            .client
            .put(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        Self::check(path, resp).await?;
        Ok(())
    }
}

// ── wire DTOs ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

#[derive(Serialize, Deserialize)]
struct ConfigItem {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<String>,
}

#[derive(Deserialize)]
struct HostDto {
    #[serde(rename = "hostId")]
    host_id: String,
    #[serde(default)]
    hostname: Option<String>,
}

#[derive(Deserialize)]
struct ParcelStateDto {
    #[serde(default)]
    progress: u64,
    #[serde(rename = "totalProgress", default)]
    total_progress: u64,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct ParcelDto {
    product: String,
    version: String,
    stage: ParcelStage,
    #[serde(default)]
    state: Option<ParcelStateDto>,
}

impl From<ParcelDto> for ParcelInfo {
    fn from(p: ParcelDto) -> Self {
        let state = p.state.unwrap_or(ParcelStateDto {
            progress: 0,
            total_progress: 0,
            errors: Vec::new(),
        });
        ParcelInfo {
            product: p.product,
            version: p.version,
            stage: p.stage,
            progress: state.progress,
            total_progress: state.total_progress,
            errors: state.errors,
        }
    }
}

#[derive(Deserialize)]
struct ServiceDto {
    name: String,
    #[serde(rename = "type")]
    service_type: String,
    #[serde(rename = "serviceState", default)]
    state: Option<RunState>,
}

impl From<ServiceDto> for ServiceInfo {
    fn from(s: ServiceDto) -> Self {
        ServiceInfo {
            name: s.name,
            service_type: s.service_type,
            state: s.state.unwrap_or(RunState::Unknown),
        }
    }
}

#[derive(Deserialize)]
struct RoleHostRef {
    #[serde(rename = "hostId")]
    host_id: String,
}

#[derive(Deserialize)]
struct RoleDto {
    name: String,
    #[serde(rename = "type")]
    role_type: String,
    #[serde(rename = "roleState", default)]
    state: Option<RunState>,
    #[serde(rename = "hostRef")]
    host_ref: RoleHostRef,
}

impl From<RoleDto> for RoleInfo {
    fn from(r: RoleDto) -> Self {
        RoleInfo {
            name: r.name,
            role_type: r.role_type,
            host: r.host_ref.host_id,
            state: r.state.unwrap_or(RunState::Unknown),
        }
    }
}

#[derive(Deserialize)]
struct CommandDto {
    id: u64,
    name: String,
    active: bool,
    #[serde(default)]
    success: Option<bool>,
    #[serde(rename = "resultMessage", default)]
    result_message: Option<String>,
}

impl CommandDto {
    fn into_ref(self) -> CommandRef {
        CommandRef {
            id: self.id,
            name: self.name,
        }
    }

    fn into_status(self) -> CommandStatus {
        CommandStatus {
            id: self.id,
            name: self.name,
            active: self.active,
            success: self.success,
            result_message: self.result_message,
        }
    }
}

/// Render a free-form config map as the control plane's item list.
/// Scalar values are sent as their string form.
fn config_items(config: &ConfigMap) -> Items<ConfigItem> {
    let items = config
        .iter()
        .map(|(name, value)| ConfigItem {
            name: name.clone(),
            value: Some(match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            default: None,
        })
        .collect();
    Items { items }
}

impl ControlPlane for HttpControlPlane {
    async fn get_license(&self) -> ApiResult<LicenseInfo> {
        self.get_json("/cm/license").await
    }

    async fn begin_trial(&self) -> ApiResult<()> {
        self.post_unit("/cm/trial/begin", &serde_json::json!({})).await
    }

    async fn update_license(&self, license: &str) -> ApiResult<()> {
        self.post_unit("/cm/license", &serde_json::json!({ "license": license }))
            .await
    }

    async fn get_config_value(&self, key: &str) -> ApiResult<ConfigValue> {
        let items: Items<ConfigItem> = self.get_json("/cm/config?view=full").await?;
        let item = items
            .items
            .into_iter()
            .find(|i| i.name == key)
            .ok_or_else(|| ApiError::NotFound(format!("cm config {key}")))?;
        Ok(ConfigValue {
            value: item.value,
            default: item.default,
        })
    }

    async fn update_config_value(&self, key: &str, value: &str) -> ApiResult<()> {
        let body = Items {
            items: vec![ConfigItem {
                name: key.to_string(),
                value: Some(value.to_string()),
                default: None,
            }],
        };
        self.put_unit("/cm/config", &body).await
    }

    async fn get_cluster(&self, name: &str) -> ApiResult<ClusterInfo> {
        self.get_json(&format!("/clusters/{name}")).await
    }

    async fn create_cluster(
        &self,
        name: &str,
        version: &str,
        full_version: &str,
    ) -> ApiResult<ClusterInfo> {
        let body = Items {
            items: vec![serde_json::json!({
                "name": name,
                "version": version,
                "fullVersion": full_version,
            })],
        };
        let created: Items<ClusterInfo> = self.post_json("/clusters", &body).await?;
        created
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Unexpected {
                status: 200,
                body: "empty cluster list in create response".to_string(),
            })
    }

    async fn list_cluster_hosts(&self, cluster: &str) -> ApiResult<Vec<String>> {
        let refs: Items<HostDto> = self.get_json(&format!("/clusters/{cluster}/hosts")).await?;
        let mut hostnames = Vec::with_capacity(refs.items.len());
        for host_ref in refs.items {
            let host: HostDto = self.get_json(&format!("/hosts/{}", host_ref.host_id)).await?;
            hostnames.push(host.hostname.unwrap_or(host.host_id));
        }
        Ok(hostnames)
    }

    async fn add_cluster_hosts(&self, cluster: &str, hosts: &[String]) -> ApiResult<()> {
        let body = Items {
            items: hosts
                .iter()
                .map(|h| serde_json::json!({ "hostId": h }))
                .collect(),
        };
        self.post_unit(&format!("/clusters/{cluster}/hosts"), &body).await
    }

    async fn inspect_hosts(&self) -> ApiResult<CommandRef> {
        let cmd: CommandDto = self
            .post_json("/cm/commands/inspectHosts", &serde_json::json!({}))
            .await?;
        Ok(cmd.into_ref())
    }

    async fn get_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<ParcelInfo> {
        let dto: ParcelDto = self
            .get_json(&format!(
                "/clusters/{cluster}/parcels/products/{product}/versions/{version}"
            ))
            .await?;
        Ok(dto.into())
    }

    async fn start_parcel_download(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.post_unit(
            &format!(
                "/clusters/{cluster}/parcels/products/{product}/versions/{version}/commands/startDownload"
            ),
            &serde_json::json!({}),
        )
        .await
    }

    async fn start_parcel_distribution(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.post_unit(
            &format!(
                "/clusters/{cluster}/parcels/products/{product}/versions/{version}/commands/startDistribution"
            ),
            &serde_json::json!({}),
        )
        .await
    }

    async fn activate_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.post_unit(
            &format!(
                "/clusters/{cluster}/parcels/products/{product}/versions/{version}/commands/activate"
            ),
            &serde_json::json!({}),
        )
        .await
    }

    async fn command_status(&self, id: u64) -> ApiResult<CommandStatus> {
        let dto: CommandDto = self.get_json(&format!("/commands/{id}")).await?;
        Ok(dto.into_status())
    }

    async fn get_mgmt_service(&self) -> ApiResult<ServiceInfo> {
        let dto: ServiceDto = self.get_json("/cm/service").await?;
        Ok(dto.into())
    }

    async fn create_mgmt_service(&self) -> ApiResult<ServiceInfo> {
        let dto: ServiceDto = self
            .post_json(
                "/cm/service",
                &serde_json::json!({ "name": "mgmt", "type": "MGMT" }),
            )
            .await?;
        Ok(dto.into())
    }

    async fn list_mgmt_roles(&self) -> ApiResult<Vec<RoleInfo>> {
        let dtos: Items<RoleDto> = self.get_json("/cm/service/roles").await?;
        Ok(dtos.items.into_iter().map(Into::into).collect())
    }

    async fn create_mgmt_role(
        &self,
        name: &str,
        role_type: &str,
        host: &str,
    ) -> ApiResult<RoleInfo> {
        let body = Items {
            items: vec![serde_json::json!({
                "name": name,
                "type": role_type,
                "hostRef": { "hostId": host },
            })],
        };
        let created: Items<RoleDto> = self.post_json("/cm/service/roles", &body).await?;
        created
            .items
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| ApiError::Unexpected {
                status: 200,
                body: "empty role list in create response".to_string(),
            })
    }

    async fn update_mgmt_role_group_config(
        &self,
        group: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        self.put_unit(
            &format!("/cm/service/roleConfigGroups/{group}/config"),
            &config_items(config),
        )
        .await
    }

    async fn start_mgmt_service(&self) -> ApiResult<CommandRef> {
        let cmd: CommandDto = self
            .post_json("/cm/service/commands/start", &serde_json::json!({}))
            .await?;
        Ok(cmd.into_ref())
    }

    async fn get_service(&self, cluster: &str, name: &str) -> ApiResult<ServiceInfo> {
        let dto: ServiceDto = self
            .get_json(&format!("/clusters/{cluster}/services/{name}"))
            .await?;
        Ok(dto.into())
    }

    async fn create_service(
        &self,
        cluster: &str,
        name: &str,
        service_type: &str,
    ) -> ApiResult<ServiceInfo> {
        let body = Items {
            items: vec![serde_json::json!({ "name": name, "type": service_type })],
        };
        let created: Items<ServiceDto> = self
            .post_json(&format!("/clusters/{cluster}/services"), &body)
            .await?;
        created
            .items
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| ApiError::Unexpected {
                status: 200,
                body: "empty service list in create response".to_string(),
            })
    }

    async fn update_service_config(
        &self,
        cluster: &str,
        service: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        self.put_unit(
            &format!("/clusters/{cluster}/services/{service}/config"),
            &config_items(config),
        )
        .await
    }

    async fn update_role_group_config(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        self.put_unit(
            &format!("/clusters/{cluster}/services/{service}/roleConfigGroups/{group}/config"),
            &config_items(config),
        )
        .await
    }

    async fn get_role(&self, cluster: &str, service: &str, role: &str) -> ApiResult<RoleInfo> {
        let dto: RoleDto = self
            .get_json(&format!("/clusters/{cluster}/services/{service}/roles/{role}"))
            .await?;
        Ok(dto.into())
    }

    async fn create_role(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        role_type: &str,
        host: &str,
    ) -> ApiResult<RoleInfo> {
        let body = Items {
            items: vec![serde_json::json!({
                "name": role,
                "type": role_type,
                "hostRef": { "hostId": host },
            })],
        };
        let created: Items<RoleDto> = self
            .post_json(&format!("/clusters/{cluster}/services/{service}/roles"), &body)
            .await?;
        created
            .items
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| ApiError::Unexpected {
                status: 200,
                body: "empty role list in create response".to_string(),
            })
    }

    async fn update_role_config(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        self.put_unit(
            &format!("/clusters/{cluster}/services/{service}/roles/{role}/config"),
            &config_items(config),
        )
        .await
    }

    async fn list_roles(&self, cluster: &str, service: &str) -> ApiResult<Vec<RoleInfo>> {
        let dtos: Items<RoleDto> = self
            .get_json(&format!("/clusters/{cluster}/services/{service}/roles"))
            .await?;
        Ok(dtos.items.into_iter().map(Into::into).collect())
    }

    async fn start_service(&self, cluster: &str, service: &str) -> ApiResult<CommandRef> {
        let cmd: CommandDto = self
            .post_json(
                &format!("/clusters/{cluster}/services/{service}/commands/start"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(cmd.into_ref())
    }

    async fn service_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
    ) -> ApiResult<CommandRef> {
        let cmd: CommandDto = self
            .post_json(
                &format!("/clusters/{cluster}/services/{service}/commands/{command}"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(cmd.into_ref())
    }

    async fn role_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
        roles: &[String],
    ) -> ApiResult<Vec<CommandRef>> {
        let body = Items {
            items: roles.to_vec(),
        };
        let cmds: Items<CommandDto> = self
            .post_json(
                &format!("/clusters/{cluster}/services/{service}/roleCommands/{command}"),
                &body,
            )
            .await?;
        Ok(cmds.items.into_iter().map(CommandDto::into_ref).collect())
    }

    async fn deploy_client_config(&self, cluster: &str) -> ApiResult<CommandRef> {
        let cmd: CommandDto = self
            .post_json(
                &format!("/clusters/{cluster}/commands/deployClientConfig"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(cmd.into_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_items_stringify_scalars() {
        let mut config = ConfigMap::new();
        config.insert("a".into(), serde_json::json!("text"));
        config.insert("b".into(), serde_json::json!(3));
        config.insert("c".into(), serde_json::json!(true));

        let items = config_items(&config).items;
        let value = |name: &str| {
            items
                .iter()
                .find(|i| i.name == name)
                .and_then(|i| i.value.clone())
                .unwrap()
        };
        assert_eq!(value("a"), "text");
        assert_eq!(value("b"), "3");
        assert_eq!(value("c"), "true");
    }

    #[test]
    fn base_url_scheme_follows_tls_flag() {
        let plain = HttpControlPlane::new("cm", 7180, "admin", "admin", false).unwrap();
        assert!(plain.base.starts_with("http://cm:7180"));

        let tls = HttpControlPlane::new("cm", 7183, "admin", "admin", true).unwrap();
        assert!(tls.base.starts_with("https://cm:7183"));
    }
}
