//! The `ControlPlane` trait — the operations the convergence engine
//! drives against the cluster manager.

use bringup_spec::ConfigMap;

use crate::types::*;
use crate::ApiResult;

/// Control-plane configuration key holding the comma-joined list of
/// remote parcel repository URLs.
pub const REMOTE_PARCEL_REPO_URLS: &str = "REMOTE_PARCEL_REPO_URLS";

/// Operations against the cluster-manager control plane.
///
/// Lookup methods return [`crate::ApiError::NotFound`] for missing
/// entities; callers build lookup-or-create flows on top of that.
/// State-mutating lifecycle operations return a [`CommandRef`] whose
/// completion the caller must wait on.
#[allow(async_fn_in_trait)]
pub trait ControlPlane {
    // ── license ────────────────────────────────────────────────

    async fn get_license(&self) -> ApiResult<LicenseInfo>;
    async fn begin_trial(&self) -> ApiResult<()>;
    async fn update_license(&self, license: &str) -> ApiResult<()>;

    // ── control-plane-wide configuration ───────────────────────

    async fn get_config_value(&self, key: &str) -> ApiResult<ConfigValue>;
    async fn update_config_value(&self, key: &str, value: &str) -> ApiResult<()>;

    // ── cluster and host membership ────────────────────────────

    async fn get_cluster(&self, name: &str) -> ApiResult<ClusterInfo>;
    async fn create_cluster(
        &self,
        name: &str,
        version: &str,
        full_version: &str,
    ) -> ApiResult<ClusterInfo>;
    async fn list_cluster_hosts(&self, cluster: &str) -> ApiResult<Vec<String>>;
    async fn add_cluster_hosts(&self, cluster: &str, hosts: &[String]) -> ApiResult<()>;
    /// Trigger a bulk inspection of every managed host.
    async fn inspect_hosts(&self) -> ApiResult<CommandRef>;

    // ── parcels ────────────────────────────────────────────────

    async fn get_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<ParcelInfo>;
    async fn start_parcel_download(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()>;
    async fn start_parcel_distribution(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()>;
    async fn activate_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()>;

    // ── asynchronous commands ──────────────────────────────────

    async fn command_status(&self, id: u64) -> ApiResult<CommandStatus>;

    // ── management service ─────────────────────────────────────

    async fn get_mgmt_service(&self) -> ApiResult<ServiceInfo>;
    async fn create_mgmt_service(&self) -> ApiResult<ServiceInfo>;
    async fn list_mgmt_roles(&self) -> ApiResult<Vec<RoleInfo>>;
    async fn create_mgmt_role(
        &self,
        name: &str,
        role_type: &str,
        host: &str,
    ) -> ApiResult<RoleInfo>;
    async fn update_mgmt_role_group_config(
        &self,
        group: &str,
        config: &ConfigMap,
    ) -> ApiResult<()>;
    async fn start_mgmt_service(&self) -> ApiResult<CommandRef>;

    // ── cluster services and roles ─────────────────────────────

    async fn get_service(&self, cluster: &str, name: &str) -> ApiResult<ServiceInfo>;
    async fn create_service(
        &self,
        cluster: &str,
        name: &str,
        service_type: &str,
    ) -> ApiResult<ServiceInfo>;
    async fn update_service_config(
        &self,
        cluster: &str,
        service: &str,
        config: &ConfigMap,
    ) -> ApiResult<()>;
    async fn update_role_group_config(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        config: &ConfigMap,
    ) -> ApiResult<()>;
    async fn get_role(&self, cluster: &str, service: &str, role: &str) -> ApiResult<RoleInfo>;
    async fn create_role(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        role_type: &str,
        host: &str,
    ) -> ApiResult<RoleInfo>;
    async fn update_role_config(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        config: &ConfigMap,
    ) -> ApiResult<()>;
    async fn list_roles(&self, cluster: &str, service: &str) -> ApiResult<Vec<RoleInfo>>;

    // ── lifecycle commands ─────────────────────────────────────

    async fn start_service(&self, cluster: &str, service: &str) -> ApiResult<CommandRef>;
    /// Run a named service-level command (init, format, create-dir, ...).
    async fn service_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
    ) -> ApiResult<CommandRef>;
    /// Run a named command against specific roles. Returns one command
    /// handle per role.
    async fn role_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
        roles: &[String],
    ) -> ApiResult<Vec<CommandRef>>;
    /// Redeploy client configuration across the whole cluster.
    async fn deploy_client_config(&self, cluster: &str) -> ApiResult<CommandRef>;
}
