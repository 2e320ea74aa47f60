//! In-memory [`ControlPlane`] for tests.
//!
//! Entities live in a mutex-guarded table; lifecycle commands resolve
//! immediately unless a script is queued for them. A call log records
//! every mutation so tests can assert ordering and absence of
//! re-triggers.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use bringup_spec::ConfigMap;

use crate::plane::{ControlPlane, REMOTE_PARCEL_REPO_URLS};
use crate::types::*;
use crate::{ApiError, ApiResult};

/// Scripted outcome for one spawned command.
#[derive(Debug, Clone)]
pub struct CommandScript {
    pub success: bool,
    pub result_message: Option<String>,
    /// Number of status polls before the command resolves.
    pub polls_until_done: u32,
}

impl CommandScript {
    pub fn ok() -> Self {
        Self {
            success: true,
            result_message: None,
            polls_until_done: 0,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            result_message: Some(message.to_string()),
            polls_until_done: 0,
        }
    }

    pub fn with_polls(mut self, polls: u32) -> Self {
        self.polls_until_done = polls;
        self
    }
}

#[derive(Debug, Clone)]
struct FakeRole {
    info: RoleInfo,
    config: ConfigMap,
}

#[derive(Debug)]
struct FakeService {
    info: ServiceInfo,
    config: ConfigMap,
    groups: BTreeMap<String, ConfigMap>,
    roles: BTreeMap<String, FakeRole>,
}

impl FakeService {
    fn new(name: &str, service_type: &str) -> Self {
        Self {
            info: ServiceInfo {
                name: name.to_string(),
                service_type: service_type.to_string(),
                state: RunState::Stopped,
            },
            config: ConfigMap::new(),
            groups: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }

    fn start_all(&mut self) {
        self.info.state = RunState::Started;
        for role in self.roles.values_mut() {
            if !role.info.is_gateway() {
                role.info.state = RunState::Started;
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Effect {
    StartService { service_key: String },
    StartMgmt,
    StartRoles { service_key: String, roles: Vec<String> },
}

#[derive(Debug)]
struct PendingCommand {
    status: CommandStatus,
    polls_remaining: u32,
    outcome: (bool, Option<String>),
    effect: Option<Effect>,
}

#[derive(Debug)]
struct ParcelEntry {
    info: ParcelInfo,
    /// Stage transition applied after N further polls.
    pending: Option<(ParcelStage, u32)>,
    transition_polls: u32,
}

#[derive(Debug, Default)]
struct State {
    license: Option<LicenseInfo>,
    cm_config: BTreeMap<String, ConfigValue>,
    clusters: BTreeMap<String, ClusterInfo>,
    cluster_hosts: BTreeMap<String, Vec<String>>,
    parcels: BTreeMap<String, ParcelEntry>,
    hidden_parcels: BTreeMap<String, ParcelEntry>,
    services: BTreeMap<String, FakeService>,
    mgmt: Option<FakeService>,
    commands: BTreeMap<u64, PendingCommand>,
    scripts: BTreeMap<String, VecDeque<CommandScript>>,
    next_id: u64,
    log: Vec<String>,
}

/// Scriptable in-memory control plane.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<State>,
}

fn parcel_key(cluster: &str, product: &str, version: &str) -> String {
    format!("{cluster}/{product}/{version}")
}

fn service_key(cluster: &str, service: &str) -> String {
    format!("{cluster}/{service}")
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    // ── test setup helpers ─────────────────────────────────────

    /// Pre-install a license so the orchestrator skips activation.
    pub fn set_licensed(&self, owner: &str) {
        let mut s = self.state.lock().unwrap();
        s.license = Some(LicenseInfo {
            owner: owner.to_string(),
            uuid: "test-uuid".to_string(),
        });
    }

    /// Register a parcel visible to lookups at the given stage.
    pub fn add_parcel(&self, cluster: &str, product: &str, version: &str, stage: ParcelStage) {
        let mut s = self.state.lock().unwrap();
        s.parcels.insert(
            parcel_key(cluster, product, version),
            ParcelEntry {
                info: ParcelInfo {
                    product: product.to_string(),
                    version: version.to_string(),
                    stage,
                    progress: 0,
                    total_progress: 100,
                    errors: Vec::new(),
                },
                pending: None,
                transition_polls: 0,
            },
        );
    }

    /// Register a parcel that only becomes visible after the remote
    /// parcel repository list is updated.
    pub fn add_parcel_behind_repo(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
        stage: ParcelStage,
    ) {
        let mut s = self.state.lock().unwrap();
        s.hidden_parcels.insert(
            parcel_key(cluster, product, version),
            ParcelEntry {
                info: ParcelInfo {
                    product: product.to_string(),
                    version: version.to_string(),
                    stage,
                    progress: 0,
                    total_progress: 100,
                    errors: Vec::new(),
                },
                pending: None,
                transition_polls: 0,
            },
        );
    }

    /// Record errors on a parcel, making its state terminal.
    pub fn set_parcel_errors(&self, cluster: &str, product: &str, version: &str, errors: &[&str]) {
        let mut s = self.state.lock().unwrap();
        if let Some(entry) = s.parcels.get_mut(&parcel_key(cluster, product, version)) {
            entry.info.errors = errors.iter().map(|e| e.to_string()).collect();
        }
    }

    /// Make parcel stage transitions take N polls instead of resolving
    /// on the trigger.
    pub fn set_parcel_transition_polls(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
        polls: u32,
    ) {
        let mut s = self.state.lock().unwrap();
        if let Some(entry) = s.parcels.get_mut(&parcel_key(cluster, product, version)) {
            entry.transition_polls = polls;
        }
    }

    /// Queue a scripted outcome for the next spawn of `command` on
    /// `service` (use `"start"` for service start, `"cm"` /
    /// `"inspectHosts"` for host inspection).
    pub fn script_command(&self, service: &str, command: &str, script: CommandScript) {
        let mut s = self.state.lock().unwrap();
        s.scripts
            .entry(format!("{service}:{command}"))
            .or_default()
            .push_back(script);
    }

    /// Force a service's aggregate state.
    pub fn set_service_state(&self, cluster: &str, service: &str, state: RunState) {
        let mut s = self.state.lock().unwrap();
        if let Some(svc) = s.services.get_mut(&service_key(cluster, service)) {
            svc.info.state = state;
        }
    }

    /// Force a single role's state.
    pub fn set_role_state(&self, cluster: &str, service: &str, role: &str, state: RunState) {
        let mut s = self.state.lock().unwrap();
        if let Some(svc) = s.services.get_mut(&service_key(cluster, service)) {
            if let Some(r) = svc.roles.get_mut(role) {
                r.info.state = state;
            }
        }
    }

    // ── test inspection helpers ────────────────────────────────

    /// Snapshot of the mutation log.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Log entries starting with `prefix`.
    pub fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Current stage of a registered parcel.
    pub fn parcel_stage(&self, cluster: &str, product: &str, version: &str) -> Option<ParcelStage> {
        let s = self.state.lock().unwrap();
        s.parcels
            .get(&parcel_key(cluster, product, version))
            .map(|p| p.info.stage)
    }

    /// Names of roles currently present under a service.
    pub fn role_names(&self, cluster: &str, service: &str) -> Vec<String> {
        let s = self.state.lock().unwrap();
        s.services
            .get(&service_key(cluster, service))
            .map(|svc| svc.roles.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored role-config-group configuration.
    pub fn group_config(&self, cluster: &str, service: &str, group: &str) -> Option<ConfigMap> {
        let s = self.state.lock().unwrap();
        s.services
            .get(&service_key(cluster, service))
            .and_then(|svc| svc.groups.get(group).cloned())
    }

    /// Stored per-role configuration.
    pub fn role_config(&self, cluster: &str, service: &str, role: &str) -> Option<ConfigMap> {
        let s = self.state.lock().unwrap();
        s.services
            .get(&service_key(cluster, service))
            .and_then(|svc| svc.roles.get(role))
            .map(|r| r.config.clone())
    }

    /// Stored service-level configuration.
    pub fn service_config(&self, cluster: &str, service: &str) -> Option<ConfigMap> {
        let s = self.state.lock().unwrap();
        s.services
            .get(&service_key(cluster, service))
            .map(|svc| svc.config.clone())
    }

    // ── internals ──────────────────────────────────────────────

    fn spawn(
        state: &mut State,
        script_key: &str,
        name: &str,
        effect: Option<Effect>,
    ) -> CommandRef {
        let script = state
            .scripts
            .get_mut(script_key)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(CommandScript::ok);

        state.next_id += 1;
        let id = state.next_id;

        if script.polls_until_done == 0 {
            if script.success {
                Self::apply_effect(state, effect.as_ref());
            }
            state.commands.insert(
                id,
                PendingCommand {
                    status: CommandStatus {
                        id,
                        name: name.to_string(),
                        active: false,
                        success: Some(script.success),
                        result_message: script.result_message,
                    },
                    polls_remaining: 0,
                    outcome: (script.success, None),
                    effect: None,
                },
            );
        } else {
            state.commands.insert(
                id,
                PendingCommand {
                    status: CommandStatus {
                        id,
                        name: name.to_string(),
                        active: true,
                        success: None,
                        result_message: None,
                    },
                    polls_remaining: script.polls_until_done,
                    outcome: (script.success, script.result_message),
                    effect,
                },
            );
        }

        CommandRef {
            id,
            name: name.to_string(),
        }
    }

    fn apply_effect(state: &mut State, effect: Option<&Effect>) {
        match effect {
            Some(Effect::StartService { service_key }) => {
                if let Some(svc) = state.services.get_mut(service_key) {
                    svc.start_all();
                }
            }
            Some(Effect::StartMgmt) => {
                if let Some(mgmt) = state.mgmt.as_mut() {
                    mgmt.start_all();
                }
            }
            Some(Effect::StartRoles { service_key, roles }) => {
                if let Some(svc) = state.services.get_mut(service_key) {
                    for role in roles {
                        if let Some(r) = svc.roles.get_mut(role) {
                            r.info.state = RunState::Started;
                        }
                    }
                }
            }
            None => {}
        }
    }
}

impl ControlPlane for FakeControlPlane {
    async fn get_license(&self) -> ApiResult<LicenseInfo> {
        let s = self.state.lock().unwrap();
        s.license
            .clone()
            .ok_or_else(|| ApiError::NotFound("license".to_string()))
    }

    async fn begin_trial(&self) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push("begin_trial".to_string());
        s.license = Some(LicenseInfo {
            owner: "Trial License".to_string(),
            uuid: "trial".to_string(),
        });
        Ok(())
    }

    async fn update_license(&self, _license: &str) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push("update_license".to_string());
        s.license = Some(LicenseInfo {
            owner: "Licensed".to_string(),
            uuid: "licensed".to_string(),
        });
        Ok(())
    }

    async fn get_config_value(&self, key: &str) -> ApiResult<ConfigValue> {
        let s = self.state.lock().unwrap();
        Ok(s.cm_config.get(key).cloned().unwrap_or_default())
    }

    async fn update_config_value(&self, key: &str, value: &str) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("update_cm_config {key}"));
        s.cm_config.insert(
            key.to_string(),
            ConfigValue {
                value: Some(value.to_string()),
                default: None,
            },
        );
        // Widening the repository list makes hidden parcels resolvable.
        if key == REMOTE_PARCEL_REPO_URLS {
            let hidden = std::mem::take(&mut s.hidden_parcels);
            s.parcels.extend(hidden);
        }
        Ok(())
    }

    async fn get_cluster(&self, name: &str) -> ApiResult<ClusterInfo> {
        let s = self.state.lock().unwrap();
        s.clusters
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("cluster {name}")))
    }

    async fn create_cluster(
        &self,
        name: &str,
        version: &str,
        full_version: &str,
    ) -> ApiResult<ClusterInfo> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("create_cluster {name}"));
        let info = ClusterInfo {
            name: name.to_string(),
            version: version.to_string(),
            full_version: full_version.to_string(),
        };
        s.clusters.insert(name.to_string(), info.clone());
        s.cluster_hosts.entry(name.to_string()).or_default();
        Ok(info)
    }

    async fn list_cluster_hosts(&self, cluster: &str) -> ApiResult<Vec<String>> {
        let s = self.state.lock().unwrap();
        Ok(s.cluster_hosts.get(cluster).cloned().unwrap_or_default())
    }

    async fn add_cluster_hosts(&self, cluster: &str, hosts: &[String]) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("add_hosts {cluster} {}", hosts.join(",")));
        let existing = s.cluster_hosts.entry(cluster.to_string()).or_default();
        for host in hosts {
            if !existing.contains(host) {
                existing.push(host.clone());
            }
        }
        Ok(())
    }

    async fn inspect_hosts(&self) -> ApiResult<CommandRef> {
        let mut s = self.state.lock().unwrap();
        s.log.push("inspect_hosts".to_string());
        Ok(Self::spawn(&mut s, "cm:inspectHosts", "inspectHosts", None))
    }

    async fn get_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<ParcelInfo> {
        let mut s = self.state.lock().unwrap();
        let key = parcel_key(cluster, product, version);
        let entry = s
            .parcels
            .get_mut(&key)
            .ok_or_else(|| ApiError::NotFound(format!("parcel {key}")))?;

        if let Some((target, polls)) = entry.pending.take() {
            if polls <= 1 {
                entry.info.stage = target;
                entry.info.progress = entry.info.total_progress;
            } else {
                entry.info.progress += entry.info.total_progress / u64::from(polls);
                entry.pending = Some((target, polls - 1));
            }
        }
        Ok(entry.info.clone())
    }

    async fn start_parcel_download(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.trigger_parcel(cluster, product, version, "parcel_download", ParcelStage::Downloaded)
    }

    async fn start_parcel_distribution(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.trigger_parcel(
            cluster,
            product,
            version,
            "parcel_distribute",
            ParcelStage::Distributed,
        )
    }

    async fn activate_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.trigger_parcel(cluster, product, version, "parcel_activate", ParcelStage::Activated)
    }

    async fn command_status(&self, id: u64) -> ApiResult<CommandStatus> {
        let mut s = self.state.lock().unwrap();
        let pending = s
            .commands
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("command {id}")))?;

        if pending.polls_remaining > 0 {
            pending.polls_remaining -= 1;
            if pending.polls_remaining == 0 {
                let (success, message) = pending.outcome.clone();
                pending.status.active = false;
                pending.status.success = Some(success);
                pending.status.result_message = message;
                let effect = pending.effect.take();
                let status = pending.status.clone();
                if success {
                    Self::apply_effect(&mut s, effect.as_ref());
                }
                return Ok(status);
            }
        }
        Ok(s.commands[&id].status.clone())
    }

    async fn get_mgmt_service(&self) -> ApiResult<ServiceInfo> {
        let s = self.state.lock().unwrap();
        s.mgmt
            .as_ref()
            .map(|m| m.info.clone())
            .ok_or_else(|| ApiError::NotFound("mgmt service".to_string()))
    }

    async fn create_mgmt_service(&self) -> ApiResult<ServiceInfo> {
        let mut s = self.state.lock().unwrap();
        s.log.push("create_mgmt_service".to_string());
        let svc = FakeService::new("mgmt", "MGMT");
        let info = svc.info.clone();
        s.mgmt = Some(svc);
        Ok(info)
    }

    async fn list_mgmt_roles(&self) -> ApiResult<Vec<RoleInfo>> {
        let s = self.state.lock().unwrap();
        Ok(s.mgmt
            .as_ref()
            .map(|m| m.roles.values().map(|r| r.info.clone()).collect())
            .unwrap_or_default())
    }

    async fn create_mgmt_role(
        &self,
        name: &str,
        role_type: &str,
        host: &str,
    ) -> ApiResult<RoleInfo> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("create_mgmt_role {name}"));
        let mgmt = s
            .mgmt
            .as_mut()
            .ok_or_else(|| ApiError::NotFound("mgmt service".to_string()))?;
        let info = RoleInfo {
            name: name.to_string(),
            role_type: role_type.to_string(),
            host: host.to_string(),
            state: RunState::Stopped,
        };
        mgmt.roles.insert(
            name.to_string(),
            FakeRole {
                info: info.clone(),
                config: ConfigMap::new(),
            },
        );
        Ok(info)
    }

    async fn update_mgmt_role_group_config(
        &self,
        group: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("update_mgmt_group_config {group}"));
        let mgmt = s
            .mgmt
            .as_mut()
            .ok_or_else(|| ApiError::NotFound("mgmt service".to_string()))?;
        mgmt.groups.insert(group.to_string(), config.clone());
        Ok(())
    }

    async fn start_mgmt_service(&self) -> ApiResult<CommandRef> {
        let mut s = self.state.lock().unwrap();
        if s.mgmt.is_none() {
            return Err(ApiError::NotFound("mgmt service".to_string()));
        }
        s.log.push("start_mgmt".to_string());
        Ok(Self::spawn(&mut s, "mgmt:start", "Start", Some(Effect::StartMgmt)))
    }

    async fn get_service(&self, cluster: &str, name: &str) -> ApiResult<ServiceInfo> {
        let s = self.state.lock().unwrap();
        s.services
            .get(&service_key(cluster, name))
            .map(|svc| svc.info.clone())
            .ok_or_else(|| ApiError::NotFound(format!("service {name}")))
    }

    async fn create_service(
        &self,
        cluster: &str,
        name: &str,
        service_type: &str,
    ) -> ApiResult<ServiceInfo> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("create_service {name}"));
        let svc = FakeService::new(name, service_type);
        let info = svc.info.clone();
        s.services.insert(service_key(cluster, name), svc);
        Ok(info)
    }

    async fn update_service_config(
        &self,
        cluster: &str,
        service: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("update_service_config {service}"));
        let svc = s
            .services
            .get_mut(&service_key(cluster, service))
            .ok_or_else(|| ApiError::NotFound(format!("service {service}")))?;
        svc.config = config.clone();
        Ok(())
    }

    async fn update_role_group_config(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("update_group_config {service} {group}"));
        let svc = s
            .services
            .get_mut(&service_key(cluster, service))
            .ok_or_else(|| ApiError::NotFound(format!("service {service}")))?;
        svc.groups.insert(group.to_string(), config.clone());
        Ok(())
    }

    async fn get_role(&self, cluster: &str, service: &str, role: &str) -> ApiResult<RoleInfo> {
        let s = self.state.lock().unwrap();
        s.services
            .get(&service_key(cluster, service))
            .and_then(|svc| svc.roles.get(role))
            .map(|r| r.info.clone())
            .ok_or_else(|| ApiError::NotFound(format!("role {role}")))
    }

    async fn create_role(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        role_type: &str,
        host: &str,
    ) -> ApiResult<RoleInfo> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("create_role {role}"));
        let svc = s
            .services
            .get_mut(&service_key(cluster, service))
            .ok_or_else(|| ApiError::NotFound(format!("service {service}")))?;
        let state = if role_type == GATEWAY_ROLE_TYPE {
            RunState::Na
        } else {
            RunState::Stopped
        };
        let info = RoleInfo {
            name: role.to_string(),
            role_type: role_type.to_string(),
            host: host.to_string(),
            state,
        };
        svc.roles.insert(
            role.to_string(),
            FakeRole {
                info: info.clone(),
                config: ConfigMap::new(),
            },
        );
        Ok(info)
    }

    async fn update_role_config(
        &self,
        cluster: &str,
        service: &str,
        role: &str,
        config: &ConfigMap,
    ) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("update_role_config {role}"));
        let svc = s
            .services
            .get_mut(&service_key(cluster, service))
            .ok_or_else(|| ApiError::NotFound(format!("service {service}")))?;
        let r = svc
            .roles
            .get_mut(role)
            .ok_or_else(|| ApiError::NotFound(format!("role {role}")))?;
        r.config = config.clone();
        Ok(())
    }

    async fn list_roles(&self, cluster: &str, service: &str) -> ApiResult<Vec<RoleInfo>> {
        let s = self.state.lock().unwrap();
        Ok(s.services
            .get(&service_key(cluster, service))
            .map(|svc| svc.roles.values().map(|r| r.info.clone()).collect())
            .unwrap_or_default())
    }

    async fn start_service(&self, cluster: &str, service: &str) -> ApiResult<CommandRef> {
        let mut s = self.state.lock().unwrap();
        let key = service_key(cluster, service);
        if !s.services.contains_key(&key) {
            return Err(ApiError::NotFound(format!("service {service}")));
        }
        s.log.push(format!("start_service {service}"));
        Ok(Self::spawn(
            &mut s,
            &format!("{service}:start"),
            "Start",
            Some(Effect::StartService { service_key: key }),
        ))
    }

    async fn service_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
    ) -> ApiResult<CommandRef> {
        let mut s = self.state.lock().unwrap();
        if !s.services.contains_key(&service_key(cluster, service)) {
            return Err(ApiError::NotFound(format!("service {service}")));
        }
        s.log.push(format!("command {service}:{command}"));
        Ok(Self::spawn(&mut s, &format!("{service}:{command}"), command, None))
    }

    async fn role_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
        roles: &[String],
    ) -> ApiResult<Vec<CommandRef>> {
        let mut s = self.state.lock().unwrap();
        let key = service_key(cluster, service);
        if !s.services.contains_key(&key) {
            return Err(ApiError::NotFound(format!("service {service}")));
        }
        let mut refs = Vec::with_capacity(roles.len());
        for role in roles {
            s.log.push(format!("role_command {service}:{command} {role}"));
            let effect = (command == "start").then(|| Effect::StartRoles {
                service_key: key.clone(),
                roles: vec![role.clone()],
            });
            refs.push(Self::spawn(
                &mut s,
                &format!("{service}:{command}"),
                command,
                effect,
            ));
        }
        Ok(refs)
    }

    async fn deploy_client_config(&self, cluster: &str) -> ApiResult<CommandRef> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("deploy_client_config {cluster}"));
        Ok(Self::spawn(
            &mut s,
            "cluster:deployClientConfig",
            "deployClientConfig",
            None,
        ))
    }
}

impl FakeControlPlane {
    fn trigger_parcel(
        &self,
        cluster: &str,
        product: &str,
        version: &str,
        log_tag: &str,
        target: ParcelStage,
    ) -> ApiResult<()> {
        let mut s = self.state.lock().unwrap();
        s.log.push(format!("{log_tag} {product}-{version}"));
        let entry = s
            .parcels
            .get_mut(&parcel_key(cluster, product, version))
            .ok_or_else(|| ApiError::NotFound(format!("parcel {product}-{version}")))?;
        if entry.transition_polls == 0 {
            entry.info.stage = target;
            entry.info.progress = entry.info.total_progress;
        } else {
            entry.pending = Some((target, entry.transition_polls));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parcel_hidden_until_repo_added() {
        let fake = FakeControlPlane::new();
        fake.add_parcel_behind_repo("c", "CDH", "5.6.0", ParcelStage::AvailableRemotely);

        let err = fake.get_parcel("c", "CDH", "5.6.0").await.unwrap_err();
        assert!(err.is_not_found());

        fake.update_config_value(REMOTE_PARCEL_REPO_URLS, "http://repo")
            .await
            .unwrap();
        let parcel = fake.get_parcel("c", "CDH", "5.6.0").await.unwrap();
        assert_eq!(parcel.stage, ParcelStage::AvailableRemotely);
    }

    #[tokio::test]
    async fn scripted_command_failure_then_default_success() {
        let fake = FakeControlPlane::new();
        fake.create_cluster("c", "CDH5", "5.6.0").await.unwrap();
        fake.create_service("c", "HIVE", "HIVE").await.unwrap();
        fake.script_command("HIVE", "createHiveWarehouse", CommandScript::failed("boom"));

        let cmd = fake
            .service_command("c", "HIVE", "createHiveWarehouse")
            .await
            .unwrap();
        let status = fake.command_status(cmd.id).await.unwrap();
        assert_eq!(status.success, Some(false));
        assert_eq!(status.message(), "boom");

        let cmd = fake
            .service_command("c", "HIVE", "createHiveWarehouse")
            .await
            .unwrap();
        let status = fake.command_status(cmd.id).await.unwrap();
        assert!(status.succeeded());
    }

    #[tokio::test]
    async fn delayed_command_resolves_after_polls() {
        let fake = FakeControlPlane::new();
        fake.create_cluster("c", "CDH5", "5.6.0").await.unwrap();
        fake.create_service("c", "HDFS", "HDFS").await.unwrap();
        fake.script_command("HDFS", "start", CommandScript::ok().with_polls(2));

        let cmd = fake.start_service("c", "HDFS").await.unwrap();
        assert!(fake.command_status(cmd.id).await.unwrap().active);
        let status = fake.command_status(cmd.id).await.unwrap();
        assert!(!status.active);
        assert!(status.succeeded());
    }

    #[tokio::test]
    async fn start_effect_skips_gateways() {
        let fake = FakeControlPlane::new();
        fake.create_cluster("c", "CDH5", "5.6.0").await.unwrap();
        fake.create_service("c", "HDFS", "HDFS").await.unwrap();
        fake.create_role("c", "HDFS", "HDFS-DATANODE-1", "DATANODE", "h1")
            .await
            .unwrap();
        fake.create_role("c", "HDFS", "HDFS-GATEWAY-1", "GATEWAY", "h1")
            .await
            .unwrap();

        let cmd = fake.start_service("c", "HDFS").await.unwrap();
        fake.command_status(cmd.id).await.unwrap();

        let roles = fake.list_roles("c", "HDFS").await.unwrap();
        let datanode = roles.iter().find(|r| r.role_type == "DATANODE").unwrap();
        let gateway = roles.iter().find(|r| r.is_gateway()).unwrap();
        assert_eq!(datanode.state, RunState::Started);
        assert_eq!(gateway.state, RunState::Na);
    }
}
