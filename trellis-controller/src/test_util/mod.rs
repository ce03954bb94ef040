//! In-memory control plane for tests.
//!
//! Mirrors the remote contract closely enough to exercise the controller:
//! natural 404/409 semantics, scripted status sequences for successive
//! show calls, per-operation failure injection, and a call log for
//! asserting exactly which remote operations ran.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::client::{ControlPlane, Payload, Snapshot};
use crate::error::RemoteCallError;

#[derive(Default)]
struct FakeState {
    networks: HashMap<String, Snapshot>,
    agents: HashMap<String, BTreeSet<String>>,
    statuses: VecDeque<&'static str>,
    calls: Vec<String>,
    fail_create: Option<u16>,
    fail_show: Option<u16>,
    fail_update: Option<u16>,
    fail_delete: Option<u16>,
    fail_list: Option<u16>,
    fail_add: HashMap<String, u16>,
    fail_remove: HashMap<String, u16>,
}

/// Recording in-memory stand-in for the remote control plane.
///
/// Injected create/show/update/delete/list failures fire once on the next
/// matching call; add/remove failures are keyed by agent id and persist.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses reported by successive show calls. Once the script is
    /// exhausted the last reported status sticks. Networks start in BUILD.
    pub fn script_statuses(&self, statuses: &[&'static str]) {
        self.state.lock().unwrap().statuses = statuses.iter().copied().collect();
    }

    pub fn fail_create(&self, status: u16) {
        self.state.lock().unwrap().fail_create = Some(status);
    }

    pub fn fail_show(&self, status: u16) {
        self.state.lock().unwrap().fail_show = Some(status);
    }

    pub fn fail_update(&self, status: u16) {
        self.state.lock().unwrap().fail_update = Some(status);
    }

    pub fn fail_delete(&self, status: u16) {
        self.state.lock().unwrap().fail_delete = Some(status);
    }

    pub fn fail_list(&self, status: u16) {
        self.state.lock().unwrap().fail_list = Some(status);
    }

    /// Adds targeting `agent_id` fail with `status`.
    pub fn fail_add(&self, agent_id: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .fail_add
            .insert(agent_id.to_string(), status);
    }

    /// Stop failing adds targeting `agent_id`.
    pub fn clear_add_failure(&self, agent_id: &str) {
        self.state.lock().unwrap().fail_add.remove(agent_id);
    }

    /// Removes targeting `agent_id` fail with `status`.
    pub fn fail_remove(&self, agent_id: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .fail_remove
            .insert(agent_id.to_string(), status);
    }

    /// Seed the agent set for a network id without going through create.
    pub fn seed_agents(&self, network_id: &str, agents: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .agents
            .insert(network_id.to_string(), agents.iter().map(|a| a.to_string()).collect());
    }

    /// Rendered call log: `create`, `show <id>`, `update <id>`,
    /// `delete <id>`, `list <id>`, `add <agent> <id>`, `remove <agent> <id>`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose rendering starts with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Current agent set for a network (empty if unknown).
    pub fn agents(&self, network_id: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .agents
            .get(network_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a network with this id exists.
    pub fn exists(&self, network_id: &str) -> bool {
        self.state.lock().unwrap().networks.contains_key(network_id)
    }

    /// Attributes currently stored for a network.
    pub fn network(&self, network_id: &str) -> Option<Snapshot> {
        self.state.lock().unwrap().networks.get(network_id).cloned()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn create_network(&self, payload: &Payload) -> Result<String, RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create".to_string());
        if let Some(status) = state.fail_create.take() {
            return Err(RemoteCallError::new(status, "create_network rejected"));
        }

        let id = Uuid::new_v4().to_string();
        let mut snapshot = payload.clone();
        snapshot.insert("id".to_string(), json!(id));
        snapshot.entry("status").or_insert(json!("BUILD"));
        snapshot.entry("subnets").or_insert(json!([]));
        state.networks.insert(id.clone(), snapshot);
        state.agents.entry(id.clone()).or_default();
        Ok(id)
    }

    async fn show_network(&self, network_id: &str) -> Result<Snapshot, RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("show {}", network_id));
        if let Some(status) = state.fail_show.take() {
            return Err(RemoteCallError::new(status, "show_network failed"));
        }

        if let Some(next) = state.statuses.pop_front() {
            if let Some(network) = state.networks.get_mut(network_id) {
                network.insert("status".to_string(), json!(next));
            }
        }
        state
            .networks
            .get(network_id)
            .cloned()
            .ok_or_else(|| RemoteCallError::not_found(format!("network {} not found", network_id)))
    }

    async fn update_network(
        &self,
        network_id: &str,
        payload: &Payload,
    ) -> Result<(), RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update {}", network_id));
        if let Some(status) = state.fail_update.take() {
            return Err(RemoteCallError::new(status, "update_network rejected"));
        }

        let network = state
            .networks
            .get_mut(network_id)
            .ok_or_else(|| RemoteCallError::not_found(format!("network {} not found", network_id)))?;
        for (name, value) in payload {
            network.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_network(&self, network_id: &str) -> Result<(), RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {}", network_id));
        if let Some(status) = state.fail_delete.take() {
            return Err(RemoteCallError::new(status, "delete_network rejected"));
        }

        if state.networks.remove(network_id).is_none() {
            return Err(RemoteCallError::not_found(format!(
                "network {} not found",
                network_id
            )));
        }
        // agent scheduling cascades with the network
        state.agents.remove(network_id);
        Ok(())
    }

    async fn list_dhcp_agents(
        &self,
        network_id: &str,
    ) -> Result<BTreeSet<String>, RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list {}", network_id));
        if let Some(status) = state.fail_list.take() {
            return Err(RemoteCallError::new(status, "list_dhcp_agents failed"));
        }

        state
            .agents
            .get(network_id)
            .cloned()
            .ok_or_else(|| RemoteCallError::not_found(format!("network {} not found", network_id)))
    }

    async fn add_network_to_dhcp_agent(
        &self,
        agent_id: &str,
        network_id: &str,
    ) -> Result<(), RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("add {} {}", agent_id, network_id));
        if let Some(&status) = state.fail_add.get(agent_id) {
            return Err(RemoteCallError::new(
                status,
                format!("add to agent {} failed", agent_id),
            ));
        }

        let agents = state
            .agents
            .get_mut(network_id)
            .ok_or_else(|| RemoteCallError::not_found(format!("network {} not found", network_id)))?;
        if !agents.insert(agent_id.to_string()) {
            return Err(RemoteCallError::conflict(format!(
                "network already scheduled on agent {}",
                agent_id
            )));
        }
        Ok(())
    }

    async fn remove_network_from_dhcp_agent(
        &self,
        agent_id: &str,
        network_id: &str,
    ) -> Result<(), RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("remove {} {}", agent_id, network_id));
        if let Some(&status) = state.fail_remove.get(agent_id) {
            return Err(RemoteCallError::new(
                status,
                format!("remove from agent {} failed", agent_id),
            ));
        }

        let agents = state
            .agents
            .get_mut(network_id)
            .ok_or_else(|| RemoteCallError::not_found(format!("network {} not found", network_id)))?;
        if !agents.remove(agent_id) {
            return Err(RemoteCallError::conflict(format!(
                "network not scheduled on agent {}",
                agent_id
            )));
        }
        Ok(())
    }
}
