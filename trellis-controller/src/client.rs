//! Remote control plane client contract.
//!
//! The transport itself lives outside this crate; the controller consumes
//! it through this trait and only ever sees [`RemoteCallError`] with the
//! remote status code preserved.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::RemoteCallError;

/// Request body for create/update calls.
pub type Payload = Map<String, Value>;

/// Attribute snapshot returned by a show call.
pub type Snapshot = Map<String, Value>;

/// Client-side contract for the network control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a network, returning the id assigned by the control plane.
    async fn create_network(&self, payload: &Payload) -> Result<String, RemoteCallError>;

    /// Fetch the current attributes of a network. 404 when missing.
    async fn show_network(&self, network_id: &str) -> Result<Snapshot, RemoteCallError>;

    /// Apply a sparse attribute update to a network.
    async fn update_network(
        &self,
        network_id: &str,
        payload: &Payload,
    ) -> Result<(), RemoteCallError>;

    /// Delete a network. 404 when already gone.
    async fn delete_network(&self, network_id: &str) -> Result<(), RemoteCallError>;

    /// List the ids of the DHCP agents the network is scheduled on.
    async fn list_dhcp_agents(&self, network_id: &str)
        -> Result<BTreeSet<String>, RemoteCallError>;

    /// Schedule the network on a DHCP agent. 409 when already scheduled.
    async fn add_network_to_dhcp_agent(
        &self,
        agent_id: &str,
        network_id: &str,
    ) -> Result<(), RemoteCallError>;

    /// Unschedule the network from a DHCP agent. 404 when the network or
    /// agent is gone, 409 when the network is not scheduled on it.
    async fn remove_network_from_dhcp_agent(
        &self,
        agent_id: &str,
        network_id: &str,
    ) -> Result<(), RemoteCallError>;
}
