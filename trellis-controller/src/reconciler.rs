//! Minimal-diff reconciliation of the network-to-DHCP-agent association.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::ControlPlane;
use crate::error::{classify_remote_error, ControllerError, Disposition, RemoteOp, Result};

/// Agent ids converged by one reconciliation pass. Operations tolerated as
/// already applied count as converged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Reconciles the set of DHCP agents a network is scheduled on.
pub struct AgentReconciler<'a, C: ControlPlane + ?Sized> {
    client: &'a C,
    network_id: &'a str,
}

impl<'a, C: ControlPlane + ?Sized> AgentReconciler<'a, C> {
    pub fn new(client: &'a C, network_id: &'a str) -> Self {
        Self { client, network_id }
    }

    /// Fetch the observed agent set and converge it onto `desired`.
    ///
    /// The observed set is always fetched fresh so a pass never acts on
    /// stale membership.
    pub async fn run(&self, desired: &BTreeSet<String>) -> Result<ReconcileReport> {
        let observed = self
            .client
            .list_dhcp_agents(self.network_id)
            .await
            .map_err(ControllerError::Remote)?;
        self.reconcile(desired, &observed).await
    }

    /// Apply the minimal add/remove diff between `desired` and `observed`.
    ///
    /// Adds run before removes so a desired association is never dropped
    /// while an equivalent one is still pending. Each operation is
    /// idempotent: "already scheduled" and "already gone" are converted to
    /// success, anything else aborts the pass with the remote status
    /// preserved. A partial pass self-heals on the next run.
    pub async fn reconcile(
        &self,
        desired: &BTreeSet<String>,
        observed: &BTreeSet<String>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for agent_id in desired.difference(observed) {
            match self
                .client
                .add_network_to_dhcp_agent(agent_id, self.network_id)
                .await
            {
                Ok(()) => {
                    info!(
                        "Scheduled network {} on DHCP agent {}",
                        self.network_id, agent_id
                    );
                    report.added.push(agent_id.clone());
                }
                Err(e) => match classify_remote_error(RemoteOp::AddAgent, &e) {
                    Disposition::Ignore => {
                        warn!(
                            "Network {} already scheduled on DHCP agent {}",
                            self.network_id, agent_id
                        );
                        report.added.push(agent_id.clone());
                    }
                    Disposition::Fatal => return Err(ControllerError::Remote(e)),
                },
            }
        }

        for agent_id in observed.difference(desired) {
            match self
                .client
                .remove_network_from_dhcp_agent(agent_id, self.network_id)
                .await
            {
                Ok(()) => {
                    info!(
                        "Unscheduled network {} from DHCP agent {}",
                        self.network_id, agent_id
                    );
                    report.removed.push(agent_id.clone());
                }
                Err(e) => match classify_remote_error(RemoteOp::RemoveAgent, &e) {
                    Disposition::Ignore => {
                        warn!(
                            "Network {} already unscheduled from DHCP agent {}",
                            self.network_id, agent_id
                        );
                        report.removed.push(agent_id.clone());
                    }
                    Disposition::Fatal => return Err(ControllerError::Remote(e)),
                },
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeControlPlane;

    fn ids(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_minimal_diff() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &["agent-b", "agent-c"]);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        let report = reconciler.run(&ids(&["agent-a", "agent-b"])).await.unwrap();

        assert_eq!(report.added, vec!["agent-a"]);
        assert_eq!(report.removed, vec!["agent-c"]);
        // agent-b is in both sets and must not be touched
        assert_eq!(fake.calls_matching("add"), vec!["add agent-a net-1"]);
        assert_eq!(fake.calls_matching("remove"), vec!["remove agent-c net-1"]);
        assert_eq!(fake.agents("net-1"), ids(&["agent-a", "agent-b"]));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &["agent-c"]);
        let desired = ids(&["agent-a", "agent-b"]);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        reconciler.run(&desired).await.unwrap();
        let second = reconciler.run(&desired).await.unwrap();

        // second pass converges with no further add/remove calls
        assert_eq!(second, ReconcileReport::default());
        assert_eq!(fake.calls_matching("add").len(), 2);
        assert_eq!(fake.calls_matching("remove").len(), 1);
        assert_eq!(fake.agents("net-1"), desired);
    }

    #[tokio::test]
    async fn test_add_conflict_tolerated() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &[]);
        fake.fail_add("agent-a", 409);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        let report = reconciler.run(&ids(&["agent-a"])).await.unwrap();
        assert_eq!(report.added, vec!["agent-a"]);
    }

    #[tokio::test]
    async fn test_remove_gone_tolerated() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &["agent-a", "agent-b"]);
        fake.fail_remove("agent-a", 404);
        fake.fail_remove("agent-b", 409);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        let report = reconciler.run(&ids(&[])).await.unwrap();
        assert_eq!(report.removed, vec!["agent-a", "agent-b"]);
    }

    #[tokio::test]
    async fn test_add_failure_aborts_with_original_status() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &[]);
        fake.fail_add("agent-a", 500);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        let err = reconciler
            .run(&ids(&["agent-a", "agent-b"]))
            .await
            .unwrap_err();

        // original status surfaces, and agent-b is never attempted
        assert_eq!(err.status(), Some(500));
        assert_eq!(fake.calls_matching("add"), vec!["add agent-a net-1"]);
    }

    #[tokio::test]
    async fn test_remove_failure_aborts() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &["agent-a"]);
        fake.fail_remove("agent-a", 503);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        let err = reconciler.run(&ids(&[])).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let fake = FakeControlPlane::new();
        fake.seed_agents("net-1", &[]);
        fake.fail_list(500);

        let reconciler = AgentReconciler::new(&fake, "net-1");
        let err = reconciler.run(&ids(&["agent-a"])).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(fake.calls_matching("add").is_empty());
    }
}
