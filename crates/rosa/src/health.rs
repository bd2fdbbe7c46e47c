//! Post-install health verification.
//!
//! The check profile is picked once from the cluster topology. Hosted control
//! plane clusters wait for every worker node to report Ready; classic
//! clusters have no in-cluster check yet.

use std::sync::Arc;

use tracing::info;

use crate::api::{NodeHealthApi, NodeReadiness};
use crate::credentials::CallContext;
use crate::error::ProvisionError;
use crate::poll::{poll_until, PollPolicy};

/// Health check run once a cluster reports ready.
#[derive(Clone)]
pub enum PostInstallHealthCheck {
    /// Poll the node list until every node is Ready.
    Hosted {
        nodes: Arc<dyn NodeHealthApi>,
        policy: PollPolicy,
    },
    /// No in-cluster check.
    Classic,
}

impl std::fmt::Debug for PostInstallHealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hosted { policy, .. } => {
                f.debug_struct("Hosted").field("policy", policy).finish()
            }
            Self::Classic => write!(f, "Classic"),
        }
    }
}

impl PostInstallHealthCheck {
    /// Pick the check for a topology.
    #[must_use]
    pub fn for_topology(
        hosted_control_plane: bool,
        nodes: Arc<dyn NodeHealthApi>,
        policy: PollPolicy,
    ) -> Self {
        if hosted_control_plane {
            Self::Hosted { nodes, policy }
        } else {
            Self::Classic
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hosted { .. } => "hosted control plane",
            Self::Classic => "classic",
        }
    }

    /// Run the check against the cluster reachable through `kubeconfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Timeout`] if nodes are not all Ready within
    /// the window, or [`ProvisionError::Cancelled`].
    pub async fn run(&self, kubeconfig: &str, ctx: &CallContext) -> Result<(), ProvisionError> {
        info!(profile = self.name(), "Start: cluster health checks");
        match self {
            Self::Hosted { nodes, policy } => {
                poll_until("cluster nodes ready", *policy, ctx.cancel(), move || async move {
                    let listed = nodes.list_nodes(kubeconfig, ctx).await?;
                    if listed.is_empty() {
                        return Err(ProvisionError::NotFound("no nodes available".into()));
                    }
                    Ok(nodes_all_ready(&listed))
                })
                .await?;
            }
            Self::Classic => {}
        }
        info!(profile = self.name(), "End: cluster health checks");
        Ok(())
    }
}

/// Whether a node list is non-empty and no node reports Ready false.
///
/// A node without a Ready condition does not block.
#[must_use]
pub fn nodes_all_ready(nodes: &[NodeReadiness]) -> bool {
    !nodes.is_empty() && nodes.iter().all(|n| n.ready != Some(false))
}
