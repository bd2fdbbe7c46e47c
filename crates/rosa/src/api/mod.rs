//! Collaborator contracts consumed by the lifecycle orchestrator.
//!
//! Each trait is a thin call/response seam over one external system. Real
//! implementations live in [`crate::provider`], [`crate::terraform`],
//! [`crate::nodes`] and [`crate::muo`]; tests substitute mocks.

mod models;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::credentials::CallContext;
use crate::error::ProvisionError;
use crate::request::ClusterSpec;

pub use models::{
    AccountRole, AccountRoleSet, ClusterHandle, ClusterPage, ClusterRecord, GateAgreement,
    NetworkTopology, NodeReadiness, OidcConfig, OidcConfigRequest, UpgradeHistory,
    UpgradePolicy, VersionGate, ROLE_TYPE_CONTROL_PLANE, ROLE_TYPE_INSTALLER, ROLE_TYPE_SUPPORT,
    ROLE_TYPE_WORKER, UPGRADE_PHASE_FAILED, UPGRADE_PHASE_UPGRADED, VERSION_GATE_LABEL,
};

/// Identity service: account roles keyed by prefix and version.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountRoleApi: Send + Sync {
    /// List every account role visible to the credentials.
    async fn list_account_roles(&self, ctx: &CallContext)
        -> Result<Vec<AccountRole>, ProvisionError>;

    /// Create the full set of account roles for `prefix` at `version`.
    async fn create_account_roles(
        &self,
        prefix: &str,
        version: &str,
        channel_group: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError>;

    /// Delete all account roles carrying `prefix`.
    async fn delete_account_roles(&self, prefix: &str, ctx: &CallContext)
        -> Result<(), ProvisionError>;
}

/// OIDC trust configurations and identity-provider registrations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OidcConfigApi: Send + Sync {
    /// List all OIDC configs.
    async fn list_oidc_configs(&self, ctx: &CallContext) -> Result<Vec<OidcConfig>, ProvisionError>;

    /// Create a config and return its id.
    async fn create_oidc_config(
        &self,
        request: &OidcConfigRequest,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError>;

    /// Delete a config by id.
    async fn delete_oidc_config(&self, id: &str, ctx: &CallContext) -> Result<(), ProvisionError>;

    /// The config attached to a live cluster.
    async fn cluster_oidc_config(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<OidcConfig, ProvisionError>;

    /// Delete the identity-provider registration tied to a cluster.
    async fn delete_oidc_provider(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError>;
}

/// Cluster-management control API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submit a cluster creation.
    async fn create_cluster(&self, spec: &ClusterSpec, ctx: &CallContext)
        -> Result<(), ProvisionError>;

    /// Search clusters with a query expression.
    async fn list_clusters(
        &self,
        search: &str,
        page: u32,
        size: u32,
        ctx: &CallContext,
    ) -> Result<ClusterPage, ProvisionError>;

    /// Current state of a cluster (e.g. `installing`, `ready`).
    async fn describe_cluster(&self, id: &str, ctx: &CallContext) -> Result<String, ProvisionError>;

    /// Submit a cluster deletion.
    async fn delete_cluster(&self, id: &str, ctx: &CallContext) -> Result<(), ProvisionError>;

    /// Delete the operator roles created for a cluster.
    async fn delete_operator_roles(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError>;

    /// Admin kubeconfig of a cluster.
    async fn kubeconfig(&self, cluster_id: &str, ctx: &CallContext)
        -> Result<String, ProvisionError>;
}

/// Infrastructure-as-code runner working against a directory.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InfraPlan: Send + Sync {
    /// Initialise the working directory.
    async fn init(&self, dir: &Path, ctx: &CallContext) -> Result<(), ProvisionError>;

    /// Plan with the given variables.
    async fn plan(
        &self,
        dir: &Path,
        vars: &BTreeMap<String, String>,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError>;

    /// Apply the last plan.
    async fn apply(&self, dir: &Path, ctx: &CallContext) -> Result<(), ProvisionError>;

    /// Outputs by name. Values may still carry JSON quoting.
    async fn output(
        &self,
        dir: &Path,
        ctx: &CallContext,
    ) -> Result<BTreeMap<String, String>, ProvisionError>;

    /// Destroy everything managed in the directory.
    async fn destroy(
        &self,
        dir: &Path,
        vars: &BTreeMap<String, String>,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError>;

    /// Remove the tool's local installation state from the directory.
    async fn uninstall(&self, dir: &Path) -> Result<(), ProvisionError>;
}

/// Container orchestration API used for post-install checks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeHealthApi: Send + Sync {
    /// List nodes of the cluster reachable through `kubeconfig`.
    async fn list_nodes(
        &self,
        kubeconfig: &str,
        ctx: &CallContext,
    ) -> Result<Vec<NodeReadiness>, ProvisionError>;
}

/// Version gates, gate agreements and upgrade policies.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpgradeApi: Send + Sync {
    /// List every version gate.
    async fn list_version_gates(&self, ctx: &CallContext)
        -> Result<Vec<VersionGate>, ProvisionError>;

    /// Gate agreements a cluster already holds.
    async fn list_gate_agreements(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<Vec<GateAgreement>, ProvisionError>;

    /// Acknowledge version gate `gate_id` for a cluster.
    async fn add_gate_agreement(
        &self,
        cluster_id: &str,
        gate_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError>;

    /// Schedule an upgrade and return the policy as accepted.
    async fn schedule_upgrade(
        &self,
        cluster_id: &str,
        policy: &UpgradePolicy,
        ctx: &CallContext,
    ) -> Result<UpgradePolicy, ProvisionError>;
}

/// In-cluster upgrade operator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpgradeOperatorApi: Send + Sync {
    /// Scale the operator down and back up so it picks up a new policy.
    async fn restart_operator(&self, kubeconfig: &str, ctx: &CallContext)
        -> Result<(), ProvisionError>;

    /// Upgrade history of the operator's config, `None` while no config exists.
    async fn upgrade_history(
        &self,
        kubeconfig: &str,
        ctx: &CallContext,
    ) -> Result<Option<Vec<UpgradeHistory>>, ProvisionError>;
}
