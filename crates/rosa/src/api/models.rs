//! Records exchanged with the external collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role type labels reported by `rosa list account-roles`.
pub const ROLE_TYPE_CONTROL_PLANE: &str = "Control plane";
pub const ROLE_TYPE_INSTALLER: &str = "Installer";
pub const ROLE_TYPE_SUPPORT: &str = "Support";
pub const ROLE_TYPE_WORKER: &str = "Worker";

/// One account role as listed by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRole {
    #[serde(rename = "RoleName")]
    pub name: String,
    #[serde(rename = "RoleARN")]
    pub arn: String,
    #[serde(rename = "RoleType")]
    pub role_type: String,
    #[serde(rename = "Version", default)]
    pub version: String,
}

/// The four account roles required by STS clusters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountRoleSet {
    pub control_plane: String,
    pub installer: String,
    pub support: String,
    pub worker: String,
}

/// An OIDC trust configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Config identifier.
    pub id: String,
    /// Reference to the secret owning the config's private key.
    #[serde(default)]
    pub secret_arn: String,
    /// Whether the config is managed by the service.
    #[serde(default)]
    pub managed: bool,
    /// Issuer URL.
    #[serde(default)]
    pub issuer_url: String,
}

/// Parameters for creating an OIDC config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfigRequest {
    /// Prefix the config's secret is named with.
    pub prefix: String,
    /// Installer role the config trusts.
    pub installer_role_arn: String,
    /// Managed (service-hosted) or unmanaged config.
    pub managed: bool,
}

/// A cluster record returned by the cluster-management API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
}

/// A page of cluster search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterPage {
    /// Total matches across all pages.
    pub total: u64,
    /// Records on this page.
    pub items: Vec<ClusterRecord>,
}

/// Opaque reference to a created cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHandle {
    pub id: String,
    pub name: String,
}

impl From<ClusterRecord> for ClusterHandle {
    fn from(record: ClusterRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
        }
    }
}

/// The three subnets created for a hosted control plane cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub cluster_private_subnet: String,
    pub cluster_public_subnet: String,
    pub node_private_subnet: String,
}

impl NetworkTopology {
    /// Subnets handed to cluster creation, private first.
    #[must_use]
    pub fn cluster_subnet_ids(&self) -> Vec<String> {
        vec![
            self.cluster_private_subnet.clone(),
            self.cluster_public_subnet.clone(),
        ]
    }
}

/// Ready condition of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReadiness {
    /// Node name.
    pub name: String,
    /// Status of the `Ready` condition, `None` if the node reports none.
    pub ready: Option<bool>,
}

/// Label carried by the version gates that guard OpenShift minor upgrades.
pub const VERSION_GATE_LABEL: &str = "api.openshift.com/gate-ocp";

/// Upgrade history phase of a finished upgrade.
pub const UPGRADE_PHASE_UPGRADED: &str = "Upgraded";
/// Upgrade history phase of a failed upgrade.
pub const UPGRADE_PHASE_FAILED: &str = "Failed";

/// A version gate that must be acknowledged before a minor upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionGate {
    pub id: String,
    /// `major.minor` the gate applies to.
    #[serde(default)]
    pub version_raw_id_prefix: String,
    #[serde(default)]
    pub label: String,
}

/// A cluster's acknowledgement of a version gate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GateAgreement {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version_gate: VersionGate,
}

/// An upgrade policy scheduled on a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePolicy {
    /// Target OpenShift version.
    pub version: String,
    /// When the upgrade starts.
    pub next_run: DateTime<Utc>,
    #[serde(default)]
    pub schedule_type: String,
}

impl UpgradePolicy {
    /// A one-off upgrade to `version` starting at `next_run`.
    #[must_use]
    pub fn manual(version: impl Into<String>, next_run: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            next_run,
            schedule_type: "manual".to_string(),
        }
    }
}

/// One entry of the upgrade operator's history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpgradeHistory {
    pub version: String,
    /// e.g. `Pending`, `Upgrading`, `Upgraded`, `Failed`.
    pub phase: String,
    /// Message of the first condition, if any.
    pub message: Option<String>,
}

impl UpgradeHistory {
    /// Whether the upgrade has finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == UPGRADE_PHASE_UPGRADED || self.phase == UPGRADE_PHASE_FAILED
    }
}
