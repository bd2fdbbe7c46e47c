//! Cluster-management API response bodies.

use serde::{Deserialize, Serialize};

use crate::api::{ClusterPage, ClusterRecord, GateAgreement, OidcConfig, VersionGate};

/// `GET /clusters` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<ClusterRecord>,
}

impl From<ClusterList> for ClusterPage {
    fn from(list: ClusterList) -> Self {
        Self {
            total: list.total,
            items: list.items,
        }
    }
}

/// `GET /clusters/{id}` response, reduced to the STS settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterBody {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub aws: Option<AwsSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsSettings {
    #[serde(default)]
    pub sts: Option<StsSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StsSettings {
    #[serde(default)]
    pub oidc_config: Option<OidcConfig>,
}

impl ClusterBody {
    /// The OIDC config attached to the cluster, if any.
    #[must_use]
    pub fn oidc_config(self) -> Option<OidcConfig> {
        self.aws.and_then(|a| a.sts).and_then(|s| s.oidc_config)
    }
}

/// `GET /oidc_configs` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OidcConfigList {
    #[serde(default)]
    pub items: Vec<OidcConfig>,
}

/// `GET /clusters/{id}/credentials` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterCredentials {
    #[serde(default)]
    pub kubeconfig: String,
}

/// `GET /version_gates` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionGateList {
    #[serde(default)]
    pub items: Vec<VersionGate>,
}

/// `GET /clusters/{id}/gate_agreements` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateAgreementList {
    #[serde(default)]
    pub items: Vec<GateAgreement>,
}

/// `POST /clusters/{id}/gate_agreements` body.
#[derive(Debug, Clone, Serialize)]
pub struct GateAgreementRequest<'a> {
    pub version_gate: GateRef<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateRef<'a> {
    pub id: &'a str,
}
