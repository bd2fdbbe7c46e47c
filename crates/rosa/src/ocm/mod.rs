//! OpenShift Cluster Manager (OCM) REST client.
//!
//! Used for the reads the `rosa` CLI does not expose in machine-readable
//! form: cluster search, a cluster's OIDC config, the OIDC config list and
//! cluster credentials. Version gates, gate agreements and upgrade policies
//! have no CLI counterpart and are only reachable here.

mod client;
mod models;

pub use client::OcmClient;
pub use models::{
    ClusterBody, ClusterCredentials, ClusterList, GateAgreementList, GateAgreementRequest,
    GateRef, OidcConfigList, VersionGateList,
};
