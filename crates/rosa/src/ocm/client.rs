//! OCM API client implementation.
//!
//! API Documentation: <https://api.openshift.com/>

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::models::{
    ClusterBody, ClusterCredentials, ClusterList, GateAgreementList, GateAgreementRequest,
    GateRef, OidcConfigList, VersionGateList,
};
use crate::api::{ClusterPage, GateAgreement, OidcConfig, UpgradePolicy, VersionGate};
use crate::credentials::CallContext;
use crate::error::ProvisionError;

/// Path prefix of the clusters management API.
const API_PREFIX: &str = "/api/clusters_mgmt/v1";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Authenticated OCM client.
#[derive(Clone)]
pub struct OcmClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for OcmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcmClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OcmClient {
    /// Create a client for the environment at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] if the token or URL is
    /// empty, or [`ProvisionError::Config`] if the HTTP client cannot be built.
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        let token = token.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if token.is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "ocm_token",
                reason: "is required",
            });
        }
        if base_url.is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "ocm_environment",
                reason: "is required",
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProvisionError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Base URL of the environment.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search clusters.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ExternalCallFailed`] on transport or API errors.
    pub async fn list_clusters(
        &self,
        search: &str,
        page: u32,
        size: u32,
        ctx: &CallContext,
    ) -> Result<ClusterPage, ProvisionError> {
        let page = page.to_string();
        let size = size.to_string();
        let list: ClusterList = ctx
            .guard(self.get(
                "list clusters",
                "/clusters",
                &[("search", search), ("page", &page), ("size", &size)],
            ))
            .await?;
        Ok(list.into())
    }

    /// OIDC config attached to a cluster. A cluster without one yields an
    /// empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotFound`] for an unknown cluster, otherwise
    /// [`ProvisionError::ExternalCallFailed`].
    pub async fn cluster_oidc_config(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<OidcConfig, ProvisionError> {
        let body: ClusterBody = ctx
            .guard(self.get("get cluster", &format!("/clusters/{cluster_id}"), &[]))
            .await?;
        Ok(body.oidc_config().unwrap_or_default())
    }

    /// All OIDC configs of the organization.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ExternalCallFailed`] on transport or API errors.
    pub async fn list_oidc_configs(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<OidcConfig>, ProvisionError> {
        let list: OidcConfigList = ctx
            .guard(self.get("list oidc configs", "/oidc_configs", &[]))
            .await?;
        Ok(list.items)
    }

    /// Admin kubeconfig of a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotFound`] if the cluster has no credentials,
    /// otherwise [`ProvisionError::ExternalCallFailed`].
    pub async fn kubeconfig(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        let credentials: ClusterCredentials = ctx
            .guard(self.get(
                "get cluster credentials",
                &format!("/clusters/{cluster_id}/credentials"),
                &[],
            ))
            .await?;
        if credentials.kubeconfig.is_empty() {
            return Err(ProvisionError::NotFound(format!(
                "kubeconfig of cluster {cluster_id:?}"
            )));
        }
        Ok(credentials.kubeconfig)
    }

    /// All version gates.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ExternalCallFailed`] on transport or API errors.
    pub async fn list_version_gates(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<VersionGate>, ProvisionError> {
        let list: VersionGateList = ctx
            .guard(self.get("list version gates", "/version_gates", &[]))
            .await?;
        Ok(list.items)
    }

    /// Gate agreements of a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotFound`] for an unknown cluster, otherwise
    /// [`ProvisionError::ExternalCallFailed`].
    pub async fn list_gate_agreements(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<Vec<GateAgreement>, ProvisionError> {
        let list: GateAgreementList = ctx
            .guard(self.get(
                "list gate agreements",
                &format!("/clusters/{cluster_id}/gate_agreements"),
                &[],
            ))
            .await?;
        Ok(list.items)
    }

    /// Acknowledge a version gate for a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ExternalCallFailed`] on transport or API errors.
    pub async fn add_gate_agreement(
        &self,
        cluster_id: &str,
        gate_id: &str,
        ctx: &CallContext,
    ) -> Result<GateAgreement, ProvisionError> {
        let body = GateAgreementRequest {
            version_gate: GateRef { id: gate_id },
        };
        ctx.guard(self.post(
            "add gate agreement",
            &format!("/clusters/{cluster_id}/gate_agreements"),
            &body,
        ))
        .await
    }

    /// Schedule an upgrade policy on a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ExternalCallFailed`] on transport or API errors.
    pub async fn add_upgrade_policy(
        &self,
        cluster_id: &str,
        policy: &UpgradePolicy,
        ctx: &CallContext,
    ) -> Result<UpgradePolicy, ProvisionError> {
        ctx.guard(self.post(
            "add upgrade policy",
            &format!("/clusters/{cluster_id}/upgrade_policies"),
            policy,
        ))
        .await
    }

    /// Make an authenticated GET request.
    async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProvisionError> {
        let url = format!("{}{API_PREFIX}{path}", self.base_url);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| ProvisionError::external(operation, e))?;

        Self::handle_response(operation, response).await
    }

    /// Make an authenticated POST request with a JSON body.
    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ProvisionError> {
        let url = format!("{}{API_PREFIX}{path}", self.base_url);
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ProvisionError::external(operation, e))?;

        Self::handle_response(operation, response).await
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: DeserializeOwned>(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T, ProvisionError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProvisionError::external(operation, e))?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|source| {
                warn!(operation = %operation, error = %source, "Failed to parse response");
                ProvisionError::Decode {
                    operation: operation.to_string(),
                    source,
                }
            })
        } else if status == StatusCode::NOT_FOUND {
            Err(ProvisionError::NotFound(format!("{operation}: {text}")))
        } else {
            Err(ProvisionError::external(
                operation,
                format!("status {}: {text}", status.as_u16()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::credentials::AwsCredentials;

    fn ctx() -> CallContext {
        CallContext::new(
            Arc::new(AwsCredentials::from_profile("test", "us-east-1")),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_list_clusters_sends_search_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/clusters"))
            .and(query_param("search", "product.id = 'rosa' AND name = 'c1'"))
            .and(query_param("page", "1"))
            .and(query_param("size", "1"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "ClusterList",
                "page": 1,
                "size": 1,
                "total": 1,
                "items": [{"id": "abc", "name": "c1", "state": "installing"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OcmClient::new("secret-token", server.uri()).unwrap();
        let page = client
            .list_clusters("product.id = 'rosa' AND name = 'c1'", 1, 1, &ctx())
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "abc");
        assert_eq!(page.items[0].state, "installing");
    }

    #[tokio::test]
    async fn test_cluster_oidc_config_reads_sts_section() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/clusters/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "abc",
                "aws": {"sts": {"oidc_config": {
                    "id": "oidc-1",
                    "secret_arn": "arn:aws:secretsmanager:us-east-1:1:secret:c1",
                    "managed": false
                }}}
            })))
            .mount(&server)
            .await;

        let client = OcmClient::new("t", server.uri()).unwrap();
        let config = client.cluster_oidc_config("abc", &ctx()).await.unwrap();
        assert_eq!(config.id, "oidc-1");
        assert!(!config.managed);
    }

    #[tokio::test]
    async fn test_not_found_and_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/clusters/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such cluster"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/oidc_configs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = OcmClient::new("t", server.uri()).unwrap();
        let err = client
            .cluster_oidc_config("missing", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound(_)));

        let err = client.list_oidc_configs(&ctx()).await.unwrap_err();
        match err {
            ProvisionError::ExternalCallFailed { message, .. } => assert!(message.contains("500")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_kubeconfig() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/clusters/abc/credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"kubeconfig": "apiVersion: v1\n"})),
            )
            .mount(&server)
            .await;

        let client = OcmClient::new("t", server.uri()).unwrap();
        let kubeconfig = client.kubeconfig("abc", &ctx()).await.unwrap();
        assert!(kubeconfig.starts_with("apiVersion"));
    }

    #[tokio::test]
    async fn test_version_gates_and_gate_agreements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/version_gates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "gate-415",
                    "version_raw_id_prefix": "4.15",
                    "label": "api.openshift.com/gate-ocp",
                    "description": "OpenShift 4.15 API removals"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/clusters/abc/gate_agreements"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "agreement-1", "version_gate": {"id": "gate-414"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/clusters_mgmt/v1/clusters/abc/gate_agreements"))
            .and(body_json(serde_json::json!({"version_gate": {"id": "gate-415"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "agreement-2",
                "version_gate": {"id": "gate-415"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OcmClient::new("t", server.uri()).unwrap();
        let gates = client.list_version_gates(&ctx()).await.unwrap();
        assert_eq!(gates[0].version_raw_id_prefix, "4.15");
        assert_eq!(gates[0].label, "api.openshift.com/gate-ocp");

        let agreements = client.list_gate_agreements("abc", &ctx()).await.unwrap();
        assert_eq!(agreements[0].version_gate.id, "gate-414");

        let added = client
            .add_gate_agreement("abc", "gate-415", &ctx())
            .await
            .unwrap();
        assert_eq!(added.id, "agreement-2");
    }

    #[tokio::test]
    async fn test_add_upgrade_policy_posts_manual_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clusters_mgmt/v1/clusters/abc/upgrade_policies"))
            .and(body_json(serde_json::json!({
                "version": "4.15.2",
                "next_run": "2026-10-16T12:07:00Z",
                "schedule_type": "manual"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "policy-1",
                "version": "4.15.2",
                "next_run": "2026-10-16T12:07:00Z",
                "schedule_type": "manual",
                "upgrade_type": "OSD"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let next_run = Utc.with_ymd_and_hms(2026, 10, 16, 12, 7, 0).unwrap();
        let client = OcmClient::new("t", server.uri()).unwrap();
        let accepted = client
            .add_upgrade_policy("abc", &UpgradePolicy::manual("4.15.2", next_run), &ctx())
            .await
            .unwrap();

        assert_eq!(accepted.version, "4.15.2");
        assert_eq!(accepted.next_run, next_run);
    }

    #[test]
    fn test_new_rejects_empty_token() {
        assert!(matches!(
            OcmClient::new("", "https://api.openshift.com"),
            Err(ProvisionError::ValidationFailed {
                field: "ocm_token",
                ..
            })
        ));
    }
}
