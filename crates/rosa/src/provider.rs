//! Composite ROSA backend.
//!
//! Mutations and cluster describe run through the `rosa` CLI; searches,
//! OIDC reads, credentials and upgrade scheduling come from the OCM REST API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::api::{
    AccountRole, AccountRoleApi, ClusterApi, ClusterPage, GateAgreement, OidcConfig,
    OidcConfigApi, OidcConfigRequest, UpgradeApi, UpgradePolicy, VersionGate,
};
use crate::cli::RosaCli;
use crate::config::LifecycleConfig;
use crate::credentials::CallContext;
use crate::error::ProvisionError;
use crate::exec::CommandRunner;
use crate::ocm::OcmClient;
use crate::request::ClusterSpec;

/// Account-role, OIDC and cluster collaborator backed by `rosa` and OCM.
#[derive(Debug, Clone)]
pub struct RosaProvider {
    cli: RosaCli,
    ocm: OcmClient,
}

impl RosaProvider {
    /// Combine an existing CLI wrapper and REST client.
    #[must_use]
    pub fn new(cli: RosaCli, ocm: OcmClient) -> Self {
        Self { cli, ocm }
    }

    /// Locate `rosa`, check its version and log in with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] if the binary is missing or too old,
    /// [`ProvisionError::ValidationFailed`] for an empty token, or the login
    /// failure.
    pub async fn connect(
        config: &LifecycleConfig,
        token: &str,
        runner: Arc<dyn CommandRunner>,
        ctx: &CallContext,
    ) -> Result<Self, ProvisionError> {
        let url = config.ocm_environment.url();
        let ocm = OcmClient::new(token, url)?;
        let cli = RosaCli::locate(config.rosa_binary.clone(), runner)?;
        cli.verify_version(ctx.cancel()).await?;
        cli.login(token, url, ctx).await?;
        info!(environment = %config.ocm_environment, "✅ Connected to OCM");
        Ok(Self::new(cli, ocm))
    }

    /// The CLI wrapper.
    #[must_use]
    pub fn cli(&self) -> &RosaCli {
        &self.cli
    }
}

#[async_trait]
impl AccountRoleApi for RosaProvider {
    async fn list_account_roles(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<AccountRole>, ProvisionError> {
        self.cli.list_account_roles(ctx).await
    }

    async fn create_account_roles(
        &self,
        prefix: &str,
        version: &str,
        channel_group: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.cli
            .create_account_roles(prefix, version, channel_group, ctx)
            .await
    }

    async fn delete_account_roles(
        &self,
        prefix: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.cli.delete_account_roles(prefix, ctx).await
    }
}

#[async_trait]
impl OidcConfigApi for RosaProvider {
    async fn list_oidc_configs(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<OidcConfig>, ProvisionError> {
        self.ocm.list_oidc_configs(ctx).await
    }

    async fn create_oidc_config(
        &self,
        request: &OidcConfigRequest,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        self.cli.create_oidc_config(request, ctx).await
    }

    async fn delete_oidc_config(&self, id: &str, ctx: &CallContext) -> Result<(), ProvisionError> {
        self.cli.delete_oidc_config(id, ctx).await
    }

    async fn cluster_oidc_config(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<OidcConfig, ProvisionError> {
        self.ocm.cluster_oidc_config(cluster_id, ctx).await
    }

    async fn delete_oidc_provider(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.cli.delete_oidc_provider(cluster_id, ctx).await
    }
}

#[async_trait]
impl ClusterApi for RosaProvider {
    async fn create_cluster(
        &self,
        spec: &ClusterSpec,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.cli.create_cluster(spec, ctx).await
    }

    async fn list_clusters(
        &self,
        search: &str,
        page: u32,
        size: u32,
        ctx: &CallContext,
    ) -> Result<ClusterPage, ProvisionError> {
        self.ocm.list_clusters(search, page, size, ctx).await
    }

    async fn describe_cluster(
        &self,
        id: &str,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        self.cli.describe_cluster(id, ctx).await
    }

    async fn delete_cluster(&self, id: &str, ctx: &CallContext) -> Result<(), ProvisionError> {
        self.cli.delete_cluster(id, ctx).await
    }

    async fn delete_operator_roles(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.cli.delete_operator_roles(cluster_id, ctx).await
    }

    async fn kubeconfig(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        self.ocm.kubeconfig(cluster_id, ctx).await
    }
}

#[async_trait]
impl UpgradeApi for RosaProvider {
    async fn list_version_gates(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<VersionGate>, ProvisionError> {
        self.ocm.list_version_gates(ctx).await
    }

    async fn list_gate_agreements(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<Vec<GateAgreement>, ProvisionError> {
        self.ocm.list_gate_agreements(cluster_id, ctx).await
    }

    async fn add_gate_agreement(
        &self,
        cluster_id: &str,
        gate_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        let agreement = self.ocm.add_gate_agreement(cluster_id, gate_id, ctx).await?;
        info!(cluster_id = %cluster_id, agreement_id = %agreement.id, "Gate agreement created");
        Ok(())
    }

    async fn schedule_upgrade(
        &self,
        cluster_id: &str,
        policy: &UpgradePolicy,
        ctx: &CallContext,
    ) -> Result<UpgradePolicy, ProvisionError> {
        self.ocm.add_upgrade_policy(cluster_id, policy, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use mockall::Sequence;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::credentials::AwsCredentials;
    use crate::exec::{CommandOutput, MockCommandRunner};

    fn ctx() -> CallContext {
        CallContext::new(
            Arc::new(AwsCredentials::from_profile("test", "us-east-1")),
            CancellationToken::new(),
        )
    }

    fn config() -> LifecycleConfig {
        LifecycleConfig {
            rosa_binary: Some(PathBuf::from("/usr/bin/rosa")),
            ..LifecycleConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connect_checks_version_then_logs_in() {
        let mut seq = Sequence::new();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| spec.args == ["version"])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(CommandOutput::stdout("1.2.40\n")));
        runner
            .expect_run()
            .withf(|spec, _| {
                spec.args == ["login", "--token", "tok", "--env", "https://api.openshift.com"]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(CommandOutput::default()));

        let provider = RosaProvider::connect(&config(), "tok", Arc::new(runner), &ctx())
            .await
            .unwrap();
        assert_eq!(provider.cli().binary(), PathBuf::from("/usr/bin/rosa"));
    }

    #[tokio::test]
    async fn test_connect_stops_on_old_cli() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_, _| Ok(CommandOutput::stdout("1.1.0\n")));

        let err = RosaProvider::connect(&config(), "tok", Arc::new(runner), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[tokio::test]
    async fn test_reads_go_to_ocm_and_mutations_to_cli() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/oidc_configs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "oidc-1", "secret_arn": "arn:c1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| spec.args[..2] == ["delete", "oidc-config"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::default()));

        let provider = RosaProvider::new(
            RosaCli::new("rosa", Arc::new(runner)),
            OcmClient::new("tok", server.uri()).unwrap(),
        );
        let configs = provider.list_oidc_configs(&ctx()).await.unwrap();
        assert_eq!(configs[0].id, "oidc-1");
        provider.delete_oidc_config("oidc-1", &ctx()).await.unwrap();
    }

    #[tokio::test]
    async fn test_gate_agreements_never_touch_the_cli() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clusters_mgmt/v1/clusters/abc/gate_agreements"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "agreement-1",
                "version_gate": {"id": "gate-415"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let provider = RosaProvider::new(
            RosaCli::new("rosa", Arc::new(runner)),
            OcmClient::new("tok", server.uri()).unwrap(),
        );
        provider
            .add_gate_agreement("abc", "gate-415", &ctx())
            .await
            .unwrap();
    }
}
