//! Wrapper around the `rosa` command-line tool.
//!
//! Every mutation of account roles, OIDC configs, operator roles and clusters
//! goes through `rosa` in non-interactive mode. Credentials from the
//! [`CallContext`] are applied to each child process only.

mod args;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{AccountRole, OidcConfigRequest};
use crate::credentials::CallContext;
use crate::error::ProvisionError;
use crate::exec::{decode_list, decode_object, CommandOutput, CommandRunner, CommandSpec};
use crate::request::ClusterSpec;
use crate::version::Version;

/// Oldest `rosa` release the flag sets are known to work with.
pub const MINIMUM_VERSION: Version = Version::new(1, 2, 22);

/// Name of the binary looked up on `PATH`.
pub const ROSA_BINARY: &str = "rosa";

#[derive(Debug, Deserialize)]
struct CreatedOidcConfig {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DescribedCluster {
    status: ClusterStatus,
}

#[derive(Debug, Deserialize)]
struct ClusterStatus {
    #[serde(default)]
    state: String,
}

/// Runs `rosa` sub-commands.
#[derive(Clone)]
pub struct RosaCli {
    binary: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for RosaCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosaCli").field("binary", &self.binary).finish()
    }
}

impl RosaCli {
    /// Use `binary` through `runner`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    /// Use the explicit path if given, otherwise find `rosa` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] if no binary can be found.
    pub fn locate(
        explicit: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ProvisionError> {
        let binary = match explicit {
            Some(path) => path,
            None => which::which(ROSA_BINARY).map_err(|e| {
                ProvisionError::Config(format!("{ROSA_BINARY} binary not found on PATH: {e}"))
            })?,
        };
        debug!(binary = %binary.display(), "Using rosa binary");
        Ok(Self::new(binary, runner))
    }

    /// Path of the binary in use.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Check that the installed `rosa` is at least [`MINIMUM_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] if the version is too old or cannot
    /// be read, or the command's error.
    pub async fn verify_version(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Version, ProvisionError> {
        let output = self
            .runner
            .run(CommandSpec::new(&self.binary).args(args::version()), cancel)
            .await?;
        let first_line = output.stdout.lines().next().unwrap_or_default().trim();
        let current: Version = first_line.parse().map_err(|e| {
            ProvisionError::Config(format!("unable to read rosa version: {e}"))
        })?;

        if current < MINIMUM_VERSION {
            return Err(ProvisionError::Config(format!(
                "current rosa version is {current} and must be >= {MINIMUM_VERSION}"
            )));
        }
        info!(version = %current, "rosa version check passed");
        Ok(current)
    }

    /// Verify the OCM token and AWS credentials by logging in.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn login(
        &self,
        token: &str,
        environment_url: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.run(args::login(token, environment_url), ctx)
            .await
            .map(|_| ())
    }

    /// `rosa list account-roles`.
    ///
    /// # Errors
    ///
    /// Returns the command's error or a decode error.
    pub async fn list_account_roles(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<AccountRole>, ProvisionError> {
        let output = self.run(args::list_account_roles(), ctx).await?;
        decode_list("list account-roles", &output.stdout)
    }

    /// `rosa create account-roles`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn create_account_roles(
        &self,
        prefix: &str,
        version: &str,
        channel_group: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.run(args::create_account_roles(prefix, version, channel_group), ctx)
            .await
            .map(|_| ())
    }

    /// `rosa delete account-roles`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn delete_account_roles(
        &self,
        prefix: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.run(args::delete_account_roles(prefix), ctx).await.map(|_| ())
    }

    /// `rosa create oidc-config`, returning the new config id.
    ///
    /// # Errors
    ///
    /// Returns the command's error or a decode error.
    pub async fn create_oidc_config(
        &self,
        request: &OidcConfigRequest,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        let output = self.run(args::create_oidc_config(request), ctx).await?;
        let created: CreatedOidcConfig = decode_object("create oidc-config", &output.stdout)?;
        Ok(created.id)
    }

    /// `rosa delete oidc-config`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn delete_oidc_config(
        &self,
        id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.run(args::delete_oidc_config(id), ctx).await.map(|_| ())
    }

    /// `rosa delete oidc-provider`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn delete_oidc_provider(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.run(args::delete_oidc_provider(cluster_id), ctx)
            .await
            .map(|_| ())
    }

    /// `rosa delete operator-roles`.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn delete_operator_roles(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.run(args::delete_operator_roles(cluster_id), ctx)
            .await
            .map(|_| ())
    }

    /// `rosa create cluster` in the context's region.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn create_cluster(
        &self,
        spec: &ClusterSpec,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        info!(
            cluster = %spec.name,
            version = %spec.version,
            hosted_cp = spec.hosted.is_some(),
            "Creating cluster"
        );
        self.run(args::create_cluster(spec, ctx.region()), ctx)
            .await
            .map(|_| ())
    }

    /// `rosa describe cluster`, returning `status.state`.
    ///
    /// # Errors
    ///
    /// Returns the command's error or a decode error.
    pub async fn describe_cluster(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        let output = self.run(args::describe_cluster(cluster_id), ctx).await?;
        let described: DescribedCluster = decode_object("describe cluster", &output.stdout)?;
        Ok(described.status.state)
    }

    /// `rosa delete cluster`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] for an empty id, otherwise
    /// the command's error.
    pub async fn delete_cluster(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        if cluster_id.is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "cluster_id",
                reason: "is required",
            });
        }
        self.run(args::delete_cluster(cluster_id), ctx).await.map(|_| ())
    }

    async fn run(
        &self,
        args: Vec<String>,
        ctx: &CallContext,
    ) -> Result<CommandOutput, ProvisionError> {
        let spec = CommandSpec::new(&self.binary)
            .args(args)
            .with_credentials(ctx.credentials());
        self.runner.run(spec, ctx.cancel()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AwsCredentials;
    use crate::exec::MockCommandRunner;

    fn ctx() -> CallContext {
        CallContext::new(
            Arc::new(AwsCredentials::from_profile("ci", "us-east-2")),
            CancellationToken::new(),
        )
    }

    fn cli(runner: MockCommandRunner) -> RosaCli {
        RosaCli::new("/usr/bin/rosa", Arc::new(runner))
    }

    #[tokio::test]
    async fn test_version_gate() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| spec.args == ["version"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::stdout("1.2.21\nI: There is a newer release\n")));

        let err = cli(runner)
            .verify_version(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::stdout("1.2.38\n")));
        let version = cli(runner)
            .verify_version(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(version, Version::new(1, 2, 38));
    }

    #[tokio::test]
    async fn test_commands_carry_credentials_in_child_env() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| {
                spec.program == Path::new("/usr/bin/rosa")
                    && spec.args[..2] == ["delete", "account-roles"]
                    && spec
                        .envs
                        .contains(&("AWS_PROFILE".to_string(), "ci".to_string()))
                    && spec
                        .envs
                        .contains(&("AWS_REGION".to_string(), "us-east-2".to_string()))
            })
            .times(1)
            .returning(|_, _| Ok(CommandOutput::default()));

        cli(runner).delete_account_roles("c1", &ctx()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_account_roles_decodes_output() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(CommandOutput::stdout(
                serde_json::json!([{
                    "RoleName": "c1-Worker-Role",
                    "RoleARN": "arn:w",
                    "RoleType": "Worker",
                    "Version": "4.12"
                }])
                .to_string(),
            ))
        });

        let roles = cli(runner).list_account_roles(&ctx()).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role_type, "Worker");
        assert_eq!(roles[0].version, "4.12");
    }

    #[tokio::test]
    async fn test_create_oidc_config_returns_id() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::stdout(r#"{"id":"oidc-1","managed":false}"#)));

        let id = cli(runner)
            .create_oidc_config(
                &OidcConfigRequest {
                    prefix: "c1".into(),
                    installer_role_arn: "arn:inst".into(),
                    managed: false,
                },
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(id, "oidc-1");
    }

    #[tokio::test]
    async fn test_describe_cluster_reads_state() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| {
                spec.args == ["describe", "cluster", "--cluster", "abc", "--output", "json"]
            })
            .returning(|_, _| {
                Ok(CommandOutput::stdout(
                    r#"{"id":"abc","status":{"state":"installing"}}"#,
                ))
            });

        let state = cli(runner).describe_cluster("abc", &ctx()).await.unwrap();
        assert_eq!(state, "installing");
    }

    #[tokio::test]
    async fn test_describe_cluster_shape_mismatch() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::stdout("[]")));

        let err = cli(runner).describe_cluster("abc", &ctx()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_delete_cluster_requires_id() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let err = cli(runner).delete_cluster("", &ctx()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ValidationFailed { .. }));
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let cli = RosaCli::locate(
            Some(PathBuf::from("/opt/rosa/bin/rosa")),
            Arc::new(MockCommandRunner::new()),
        )
        .unwrap();
        assert_eq!(cli.binary(), Path::new("/opt/rosa/bin/rosa"));
    }
}
