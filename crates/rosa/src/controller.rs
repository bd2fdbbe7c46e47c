//! Cluster lifecycle orchestration.
//!
//! [`ClusterLifecycleController`] runs the fixed create and delete sequences
//! over the account-role, OIDC, network and cluster-management collaborators.
//! Steps run strictly in order; the first failure ends the sequence and is
//! returned tagged with the stage and step it came from.
//!
//! A create that fails part way does not roll back what it already
//! provisioned. Run delete to clean up.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{
    AccountRoleApi, ClusterApi, ClusterHandle, InfraPlan, NodeHealthApi, OidcConfigApi,
};
use crate::config::LifecycleConfig;
use crate::credentials::{AwsCredentials, CallContext};
use crate::error::{LifecycleError, Operation, ProvisionError, Stage};
use crate::health::PostInstallHealthCheck;
use crate::network::NetworkProvisioner;
use crate::oidc::OidcConfigManager;
use crate::poll::{self, poll_until, PollPolicy};
use crate::request::{self, ClusterOptions, DeleteOptions, ProvisionedInputs};
use crate::roles::AccountRoleManager;
use crate::state::{DeletionState, ProvisioningState};

/// External systems the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub account_roles: Arc<dyn AccountRoleApi>,
    pub oidc: Arc<dyn OidcConfigApi>,
    pub clusters: Arc<dyn ClusterApi>,
    pub network: Arc<dyn InfraPlan>,
    pub nodes: Arc<dyn NodeHealthApi>,
}

/// Working directory and poll budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Base directory; each cluster's network plan lives in `<work_dir>/<name>`.
    pub work_dir: PathBuf,
    /// Wait for a hosted control plane cluster to become ready.
    pub hosted_ready: PollPolicy,
    /// Wait for a classic cluster to become ready.
    pub classic_ready: PollPolicy,
    /// Wait for a deleted cluster to disappear.
    pub deleted: PollPolicy,
    /// Wait for hosted control plane nodes to become Ready.
    pub node_health: PollPolicy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        LifecycleConfig::default().settings()
    }
}

/// Creates and deletes clusters.
pub struct ClusterLifecycleController {
    roles: AccountRoleManager,
    oidc: OidcConfigManager,
    network: NetworkProvisioner,
    clusters: Arc<dyn ClusterApi>,
    nodes: Arc<dyn NodeHealthApi>,
    credentials: Arc<AwsCredentials>,
    settings: LifecycleSettings,
}

fn create_error(operation: Operation) -> impl FnOnce(ProvisionError) -> LifecycleError {
    move |e| LifecycleError::new(Stage::Create, operation, e)
}

fn delete_error(
    operation: Operation,
    cluster_id: &str,
) -> impl FnOnce(ProvisionError) -> LifecycleError + '_ {
    move |e| LifecycleError::new(Stage::Delete, operation, e).with_cluster_id(cluster_id)
}

impl ClusterLifecycleController {
    /// Create a controller.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        credentials: Arc<AwsCredentials>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            roles: AccountRoleManager::new(collaborators.account_roles),
            oidc: OidcConfigManager::new(collaborators.oidc),
            network: NetworkProvisioner::new(collaborators.network),
            clusters: collaborators.clusters,
            nodes: collaborators.nodes,
            credentials,
            settings,
        }
    }

    /// Settings in effect.
    #[must_use]
    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Provision a cluster and wait until it is ready and healthy.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] naming the failed step. Failures after the
    /// cluster was submitted carry its id.
    pub async fn create(
        &self,
        options: &ClusterOptions,
        cancel: CancellationToken,
    ) -> Result<ClusterHandle, LifecycleError> {
        let ctx = CallContext::new(Arc::clone(&self.credentials), cancel);
        let options = options
            .resolve()
            .map_err(create_error(Operation::Validation))?;
        let name = options.name.as_str();
        let health = PostInstallHealthCheck::for_topology(
            options.hosted_control_plane,
            Arc::clone(&self.nodes),
            self.settings.node_health,
        );

        let mut state = ProvisioningState::Requested;
        info!(
            cluster = %name,
            version = %options.version,
            hosted_cp = options.hosted_control_plane,
            sts = options.sts,
            state = %state,
            "{}",
            state.description()
        );

        let mut inputs = ProvisionedInputs::default();

        if options.sts {
            let roles = self
                .roles
                .ensure(name, &options.major_minor, &options.channel_group, &ctx)
                .await
                .map_err(create_error(Operation::AccountRoles))?;
            inputs.account_roles = Some(roles);
        }
        advance_create(&mut state, name);

        if options.hosted_control_plane {
            let installer_role_arn = inputs
                .account_roles
                .as_ref()
                .map(|r| r.installer.as_str())
                .unwrap_or_default();
            let oidc_config_id = self
                .oidc
                .ensure(name, installer_role_arn, options.oidc_config_managed, &ctx)
                .await
                .map_err(create_error(Operation::OidcConfig))?;
            inputs.oidc_config_id = Some(oidc_config_id);
        }
        advance_create(&mut state, name);

        if options.hosted_control_plane {
            let topology = self
                .network
                .create(name, ctx.region(), &self.settings.work_dir.join(name), &ctx)
                .await
                .map_err(create_error(Operation::Network))?;
            inputs.network = Some(topology);
        }
        advance_create(&mut state, name);

        let spec = request::validate(&options, &inputs)
            .map_err(create_error(Operation::Validation))?;

        self.clusters
            .create_cluster(&spec, &ctx)
            .await
            .map_err(create_error(Operation::Cluster))?;
        let handle = self
            .find_cluster(name, &ctx)
            .await
            .map_err(create_error(Operation::Cluster))?;
        info!(cluster = %name, cluster_id = %handle.id, "Cluster ID");
        advance_create(&mut state, name);

        let with_id = |operation: Operation| {
            let id = handle.id.clone();
            move |e| LifecycleError::new(Stage::Create, operation, e).with_cluster_id(id)
        };

        advance_create(&mut state, name);
        let policy = if options.hosted_control_plane {
            self.settings.hosted_ready
        } else {
            self.settings.classic_ready
        };
        let clusters = self.clusters.as_ref();
        let cluster_id = handle.id.as_str();
        let ctx_ref = &ctx;
        poll_until(
            &format!("cluster {cluster_id:?} ready"),
            policy,
            ctx.cancel(),
            move || poll::cluster_ready(clusters, cluster_id, ctx_ref),
        )
        .await
        .map_err(with_id(Operation::Cluster))?;
        advance_create(&mut state, name);

        let kubeconfig = self
            .clusters
            .kubeconfig(cluster_id, &ctx)
            .await
            .map_err(with_id(Operation::Cluster))?;
        advance_create(&mut state, name);

        health
            .run(&kubeconfig, &ctx)
            .await
            .map_err(with_id(Operation::Health))?;
        advance_create(&mut state, name);

        Ok(handle)
    }

    /// Tear a cluster down together with everything create provisioned for it.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] naming the failed step. Later steps are
    /// not attempted, so trailing resources may remain.
    pub async fn delete(
        &self,
        options: &DeleteOptions,
        cancel: CancellationToken,
    ) -> Result<(), LifecycleError> {
        let ctx = CallContext::new(Arc::clone(&self.credentials), cancel);
        let options = options
            .resolve()
            .map_err(|e| LifecycleError::new(Stage::Delete, Operation::Validation, e))?;
        let id = options.cluster_id.as_str();
        let name = options.cluster_name.as_str();

        let mut state = DeletionState::Requested;
        info!(
            cluster = %name,
            cluster_id = %id,
            hosted_cp = options.hosted_control_plane,
            sts = options.sts,
            state = %state,
            "{}",
            state.description()
        );

        let oidc_config_id = if options.hosted_control_plane {
            Some(
                self.oidc
                    .current_for_cluster(id, &ctx)
                    .await
                    .map_err(delete_error(Operation::OidcConfig, id))?,
            )
        } else {
            None
        };

        info!(cluster = %name, cluster_id = %id, "Deleting cluster");
        self.clusters
            .delete_cluster(id, &ctx)
            .await
            .map_err(delete_error(Operation::Cluster, id))?;
        advance_delete(&mut state, name);

        advance_delete(&mut state, name);
        let clusters = self.clusters.as_ref();
        let ctx_ref = &ctx;
        poll_until(
            &format!("cluster {name:?} deleted"),
            self.settings.deleted,
            ctx.cancel(),
            move || poll::cluster_absent(clusters, name, ctx_ref),
        )
        .await
        .map_err(delete_error(Operation::Cluster, id))?;

        if options.sts {
            info!(cluster_id = %id, "Deleting operator roles");
            self.clusters
                .delete_operator_roles(id, &ctx)
                .await
                .map_err(delete_error(Operation::OperatorRoles, id))?;
            self.oidc
                .release_provider(id, &ctx)
                .await
                .map_err(delete_error(Operation::OidcProvider, id))?;
        }
        advance_delete(&mut state, name);

        if let Some(oidc_config_id) = &oidc_config_id {
            self.oidc
                .release(oidc_config_id, &ctx)
                .await
                .map_err(delete_error(Operation::OidcConfig, id))?;
        }
        advance_delete(&mut state, name);

        if options.hosted_control_plane {
            self.network
                .destroy(name, ctx.region(), &self.settings.work_dir.join(name), &ctx)
                .await
                .map_err(delete_error(Operation::Network, id))?;
        }
        advance_delete(&mut state, name);

        if options.sts {
            self.roles
                .release(name, &ctx)
                .await
                .map_err(delete_error(Operation::AccountRoles, id))?;
        }
        advance_delete(&mut state, name);
        advance_delete(&mut state, name);

        Ok(())
    }

    /// Resolve a just-created cluster by exact name.
    async fn find_cluster(
        &self,
        name: &str,
        ctx: &CallContext,
    ) -> Result<ClusterHandle, ProvisionError> {
        let page = self
            .clusters
            .list_clusters(&poll::cluster_search_query(name), 1, 1, ctx)
            .await?;
        if page.total != 1 {
            if page.total > 1 {
                warn!(
                    cluster = %name,
                    total = page.total,
                    "Cluster name matched more than one record"
                );
            }
            return Err(ProvisionError::NotFound(format!("cluster {name:?}")));
        }
        page.items
            .into_iter()
            .next()
            .filter(|c| !c.id.is_empty())
            .map(ClusterHandle::from)
            .ok_or_else(|| ProvisionError::NotFound(format!("cluster {name:?}")))
    }
}

fn advance_create(state: &mut ProvisioningState, cluster: &str) {
    *state = state.next();
    info!(cluster = %cluster, state = %state, "{}", state.description());
}

fn advance_delete(state: &mut DeletionState, cluster: &str) {
    *state = state.next();
    info!(cluster = %cluster, state = %state, "{}", state.description());
}
