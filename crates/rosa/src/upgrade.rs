//! In-place cluster upgrades.
//!
//! [`ClusterUpgrader`] acknowledges the version gate a minor upgrade needs,
//! schedules a manual upgrade policy, restarts the managed upgrade operator
//! so it picks the policy up without waiting for its next resync, and then
//! follows the operator's history until the target version is reported
//! upgraded or failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{
    ClusterApi, UpgradeApi, UpgradeHistory, UpgradeOperatorApi, UpgradePolicy,
    UPGRADE_PHASE_FAILED, VERSION_GATE_LABEL,
};
use crate::config::LifecycleConfig;
use crate::credentials::{AwsCredentials, CallContext};
use crate::error::{LifecycleError, Operation, ProvisionError, Stage};
use crate::poll::{poll_until, PollPolicy};
use crate::request::{ResolvedUpgradeOptions, UpgradeOptions};
use crate::state::UpgradeState;

/// External systems an upgrade drives.
#[derive(Clone)]
pub struct UpgradeCollaborators {
    pub upgrades: Arc<dyn UpgradeApi>,
    pub clusters: Arc<dyn ClusterApi>,
    pub operator: Arc<dyn UpgradeOperatorApi>,
}

/// Scheduling delay and poll budgets of an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeSettings {
    /// Time between scheduling the policy and its start.
    pub schedule_delay: Duration,
    /// Wait for the operator's upgrade config to appear.
    pub config_present: PollPolicy,
    /// Wait for the upgrade to finish.
    pub progress: PollPolicy,
}

impl Default for UpgradeSettings {
    fn default() -> Self {
        LifecycleConfig::default().upgrade_settings()
    }
}

/// Upgrades clusters in place.
pub struct ClusterUpgrader {
    upgrades: Arc<dyn UpgradeApi>,
    clusters: Arc<dyn ClusterApi>,
    operator: Arc<dyn UpgradeOperatorApi>,
    credentials: Arc<AwsCredentials>,
    settings: UpgradeSettings,
}

fn upgrade_error(
    operation: Operation,
    cluster_id: &str,
) -> impl FnOnce(ProvisionError) -> LifecycleError + '_ {
    move |e| LifecycleError::new(Stage::Upgrade, operation, e).with_cluster_id(cluster_id)
}

impl ClusterUpgrader {
    /// Create an upgrader.
    #[must_use]
    pub fn new(
        collaborators: UpgradeCollaborators,
        credentials: Arc<AwsCredentials>,
        settings: UpgradeSettings,
    ) -> Self {
        Self {
            upgrades: collaborators.upgrades,
            clusters: collaborators.clusters,
            operator: collaborators.operator,
            credentials,
            settings,
        }
    }

    /// Upgrade a cluster and wait until the operator reports it upgraded.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] naming the failed step. A failed upgrade
    /// is reported as soon as the operator records it.
    pub async fn upgrade(
        &self,
        options: &UpgradeOptions,
        cancel: CancellationToken,
    ) -> Result<(), LifecycleError> {
        let ctx = CallContext::new(Arc::clone(&self.credentials), cancel);
        let options = options
            .resolve()
            .map_err(|e| LifecycleError::new(Stage::Upgrade, Operation::Validation, e))?;
        let id = options.cluster_id.as_str();
        let target = options.target.to_string();

        let mut state = UpgradeState::Requested;
        info!(
            cluster_id = %id,
            from = %options.current,
            to = %target,
            state = %state,
            "{}",
            state.description()
        );

        self.ensure_gate_agreement(&options, &ctx)
            .await
            .map_err(upgrade_error(Operation::GateAgreement, id))?;
        advance_upgrade(&mut state, id);

        let delay = chrono::Duration::from_std(self.settings.schedule_delay)
            .map_err(|e| ProvisionError::Config(format!("invalid schedule delay: {e}")))
            .map_err(upgrade_error(Operation::UpgradePolicy, id))?;
        let policy = UpgradePolicy::manual(&target, Utc::now() + delay);
        let scheduled = self
            .upgrades
            .schedule_upgrade(id, &policy, &ctx)
            .await
            .map_err(upgrade_error(Operation::UpgradePolicy, id))?;
        info!(
            cluster_id = %id,
            version = %scheduled.version,
            next_run = %scheduled.next_run.to_rfc3339(),
            "Upgrade scheduled"
        );
        advance_upgrade(&mut state, id);

        let kubeconfig = self
            .clusters
            .kubeconfig(id, &ctx)
            .await
            .map_err(upgrade_error(Operation::Cluster, id))?;
        self.operator
            .restart_operator(&kubeconfig, &ctx)
            .await
            .map_err(upgrade_error(Operation::UpgradeOperator, id))?;
        advance_upgrade(&mut state, id);

        let operator = self.operator.as_ref();
        let kubeconfig = kubeconfig.as_str();
        let ctx_ref = &ctx;
        poll_until(
            &format!("upgrade config of cluster {id:?}"),
            self.settings.config_present,
            ctx.cancel(),
            move || upgrade_config_present(operator, kubeconfig, ctx_ref),
        )
        .await
        .map_err(upgrade_error(Operation::UpgradeOperator, id))?;
        advance_upgrade(&mut state, id);

        let finished = Mutex::new(None);
        let finished_ref = &finished;
        let target_ref = target.as_str();
        poll_until(
            &format!("cluster {id:?} upgrade to {target}"),
            self.settings.progress,
            ctx.cancel(),
            move || upgrade_finished(operator, kubeconfig, target_ref, finished_ref, ctx_ref),
        )
        .await
        .map_err(upgrade_error(Operation::UpgradeOperator, id))?;

        if let Some(entry) = finished.into_inner() {
            if entry.phase == UPGRADE_PHASE_FAILED {
                let message = entry.message.unwrap_or_else(|| "no reason reported".into());
                return Err(upgrade_error(Operation::UpgradeOperator, id)(
                    ProvisionError::external(format!("upgrade to {target}"), message),
                ));
            }
        }
        advance_upgrade(&mut state, id);

        Ok(())
    }

    /// Acknowledge the version gate of a minor upgrade unless already done.
    async fn ensure_gate_agreement(
        &self,
        options: &ResolvedUpgradeOptions,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        let id = options.cluster_id.as_str();
        if !options.crosses_minor() {
            info!(cluster_id = %id, "No gate agreement is required for a z-stream upgrade");
            return Ok(());
        }

        let major_minor = options.target.major_minor();
        let gate = self
            .upgrades
            .list_version_gates(ctx)
            .await?
            .into_iter()
            .find(|g| g.version_raw_id_prefix == major_minor && g.label == VERSION_GATE_LABEL)
            .ok_or_else(|| ProvisionError::NotFound(format!("version gate for {major_minor}")))?;

        let agreements = self.upgrades.list_gate_agreements(id, ctx).await?;
        if agreements.iter().any(|a| a.version_gate.id == gate.id) {
            info!(cluster_id = %id, gate_id = %gate.id, "Gate agreement already exists");
            return Ok(());
        }

        self.upgrades.add_gate_agreement(id, &gate.id, ctx).await?;
        info!(cluster_id = %id, gate_id = %gate.id, "✅ Gate agreement added");
        Ok(())
    }
}

/// Whether the operator's upgrade config exists.
async fn upgrade_config_present(
    operator: &dyn UpgradeOperatorApi,
    kubeconfig: &str,
    ctx: &CallContext,
) -> Result<bool, ProvisionError> {
    Ok(operator.upgrade_history(kubeconfig, ctx).await?.is_some())
}

/// Whether the history entry for `target` reached a final phase. The entry
/// is kept in `finished` once it has.
async fn upgrade_finished(
    operator: &dyn UpgradeOperatorApi,
    kubeconfig: &str,
    target: &str,
    finished: &Mutex<Option<UpgradeHistory>>,
    ctx: &CallContext,
) -> Result<bool, ProvisionError> {
    let history = operator
        .upgrade_history(kubeconfig, ctx)
        .await?
        .unwrap_or_default();
    let Some(entry) = history.into_iter().find(|h| h.version == target) else {
        debug!(version = %target, "Upgrade has not started yet");
        return Ok(false);
    };

    info!(
        version = %target,
        phase = %entry.phase,
        message = %entry.message.as_deref().unwrap_or_default(),
        "Upgrade progress"
    );
    if !entry.is_finished() {
        return Ok(false);
    }
    *finished.lock().await = Some(entry);
    Ok(true)
}

fn advance_upgrade(state: &mut UpgradeState, cluster_id: &str) {
    *state = state.next();
    info!(cluster_id = %cluster_id, state = %state, "{}", state.description());
}
