//! Managed upgrade operator access through `kube`.
//!
//! The operator watches upgrade policies and records progress in the
//! history of its `UpgradeConfig` resource.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{ApiResource, DynamicObject, ListParams, Patch, PatchParams};
use kube::Api;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{UpgradeHistory, UpgradeOperatorApi};
use crate::credentials::CallContext;
use crate::error::ProvisionError;
use crate::nodes::kube_client;

/// Deployment name of the managed upgrade operator.
pub const OPERATOR_DEPLOYMENT: &str = "managed-upgrade-operator";

/// Namespace the operator and its config live in.
pub const OPERATOR_NAMESPACE: &str = "openshift-managed-upgrade-operator";

fn upgrade_config_api() -> ApiResource {
    ApiResource {
        group: "upgrade.managed.openshift.io".to_string(),
        version: "v1alpha1".to_string(),
        api_version: "upgrade.managed.openshift.io/v1alpha1".to_string(),
        kind: "UpgradeConfig".to_string(),
        plural: "upgradeconfigs".to_string(),
    }
}

/// [`UpgradeOperatorApi`] backed by the cluster's API server.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeUpgradeOperator;

#[async_trait]
impl UpgradeOperatorApi for KubeUpgradeOperator {
    async fn restart_operator(
        &self,
        kubeconfig: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        let client = kube_client(kubeconfig).await?;
        let deployments: Api<Deployment> = Api::namespaced(client, OPERATOR_NAMESPACE);

        ctx.guard(async {
            deployments
                .get(OPERATOR_DEPLOYMENT)
                .await
                .map_err(|e| ProvisionError::external("get managed upgrade operator", e))?;

            for replicas in [0, 1] {
                let patch = serde_json::json!({ "spec": { "replicas": replicas } });
                deployments
                    .patch(OPERATOR_DEPLOYMENT, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map_err(|e| {
                        ProvisionError::external(
                            format!("scale {OPERATOR_DEPLOYMENT} to {replicas}"),
                            e,
                        )
                    })?;
            }
            Ok::<_, ProvisionError>(())
        })
        .await?;

        info!("Restarted managed upgrade operator");
        Ok(())
    }

    async fn upgrade_history(
        &self,
        kubeconfig: &str,
        ctx: &CallContext,
    ) -> Result<Option<Vec<UpgradeHistory>>, ProvisionError> {
        let client = kube_client(kubeconfig).await?;
        let configs: Api<DynamicObject> =
            Api::namespaced_with(client, OPERATOR_NAMESPACE, &upgrade_config_api());

        let list = ctx
            .guard(async {
                configs
                    .list(&ListParams::default())
                    .await
                    .map_err(|e| ProvisionError::external("list upgrade configs", e))
            })
            .await?;

        debug!(configs = list.items.len(), "Listed upgrade configs");
        Ok(list.items.first().map(|config| history_entries(&config.data)))
    }
}

/// Entries of `status.history` in an `UpgradeConfig` body. Entries without a
/// version are skipped.
#[must_use]
pub fn history_entries(data: &Value) -> Vec<UpgradeHistory> {
    let Some(history) = data
        .get("status")
        .and_then(|s| s.get("history"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    history
        .iter()
        .filter_map(|entry| {
            let version = entry.get("version").and_then(Value::as_str)?;
            let phase = entry.get("phase").and_then(Value::as_str).unwrap_or_default();
            let message = entry
                .get("conditions")
                .and_then(Value::as_array)
                .and_then(|conditions| conditions.first())
                .and_then(|c| c.get("message"))
                .and_then(Value::as_str)
                .map(ToString::to_string);
            Some(UpgradeHistory {
                version: version.to_string(),
                phase: phase.to_string(),
                message,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_history_entries_read_phase_and_first_condition() {
        let data = json!({
            "spec": {"desired": {"version": "4.15.2"}},
            "status": {"history": [
                {
                    "version": "4.15.2",
                    "phase": "Upgrading",
                    "conditions": [
                        {
                            "type": "ControlPlaneUpgraded",
                            "message": "Control plane upgrade started"
                        },
                        {"type": "WorkersUpgraded", "message": "pending"}
                    ]
                },
                {"version": "4.14.9", "phase": "Upgraded"},
                {"phase": "Pending"}
            ]}
        });

        let entries = history_entries(&data);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].phase, "Upgrading");
        assert_eq!(
            entries[0].message.as_deref(),
            Some("Control plane upgrade started")
        );
        assert!(!entries[0].is_finished());
        assert!(entries[1].is_finished());
        assert_eq!(entries[1].message, None);
    }

    #[test]
    fn test_history_entries_without_status() {
        assert!(history_entries(&json!({"spec": {}})).is_empty());
        assert!(history_entries(&json!({"status": {"history": "bogus"}})).is_empty());
    }

    #[test]
    fn test_upgrade_config_resource() {
        let api = upgrade_config_api();
        assert_eq!(api.plural, "upgradeconfigs");
        assert_eq!(api.api_version, "upgrade.managed.openshift.io/v1alpha1");
    }
}
