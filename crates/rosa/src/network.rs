//! VPC and subnet provisioning for hosted control plane clusters.
//!
//! The network definition is embedded at compile time, staged into a working
//! directory and driven through an [`InfraPlan`]. The directory is keyed by
//! cluster name so a later destroy finds the state create left behind.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{InfraPlan, NetworkTopology};
use crate::credentials::CallContext;
use crate::error::ProvisionError;

/// Network definition staged for every create.
pub const VPC_TEMPLATE: &str = include_str!("../assets/terraform/setup-vpc.tf");
/// File name the template is staged under.
pub const VPC_TEMPLATE_FILE: &str = "setup-vpc.tf";

const OUTPUT_CLUSTER_PRIVATE_SUBNET: &str = "cluster-private-subnet";
const OUTPUT_CLUSTER_PUBLIC_SUBNET: &str = "cluster-public-subnet";
const OUTPUT_NODE_PRIVATE_SUBNET: &str = "node-private-subnet";

/// Creates and destroys the subnet topology of a cluster.
#[derive(Clone)]
pub struct NetworkProvisioner {
    plan: Arc<dyn InfraPlan>,
}

impl NetworkProvisioner {
    /// Create a provisioner over an infrastructure-plan runner.
    #[must_use]
    pub fn new(plan: Arc<dyn InfraPlan>) -> Self {
        Self { plan }
    }

    /// Stage the template in `work_dir`, apply it and return the subnets.
    ///
    /// The runner's local state is uninstalled on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] for empty inputs,
    /// [`ProvisionError::Io`] if staging fails, [`ProvisionError::NotFound`]
    /// if an expected output is missing, otherwise the runner's error.
    pub async fn create(
        &self,
        cluster_name: &str,
        region: &str,
        work_dir: &Path,
        ctx: &CallContext,
    ) -> Result<NetworkTopology, ProvisionError> {
        check_inputs(cluster_name, region, work_dir)?;

        info!(cluster = %cluster_name, region = %region, dir = %work_dir.display(), "Creating VPC");
        let result = self.apply(cluster_name, region, work_dir, ctx).await;
        self.cleanup(work_dir).await;

        let topology = result?;
        info!(
            cluster = %cluster_name,
            private_subnet = %topology.cluster_private_subnet,
            public_subnet = %topology.cluster_public_subnet,
            "✅ VPC created"
        );
        Ok(topology)
    }

    /// Destroy the topology managed in `work_dir`.
    ///
    /// The template is not staged again; the directory is expected to hold
    /// what create left there.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] for empty inputs, otherwise
    /// the runner's error.
    pub async fn destroy(
        &self,
        cluster_name: &str,
        region: &str,
        work_dir: &Path,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        check_inputs(cluster_name, region, work_dir)?;

        info!(cluster = %cluster_name, region = %region, dir = %work_dir.display(), "Deleting VPC");
        let result = async {
            self.plan.init(work_dir, ctx).await?;
            self.plan
                .destroy(work_dir, &plan_vars(cluster_name, region), ctx)
                .await
        }
        .await;
        self.cleanup(work_dir).await;

        result?;
        info!(cluster = %cluster_name, "✅ VPC deleted");
        Ok(())
    }

    async fn apply(
        &self,
        cluster_name: &str,
        region: &str,
        work_dir: &Path,
        ctx: &CallContext,
    ) -> Result<NetworkTopology, ProvisionError> {
        stage_template(work_dir).await?;

        self.plan.init(work_dir, ctx).await?;
        self.plan
            .plan(work_dir, &plan_vars(cluster_name, region), ctx)
            .await?;
        self.plan.apply(work_dir, ctx).await?;
        let outputs = self.plan.output(work_dir, ctx).await?;

        Ok(NetworkTopology {
            cluster_private_subnet: subnet_output(&outputs, OUTPUT_CLUSTER_PRIVATE_SUBNET)?,
            cluster_public_subnet: subnet_output(&outputs, OUTPUT_CLUSTER_PUBLIC_SUBNET)?,
            node_private_subnet: subnet_output(&outputs, OUTPUT_NODE_PRIVATE_SUBNET)?,
        })
    }

    async fn cleanup(&self, work_dir: &Path) {
        if let Err(e) = self.plan.uninstall(work_dir).await {
            warn!(dir = %work_dir.display(), error = %e, "Failed to clean up plan state");
        }
    }
}

fn check_inputs(cluster_name: &str, region: &str, work_dir: &Path) -> Result<(), ProvisionError> {
    let reason = "is required for network provisioning";
    if cluster_name.is_empty() {
        return Err(ProvisionError::ValidationFailed {
            field: "cluster_name",
            reason,
        });
    }
    if region.is_empty() {
        return Err(ProvisionError::ValidationFailed {
            field: "region",
            reason,
        });
    }
    if work_dir.as_os_str().is_empty() {
        return Err(ProvisionError::ValidationFailed {
            field: "work_dir",
            reason,
        });
    }
    Ok(())
}

fn plan_vars(cluster_name: &str, region: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("aws_region".to_string(), region.to_string()),
        ("cluster_name".to_string(), cluster_name.to_string()),
    ])
}

async fn stage_template(work_dir: &Path) -> Result<(), ProvisionError> {
    tokio::fs::create_dir_all(work_dir)
        .await
        .map_err(|e| ProvisionError::io(format!("failed to create {}", work_dir.display()), e))?;
    let target = work_dir.join(VPC_TEMPLATE_FILE);
    tokio::fs::write(&target, VPC_TEMPLATE)
        .await
        .map_err(|e| ProvisionError::io(format!("failed to stage {}", target.display()), e))
}

fn subnet_output(outputs: &BTreeMap<String, String>, name: &str) -> Result<String, ProvisionError> {
    let value = outputs
        .get(name)
        .map(|v| v.replace('"', ""))
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ProvisionError::NotFound(format!("network output {name:?}")))?;
    Ok(value.trim().to_string())
}
