//! Kubernetes node readiness through `kube`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

use crate::api::{NodeHealthApi, NodeReadiness};
use crate::credentials::CallContext;
use crate::error::ProvisionError;

/// Build a client from kubeconfig YAML without touching disk or `KUBECONFIG`.
pub(crate) async fn kube_client(kubeconfig: &str) -> Result<Client, ProvisionError> {
    let kubeconfig = Kubeconfig::from_yaml(kubeconfig)
        .map_err(|e| ProvisionError::external("parse kubeconfig", e))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| ProvisionError::external("load kubeconfig", e))?;
    Client::try_from(config)
        .map_err(|e| ProvisionError::external("create kubernetes client", e))
}

/// Lists nodes of a cluster from its in-memory kubeconfig.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeNodeHealth;

#[async_trait]
impl NodeHealthApi for KubeNodeHealth {
    async fn list_nodes(
        &self,
        kubeconfig: &str,
        ctx: &CallContext,
    ) -> Result<Vec<NodeReadiness>, ProvisionError> {
        let client = kube_client(kubeconfig).await?;
        let nodes: Api<Node> = Api::all(client);
        let list = ctx
            .guard(async {
                nodes
                    .list(&ListParams::default())
                    .await
                    .map_err(|e| ProvisionError::external("list nodes", e))
            })
            .await?;

        let readiness: Vec<NodeReadiness> = list.items.iter().map(node_readiness).collect();
        debug!(nodes = readiness.len(), "Listed nodes");
        Ok(readiness)
    }
}

/// Ready condition of a node, `None` if it reports none.
#[must_use]
pub fn node_readiness(node: &Node) -> NodeReadiness {
    let ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status == "True");

    NodeReadiness {
        name: node.metadata.name.clone().unwrap_or_default(),
        ready,
    }
}
