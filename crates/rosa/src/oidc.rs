//! OIDC trust configuration management.

use std::sync::Arc;

use tracing::info;

use crate::api::{OidcConfig, OidcConfigApi, OidcConfigRequest};
use crate::credentials::CallContext;
use crate::error::ProvisionError;

/// Creates, looks up and deletes OIDC configs keyed by prefix.
#[derive(Clone)]
pub struct OidcConfigManager {
    api: Arc<dyn OidcConfigApi>,
}

impl OidcConfigManager {
    /// Create a manager over the OIDC config service.
    #[must_use]
    pub fn new(api: Arc<dyn OidcConfigApi>) -> Self {
        Self { api }
    }

    /// Return the id of the config for `prefix`, creating one if none matches.
    ///
    /// The first config whose secret reference contains `prefix` wins.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] if `prefix` or
    /// `installer_role_arn` is empty, otherwise the service's error.
    pub async fn ensure(
        &self,
        prefix: &str,
        installer_role_arn: &str,
        managed: bool,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        if prefix.is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "oidc_config_prefix",
                reason: "is required",
            });
        }
        if installer_role_arn.is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "installer_role_arn",
                reason: "is required",
            });
        }

        if let Some(existing) = self.lookup(prefix, ctx).await? {
            info!(prefix = %prefix, oidc_config_id = %existing.id, "OIDC config already exists");
            return Ok(existing.id);
        }

        info!(prefix = %prefix, managed, "Creating OIDC config");
        let request = OidcConfigRequest {
            prefix: prefix.to_string(),
            installer_role_arn: installer_role_arn.to_string(),
            managed,
        };
        let id = self.api.create_oidc_config(&request, ctx).await?;
        info!(prefix = %prefix, oidc_config_id = %id, "✅ OIDC config created");
        Ok(id)
    }

    /// Delete a config by id. No existence check is made first.
    ///
    /// # Errors
    ///
    /// Propagates the service's error.
    pub async fn release(&self, id: &str, ctx: &CallContext) -> Result<(), ProvisionError> {
        info!(oidc_config_id = %id, "Deleting OIDC config");
        self.api.delete_oidc_config(id, ctx).await?;
        info!(oidc_config_id = %id, "✅ OIDC config deleted");
        Ok(())
    }

    /// Id of the config attached to a live cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotFound`] if the cluster has no config
    /// attached, otherwise the service's error.
    pub async fn current_for_cluster(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        let config = self.api.cluster_oidc_config(cluster_id, ctx).await?;
        if config.id.is_empty() {
            return Err(ProvisionError::NotFound(format!(
                "oidc config of cluster {cluster_id:?}"
            )));
        }
        Ok(config.id)
    }

    /// Delete the OIDC identity-provider registration of a cluster.
    ///
    /// # Errors
    ///
    /// Propagates the service's error.
    pub async fn release_provider(
        &self,
        cluster_id: &str,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        info!(cluster_id = %cluster_id, "Deleting OIDC provider");
        self.api.delete_oidc_provider(cluster_id, ctx).await?;
        info!(cluster_id = %cluster_id, "✅ OIDC provider deleted");
        Ok(())
    }

    async fn lookup(
        &self,
        prefix: &str,
        ctx: &CallContext,
    ) -> Result<Option<OidcConfig>, ProvisionError> {
        let configs = self.api.list_oidc_configs(ctx).await?;
        Ok(configs.into_iter().find(|c| c.secret_arn.contains(prefix)))
    }
}
