//! Account role set management.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{
    AccountRole, AccountRoleApi, AccountRoleSet, ROLE_TYPE_CONTROL_PLANE, ROLE_TYPE_INSTALLER,
    ROLE_TYPE_SUPPORT, ROLE_TYPE_WORKER,
};
use crate::credentials::CallContext;
use crate::error::ProvisionError;

/// Outcome of looking up roles for a prefix and version.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Missing,
    Partial(Vec<String>),
    Complete(AccountRoleSet),
}

/// Creates, looks up and deletes the four account roles keyed by prefix and version.
#[derive(Clone)]
pub struct AccountRoleManager {
    api: Arc<dyn AccountRoleApi>,
}

impl AccountRoleManager {
    /// Create a manager over an identity service.
    #[must_use]
    pub fn new(api: Arc<dyn AccountRoleApi>) -> Self {
        Self { api }
    }

    /// Return the role set for `prefix`/`version`, creating it if none exists.
    ///
    /// A partial set is never repaired.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Inconsistent`] if one to three roles exist,
    /// [`ProvisionError::NotFound`] if creation did not yield a full set, or
    /// the identity service's error.
    pub async fn ensure(
        &self,
        prefix: &str,
        version: &str,
        channel_group: &str,
        ctx: &CallContext,
    ) -> Result<AccountRoleSet, ProvisionError> {
        match self.lookup(prefix, version, ctx).await? {
            Lookup::Complete(roles) => {
                info!(prefix = %prefix, version = %version, "Account roles already exist");
                return Ok(roles);
            }
            Lookup::Partial(found) => {
                return Err(ProvisionError::Inconsistent {
                    prefix: prefix.to_string(),
                    found,
                });
            }
            Lookup::Missing => {}
        }

        info!(prefix = %prefix, version = %version, "Creating account roles");
        self.api
            .create_account_roles(prefix, version, channel_group, ctx)
            .await?;

        match self.lookup(prefix, version, ctx).await? {
            Lookup::Complete(roles) => {
                info!(prefix = %prefix, version = %version, "✅ Account roles created");
                Ok(roles)
            }
            Lookup::Partial(found) => Err(ProvisionError::Inconsistent {
                prefix: prefix.to_string(),
                found,
            }),
            Lookup::Missing => Err(ProvisionError::NotFound(format!(
                "account roles with prefix {prefix:?} after creation"
            ))),
        }
    }

    /// Delete every role carrying `prefix`. No existence check is made first.
    ///
    /// # Errors
    ///
    /// Propagates the identity service's error unchanged.
    pub async fn release(&self, prefix: &str, ctx: &CallContext) -> Result<(), ProvisionError> {
        info!(prefix = %prefix, "Deleting account roles");
        self.api.delete_account_roles(prefix, ctx).await?;
        info!(prefix = %prefix, "✅ Account roles deleted");
        Ok(())
    }

    async fn lookup(
        &self,
        prefix: &str,
        version: &str,
        ctx: &CallContext,
    ) -> Result<Lookup, ProvisionError> {
        let roles = self.api.list_account_roles(ctx).await?;
        Ok(match_roles(&roles, prefix, version))
    }
}

fn match_roles(roles: &[AccountRole], prefix: &str, version: &str) -> Lookup {
    let mut set = AccountRoleSet::default();
    let mut found = Vec::new();

    for role in roles
        .iter()
        .filter(|r| r.name.starts_with(prefix) && r.version == version)
    {
        let slot = match role.role_type.as_str() {
            ROLE_TYPE_CONTROL_PLANE => &mut set.control_plane,
            ROLE_TYPE_INSTALLER => &mut set.installer,
            ROLE_TYPE_SUPPORT => &mut set.support,
            ROLE_TYPE_WORKER => &mut set.worker,
            other => {
                debug!(role = %role.name, role_type = %other, "Ignoring unknown role type");
                continue;
            }
        };
        if slot.is_empty() {
            found.push(role.role_type.clone());
        }
        slot.clone_from(&role.arn);
    }

    match found.len() {
        0 => Lookup::Missing,
        4 => Lookup::Complete(set),
        _ => Lookup::Partial(found),
    }
}
