//! Cluster create/delete options and request validation.
//!
//! Options are collected with an immutable builder, resolved into a
//! fully-defaulted value, and validated into a [`ClusterSpec`] once the
//! provisioned inputs (roles, OIDC config, subnets) are known. Every step is
//! a pure function: nothing is mutated in place and nothing calls out.

use serde::{Deserialize, Serialize};

use crate::api::{AccountRoleSet, NetworkTopology};
use crate::error::ProvisionError;
use crate::version::Version;

/// Default channel group.
pub const DEFAULT_CHANNEL_GROUP: &str = "stable";
/// Default compute machine type.
pub const DEFAULT_COMPUTE_MACHINE_TYPE: &str = "m5.xlarge";
/// Default machine CIDR.
pub const DEFAULT_MACHINE_CIDR: &str = "10.0.0.0/16";
/// Default worker replica count.
pub const DEFAULT_REPLICAS: u32 = 2;

/// Options for creating a cluster, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOptions {
    name: String,
    version: String,
    channel_group: Option<String>,
    compute_machine_type: Option<String>,
    machine_cidr: Option<String>,
    replicas: Option<u32>,
    hosted_control_plane: bool,
    sts: bool,
    oidc_config_managed: bool,
    properties: Option<String>,
}

impl ClusterOptions {
    /// Options for cluster `name` at OpenShift `version`.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Set the channel group (e.g. `stable`, `candidate`).
    #[must_use]
    pub fn with_channel_group(mut self, channel_group: impl Into<String>) -> Self {
        self.channel_group = Some(channel_group.into());
        self
    }

    /// Set the compute machine type.
    #[must_use]
    pub fn with_compute_machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.compute_machine_type = Some(machine_type.into());
        self
    }

    /// Set the machine network CIDR.
    #[must_use]
    pub fn with_machine_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.machine_cidr = Some(cidr.into());
        self
    }

    /// Set the worker replica count. Zero means "use the default".
    #[must_use]
    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Request a hosted control plane. Implies STS.
    #[must_use]
    pub fn with_hosted_control_plane(mut self, hosted: bool) -> Self {
        self.hosted_control_plane = hosted;
        self
    }

    /// Request short-term security token mode.
    #[must_use]
    pub fn with_sts(mut self, sts: bool) -> Self {
        self.sts = sts;
        self
    }

    /// Create a managed OIDC config rather than an unmanaged one.
    #[must_use]
    pub fn with_managed_oidc_config(mut self, managed: bool) -> Self {
        self.oidc_config_managed = managed;
        self
    }

    /// Free-form cluster properties passed through to creation.
    #[must_use]
    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = Some(properties.into());
        self
    }

    /// Cluster name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fill defaults and check the fields needed before any external call.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] if the name or version is
    /// missing, or the version is not a semantic version.
    pub fn resolve(&self) -> Result<ResolvedOptions, ProvisionError> {
        if self.name.trim().is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "cluster_name",
                reason: "is required",
            });
        }
        if self.version.trim().is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "version",
                reason: "is required",
            });
        }
        let parsed: Version = self
            .version
            .parse()
            .map_err(|_| ProvisionError::ValidationFailed {
                field: "version",
                reason: "must be a semantic version",
            })?;

        let or_default = |value: &Option<String>, default: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Ok(ResolvedOptions {
            name: self.name.clone(),
            version: self.version.clone(),
            major_minor: parsed.major_minor(),
            channel_group: or_default(&self.channel_group, DEFAULT_CHANNEL_GROUP),
            compute_machine_type: or_default(
                &self.compute_machine_type,
                DEFAULT_COMPUTE_MACHINE_TYPE,
            ),
            machine_cidr: or_default(&self.machine_cidr, DEFAULT_MACHINE_CIDR),
            replicas: self
                .replicas
                .filter(|r| *r > 0)
                .unwrap_or(DEFAULT_REPLICAS),
            hosted_control_plane: self.hosted_control_plane,
            sts: self.sts || self.hosted_control_plane,
            oidc_config_managed: self.oidc_config_managed,
            properties: self.properties.clone().unwrap_or_default(),
        })
    }
}

/// Create options with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub name: String,
    pub version: String,
    /// `major.minor` of `version`, used to key account roles.
    pub major_minor: String,
    pub channel_group: String,
    pub compute_machine_type: String,
    pub machine_cidr: String,
    pub replicas: u32,
    pub hosted_control_plane: bool,
    /// Always true when `hosted_control_plane` is.
    pub sts: bool,
    pub oidc_config_managed: bool,
    pub properties: String,
}

/// Outputs of the sub-provisioning steps that feed cluster creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionedInputs {
    pub account_roles: Option<AccountRoleSet>,
    pub oidc_config_id: Option<String>,
    pub network: Option<NetworkTopology>,
}

/// Hosted control plane inputs of a cluster creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedControlPlane {
    pub oidc_config_id: String,
    pub subnet_ids: Vec<String>,
}

/// A validated, fully-populated cluster creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub version: String,
    pub channel_group: String,
    pub compute_machine_type: String,
    pub machine_cidr: String,
    pub replicas: u32,
    pub properties: String,
    pub sts: bool,
    pub account_roles: AccountRoleSet,
    pub hosted: Option<HostedControlPlane>,
}

fn require(
    value: Option<&str>,
    field: &'static str,
    reason: &'static str,
) -> Result<String, ProvisionError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(ProvisionError::ValidationFailed { field, reason }),
    }
}

/// Validate resolved options plus provisioned inputs into a [`ClusterSpec`].
///
/// # Errors
///
/// Returns [`ProvisionError::ValidationFailed`] naming the first missing field.
pub fn validate(
    options: &ResolvedOptions,
    inputs: &ProvisionedInputs,
) -> Result<ClusterSpec, ProvisionError> {
    let name = require(Some(&options.name), "cluster_name", "is required")?;
    let version = require(Some(&options.version), "version", "is required")?;

    let hosted = if options.hosted_control_plane {
        let oidc_config_id = require(
            inputs.oidc_config_id.as_deref(),
            "oidc_config_id",
            "is required for hosted control plane clusters",
        )?;
        let subnet_ids: Vec<String> = inputs
            .network
            .as_ref()
            .map(NetworkTopology::cluster_subnet_ids)
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if subnet_ids.is_empty() {
            return Err(ProvisionError::ValidationFailed {
                field: "subnet_ids",
                reason: "is required for hosted control plane clusters",
            });
        }
        Some(HostedControlPlane {
            oidc_config_id,
            subnet_ids,
        })
    } else {
        None
    };

    let roles = inputs.account_roles.as_ref();
    let account_roles = AccountRoleSet {
        control_plane: require(
            roles.map(|r| r.control_plane.as_str()),
            "control_plane_role_arn",
            "is required",
        )?,
        installer: require(
            roles.map(|r| r.installer.as_str()),
            "installer_role_arn",
            "is required",
        )?,
        support: require(
            roles.map(|r| r.support.as_str()),
            "support_role_arn",
            "is required",
        )?,
        worker: require(
            roles.map(|r| r.worker.as_str()),
            "worker_role_arn",
            "is required",
        )?,
    };

    Ok(ClusterSpec {
        name,
        version,
        channel_group: options.channel_group.clone(),
        compute_machine_type: options.compute_machine_type.clone(),
        machine_cidr: options.machine_cidr.clone(),
        replicas: options.replicas,
        properties: options.properties.clone(),
        sts: options.sts,
        account_roles,
        hosted,
    })
}

/// Options for deleting a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    cluster_id: String,
    cluster_name: String,
    hosted_control_plane: bool,
    sts: bool,
}

impl DeleteOptions {
    /// Delete cluster `cluster_id` named `cluster_name`.
    #[must_use]
    pub fn new(cluster_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    /// The cluster has a hosted control plane. Implies STS.
    #[must_use]
    pub fn with_hosted_control_plane(mut self, hosted: bool) -> Self {
        self.hosted_control_plane = hosted;
        self
    }

    /// The cluster uses short-term security tokens.
    #[must_use]
    pub fn with_sts(mut self, sts: bool) -> Self {
        self.sts = sts;
        self
    }

    /// Name of the cluster to delete.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Apply defaults and check identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] if the id or name is empty.
    pub fn resolve(&self) -> Result<ResolvedDeleteOptions, ProvisionError> {
        let cluster_id = require(Some(&self.cluster_id), "cluster_id", "is required")?;
        let cluster_name = require(Some(&self.cluster_name), "cluster_name", "is required")?;
        Ok(ResolvedDeleteOptions {
            cluster_id,
            cluster_name,
            hosted_control_plane: self.hosted_control_plane,
            sts: self.sts || self.hosted_control_plane,
        })
    }
}

/// Delete options with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDeleteOptions {
    pub cluster_id: String,
    pub cluster_name: String,
    pub hosted_control_plane: bool,
    /// Always true when `hosted_control_plane` is.
    pub sts: bool,
}

/// Options for upgrading a cluster in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOptions {
    cluster_id: String,
    current_version: String,
    target_version: String,
}

impl UpgradeOptions {
    /// Upgrade cluster `cluster_id` from `current_version` to `target_version`.
    #[must_use]
    pub fn new(
        cluster_id: impl Into<String>,
        current_version: impl Into<String>,
        target_version: impl Into<String>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            current_version: current_version.into(),
            target_version: target_version.into(),
        }
    }

    /// Parse versions and check the upgrade moves forward.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ValidationFailed`] if the id is empty, a
    /// version does not parse, or the target is not newer than the current
    /// version.
    pub fn resolve(&self) -> Result<ResolvedUpgradeOptions, ProvisionError> {
        let cluster_id = require(Some(&self.cluster_id), "cluster_id", "is required")?;
        let current = parse_version(&self.current_version, "current_version")?;
        let target = parse_version(&self.target_version, "target_version")?;
        if target <= current {
            return Err(ProvisionError::ValidationFailed {
                field: "target_version",
                reason: "must be newer than the current version",
            });
        }
        Ok(ResolvedUpgradeOptions {
            cluster_id,
            current,
            target,
        })
    }
}

fn parse_version(value: &str, field: &'static str) -> Result<Version, ProvisionError> {
    value
        .parse()
        .map_err(|_| ProvisionError::ValidationFailed {
            field,
            reason: "must be a semantic version",
        })
}

/// Upgrade options with versions parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpgradeOptions {
    pub cluster_id: String,
    pub current: Version,
    pub target: Version,
}

impl ResolvedUpgradeOptions {
    /// Whether the upgrade crosses a minor (or major) version.
    #[must_use]
    pub fn crosses_minor(&self) -> bool {
        (self.current.major, self.current.minor) < (self.target.major, self.target.minor)
    }
}
