//! Progress points of the create, delete and upgrade sequences.
//!
//! These are not persisted. The controller walks them to log every
//! transition so a failed run shows exactly how far it got.

use std::fmt;

/// Progress of a cluster creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvisioningState {
    /// Options accepted, nothing provisioned yet.
    Requested,
    /// Account roles exist (or were not needed).
    RolesReady,
    /// OIDC config exists (or was not needed).
    OidcReady,
    /// Subnets exist (or were not needed).
    NetworkReady,
    /// Cluster creation submitted and the cluster resolved.
    Submitted,
    /// Polling for the ready state.
    WaitingReady,
    /// Cluster reported ready.
    Ready,
    /// Running the post-install health check.
    HealthChecking,
    /// Terminal success.
    Operational,
}

impl ProvisioningState {
    /// The state that follows this one. `Operational` is terminal.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Requested => Self::RolesReady,
            Self::RolesReady => Self::OidcReady,
            Self::OidcReady => Self::NetworkReady,
            Self::NetworkReady => Self::Submitted,
            Self::Submitted => Self::WaitingReady,
            Self::WaitingReady => Self::Ready,
            Self::Ready => Self::HealthChecking,
            Self::HealthChecking | Self::Operational => Self::Operational,
        }
    }

    /// Whether this is the terminal success state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Operational
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Requested => "Cluster creation requested",
            Self::RolesReady => "Account roles ready",
            Self::OidcReady => "OIDC config ready",
            Self::NetworkReady => "Network ready",
            Self::Submitted => "Cluster creation submitted",
            Self::WaitingReady => "Waiting for cluster to become ready",
            Self::Ready => "Cluster ready",
            Self::HealthChecking => "Running post-install health check",
            Self::Operational => "Cluster operational",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::RolesReady => write!(f, "roles-ready"),
            Self::OidcReady => write!(f, "oidc-ready"),
            Self::NetworkReady => write!(f, "network-ready"),
            Self::Submitted => write!(f, "submitted"),
            Self::WaitingReady => write!(f, "waiting-ready"),
            Self::Ready => write!(f, "ready"),
            Self::HealthChecking => write!(f, "health-checking"),
            Self::Operational => write!(f, "operational"),
        }
    }
}

/// Progress of a cluster deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeletionState {
    /// Options accepted.
    Requested,
    /// Cluster deletion submitted.
    DeleteSubmitted,
    /// Polling for the cluster to disappear.
    WaitingDeleted,
    /// Operator roles and OIDC provider removed (or not needed).
    RolesCleaned,
    /// OIDC config removed (or not needed).
    OidcConfigDeleted,
    /// Subnets removed (or not needed).
    NetworkDeleted,
    /// Account roles removed (or not needed).
    AccountRolesDeleted,
    /// Terminal success.
    Done,
}

impl DeletionState {
    /// The state that follows this one. `Done` is terminal.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Requested => Self::DeleteSubmitted,
            Self::DeleteSubmitted => Self::WaitingDeleted,
            Self::WaitingDeleted => Self::RolesCleaned,
            Self::RolesCleaned => Self::OidcConfigDeleted,
            Self::OidcConfigDeleted => Self::NetworkDeleted,
            Self::NetworkDeleted => Self::AccountRolesDeleted,
            Self::AccountRolesDeleted | Self::Done => Self::Done,
        }
    }

    /// Whether this is the terminal success state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Requested => "Cluster deletion requested",
            Self::DeleteSubmitted => "Cluster deletion submitted",
            Self::WaitingDeleted => "Waiting for cluster to be deleted",
            Self::RolesCleaned => "Operator roles and OIDC provider removed",
            Self::OidcConfigDeleted => "OIDC config removed",
            Self::NetworkDeleted => "Network removed",
            Self::AccountRolesDeleted => "Account roles removed",
            Self::Done => "Cluster deleted",
        }
    }
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::DeleteSubmitted => write!(f, "delete-submitted"),
            Self::WaitingDeleted => write!(f, "waiting-deleted"),
            Self::RolesCleaned => write!(f, "roles-cleaned"),
            Self::OidcConfigDeleted => write!(f, "oidc-config-deleted"),
            Self::NetworkDeleted => write!(f, "network-deleted"),
            Self::AccountRolesDeleted => write!(f, "account-roles-deleted"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Progress of a cluster upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpgradeState {
    /// Options accepted.
    Requested,
    /// Version gate acknowledged (or not needed for a z-stream upgrade).
    GateAcknowledged,
    /// Upgrade policy accepted.
    Scheduled,
    /// Upgrade operator restarted.
    OperatorRestarted,
    /// Following the operator's upgrade history.
    WaitingUpgrade,
    /// Terminal success.
    Upgraded,
}

impl UpgradeState {
    /// The state that follows this one. `Upgraded` is terminal.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Requested => Self::GateAcknowledged,
            Self::GateAcknowledged => Self::Scheduled,
            Self::Scheduled => Self::OperatorRestarted,
            Self::OperatorRestarted => Self::WaitingUpgrade,
            Self::WaitingUpgrade | Self::Upgraded => Self::Upgraded,
        }
    }

    /// Whether this is the terminal success state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Upgraded
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Requested => "Cluster upgrade requested",
            Self::GateAcknowledged => "Version gate acknowledged",
            Self::Scheduled => "Upgrade policy scheduled",
            Self::OperatorRestarted => "Upgrade operator restarted",
            Self::WaitingUpgrade => "Waiting for upgrade to finish",
            Self::Upgraded => "Cluster upgraded",
        }
    }
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::GateAcknowledged => write!(f, "gate-acknowledged"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::OperatorRestarted => write!(f, "operator-restarted"),
            Self::WaitingUpgrade => write!(f, "waiting-upgrade"),
            Self::Upgraded => write!(f, "upgraded"),
        }
    }
}
