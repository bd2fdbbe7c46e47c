//! Error types for cluster lifecycle operations.
//!
//! [`ProvisionError`] describes what went wrong in a single call (a lookup, a
//! CLI invocation, a poll loop). [`LifecycleError`] tags it with the stage and
//! the sub-operation of the create/delete sequence that failed.

use thiserror::Error;

/// Errors raised by collaborators and managers.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A required option is missing or malformed. Raised before any external call.
    #[error("validation failed: {field} {reason}")]
    ValidationFailed {
        field: &'static str,
        reason: &'static str,
    },

    /// Some, but not all, account roles exist for a prefix.
    #[error("one or more account roles with prefix {prefix:?} does not exist (found: {found:?})")]
    Inconsistent { prefix: String, found: Vec<String> },

    /// A poll loop exhausted its attempt budget.
    #[error(
        "{resource} did not reach the desired state within {attempts} attempts{}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        resource: String,
        attempts: u32,
        last_error: Option<String>,
    },

    /// An external command or API call failed.
    #[error("{operation} failed: {message}")]
    ExternalCallFailed { operation: String, message: String },

    /// A resource expected to exist was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Output of an external call did not have the expected shape.
    #[error("failed to decode {operation} output: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// Local filesystem error (staging templates, cleaning plugin caches).
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or credentials.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {e})"))
        .unwrap_or_default()
}

impl ProvisionError {
    /// Build an [`ProvisionError::ExternalCallFailed`].
    #[must_use]
    pub fn external(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::ExternalCallFailed {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Build an [`ProvisionError::Io`] with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is a poll timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Which lifecycle sequence was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Delete,
    Upgrade,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
            Self::Upgrade => write!(f, "upgrade"),
        }
    }
}

/// Sub-operation of a lifecycle sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Option resolution and request validation.
    Validation,
    /// Account role set.
    AccountRoles,
    /// Per-cluster operator roles.
    OperatorRoles,
    /// OIDC trust configuration.
    OidcConfig,
    /// OIDC identity-provider registration.
    OidcProvider,
    /// VPC / subnet topology.
    Network,
    /// Cluster-management API create, lookup, wait, delete.
    Cluster,
    /// Post-install health verification.
    Health,
    /// Version gate acknowledgement.
    GateAgreement,
    /// Upgrade policy scheduling.
    UpgradePolicy,
    /// In-cluster upgrade operator restart and progress.
    UpgradeOperator,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::AccountRoles => write!(f, "account roles"),
            Self::OperatorRoles => write!(f, "operator roles"),
            Self::OidcConfig => write!(f, "oidc config"),
            Self::OidcProvider => write!(f, "oidc provider"),
            Self::Network => write!(f, "network"),
            Self::Cluster => write!(f, "cluster"),
            Self::Health => write!(f, "health check"),
            Self::GateAgreement => write!(f, "gate agreement"),
            Self::UpgradePolicy => write!(f, "upgrade policy"),
            Self::UpgradeOperator => write!(f, "upgrade operator"),
        }
    }
}

/// A failed create, delete or upgrade, tagged with where it failed.
#[derive(Error, Debug)]
#[error("{stage} cluster failed during {operation}: {source}")]
pub struct LifecycleError {
    /// Create, delete or upgrade.
    pub stage: Stage,
    /// Step that failed.
    pub operation: Operation,
    /// Cluster id, when the failure happened after the cluster was submitted.
    pub cluster_id: Option<String>,
    /// Underlying error.
    #[source]
    pub source: ProvisionError,
}

impl LifecycleError {
    /// Create a lifecycle error without a cluster id.
    #[must_use]
    pub fn new(stage: Stage, operation: Operation, source: ProvisionError) -> Self {
        Self {
            stage,
            operation,
            cluster_id: None,
            source,
        }
    }

    /// Attach the id of the cluster the failure relates to.
    #[must_use]
    pub fn with_cluster_id(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    /// The underlying error kind.
    #[must_use]
    pub fn kind(&self) -> &ProvisionError {
        &self.source
    }
}
