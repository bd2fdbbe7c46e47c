//! Bounded, fixed-interval polling against eventually-consistent state.
//!
//! [`poll_until`] calls a predicate up to `attempts` times. A predicate error
//! counts as "not yet" and consumes an attempt; it never ends the loop early.
//! Cancellation ends the loop promptly, including mid-sleep.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ClusterApi;
use crate::credentials::CallContext;
use crate::error::ProvisionError;

/// Cluster state reported once installation has finished.
pub const CLUSTER_READY_STATE: &str = "ready";

/// Attempt budget and interval of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of predicate invocations.
    pub attempts: u32,
    /// Sleep between unsuccessful attempts.
    pub interval: Duration,
}

impl PollPolicy {
    /// Policy with the given budget.
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Policy covering `window` at `interval`, at least one attempt.
    #[must_use]
    pub fn within(window: Duration, interval: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            u32::try_from(window.as_millis() / interval.as_millis().max(1))
                .unwrap_or(u32::MAX)
                .max(1)
        };
        Self { attempts, interval }
    }
}

/// Poll `predicate` until it returns `true`.
///
/// # Errors
///
/// Returns [`ProvisionError::Timeout`] naming `resource` once the budget is
/// spent, carrying the last predicate error if any, or
/// [`ProvisionError::Cancelled`] if `cancel` fires.
pub async fn poll_until<F, Fut, E>(
    resource: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut predicate: F,
) -> Result<(), ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProvisionError::Cancelled),
            outcome = predicate() => outcome,
        };

        match outcome {
            Ok(true) => {
                info!(resource = %resource, attempt, "✅ Condition met");
                return Ok(());
            }
            Ok(false) => {
                debug!(
                    resource = %resource,
                    attempt,
                    max_attempts = policy.attempts,
                    "Condition not met yet"
                );
            }
            Err(e) => {
                warn!(resource = %resource, attempt, error = %e, "Check failed, will retry");
                last_error = Some(e.to_string());
            }
        }

        if attempt < policy.attempts {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ProvisionError::Cancelled),
                () = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    Err(ProvisionError::Timeout {
        resource: resource.to_string(),
        attempts: policy.attempts,
        last_error,
    })
}

/// Search expression matching a ROSA cluster by exact name.
#[must_use]
pub fn cluster_search_query(name: &str) -> String {
    format!(
        "product.id = 'rosa' AND name = '{}'",
        name.replace('\'', "''")
    )
}

/// Whether the cluster reports the ready state.
///
/// # Errors
///
/// Propagates the describe call's error.
pub async fn cluster_ready(
    api: &dyn ClusterApi,
    cluster_id: &str,
    ctx: &CallContext,
) -> Result<bool, ProvisionError> {
    let state = api.describe_cluster(cluster_id, ctx).await?;
    debug!(cluster_id = %cluster_id, state = %state, "Cluster state");
    Ok(state == CLUSTER_READY_STATE)
}

/// Whether no cluster with `name` exists any more.
///
/// # Errors
///
/// Propagates the search call's error; a failed lookup is never read as "gone".
pub async fn cluster_absent(
    api: &dyn ClusterApi,
    name: &str,
    ctx: &CallContext,
) -> Result<bool, ProvisionError> {
    let page = api
        .list_clusters(&cluster_search_query(name), 1, 1, ctx)
        .await?;
    Ok(page.total == 0)
}
