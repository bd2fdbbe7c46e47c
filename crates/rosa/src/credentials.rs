//! AWS credentials and the per-call context handed to every collaborator.
//!
//! Credentials are never exported into the process environment. Each
//! collaborator receives them explicitly through a [`CallContext`] and applies
//! them to the environment of the child process it spawns, nothing else.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ProvisionError;

/// Environment variable holding the AWS profile name.
pub const AWS_PROFILE: &str = "AWS_PROFILE";
/// Environment variable holding the AWS access key id.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the AWS secret access key.
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Environment variable holding the AWS region.
pub const AWS_REGION: &str = "AWS_REGION";
/// Environment variable holding a temporary session token.
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
/// Legacy profile variable still honoured by the AWS SDKs.
pub const AWS_DEFAULT_PROFILE: &str = "AWS_DEFAULT_PROFILE";

/// Identity variables a child could pick up from the parent environment.
const IDENTITY_VARS: [&str; 5] = [
    AWS_PROFILE,
    AWS_DEFAULT_PROFILE,
    AWS_ACCESS_KEY_ID,
    AWS_SECRET_ACCESS_KEY,
    AWS_SESSION_TOKEN,
];

/// Data used to authenticate with AWS.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Named profile from the shared credentials file.
    pub profile: Option<String>,
    /// Static access key id.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Region every call runs against.
    pub region: String,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("profile", &self.profile)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .finish()
    }
}

impl AwsCredentials {
    /// Credentials backed by a named profile.
    #[must_use]
    pub fn from_profile(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            profile: Some(profile.into()),
            region: region.into(),
            ..Self::default()
        }
    }

    /// Credentials backed by a static key pair.
    #[must_use]
    pub fn from_keys(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
            region: region.into(),
            ..Self::default()
        }
    }

    /// Read credentials from the standard `AWS_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            profile: non_empty(AWS_PROFILE),
            access_key_id: non_empty(AWS_ACCESS_KEY_ID),
            secret_access_key: non_empty(AWS_SECRET_ACCESS_KEY),
            region: non_empty(AWS_REGION).unwrap_or_default(),
        }
    }

    /// Fall back to the environment when nothing was supplied, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] when no usable credentials or region exist.
    pub fn resolve(self) -> Result<Self, ProvisionError> {
        let resolved = if self == Self::default() {
            Self::from_env()
        } else {
            self
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// Check that a region and either a profile or a key pair are set.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] describing what is missing.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.profile.is_none() && !self.has_keys() {
            return Err(ProvisionError::Config("aws credentials are not supplied".into()));
        }
        if self.region.is_empty() {
            return Err(ProvisionError::Config("aws region is not supplied".into()));
        }
        Ok(())
    }

    fn has_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Environment entries for a child process. A profile wins over static keys.
    #[must_use]
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![(AWS_REGION.to_string(), self.region.clone())];
        if let Some(profile) = &self.profile {
            vars.push((AWS_PROFILE.to_string(), profile.clone()));
        } else if let (Some(id), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            vars.push((AWS_ACCESS_KEY_ID.to_string(), id.clone()));
            vars.push((AWS_SECRET_ACCESS_KEY.to_string(), secret.clone()));
        }
        vars
    }

    /// Identity variables a child must not inherit, i.e. every one
    /// [`env_vars`](Self::env_vars) does not set.
    #[must_use]
    pub fn env_removals(&self) -> Vec<String> {
        let set = self.env_vars();
        IDENTITY_VARS
            .iter()
            .filter(|key| !set.iter().any(|(k, _)| k == *key))
            .map(ToString::to_string)
            .collect()
    }
}

/// Capabilities threaded through every external call: credentials and cancellation.
#[derive(Debug, Clone)]
pub struct CallContext {
    credentials: Arc<AwsCredentials>,
    cancel: CancellationToken,
}

impl CallContext {
    /// Create a context for one create/delete invocation.
    #[must_use]
    pub fn new(credentials: Arc<AwsCredentials>, cancel: CancellationToken) -> Self {
        Self {
            credentials,
            cancel,
        }
    }

    /// Credentials to apply to spawned processes.
    #[must_use]
    pub fn credentials(&self) -> &AwsCredentials {
        &self.credentials
    }

    /// Region of the credentials.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.credentials.region
    }

    /// Cancellation token of the invocation.
    #[must_use]
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `fut`, aborting with [`ProvisionError::Cancelled`] if the token fires first.
    ///
    /// # Errors
    ///
    /// Returns the future's error, or `Cancelled`.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, ProvisionError>
    where
        F: std::future::Future<Output = Result<T, ProvisionError>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            result = fut => result,
        }
    }
}
