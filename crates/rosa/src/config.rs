//! Lifecycle configuration.
//!
//! Loaded from YAML; every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::LifecycleSettings;
use crate::error::ProvisionError;
use crate::poll::PollPolicy;
use crate::upgrade::UpgradeSettings;

/// OCM environment the cluster is managed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcmEnvironment {
    /// Production.
    #[default]
    Production,
    /// Staging.
    Stage,
    /// Integration.
    Integration,
}

impl OcmEnvironment {
    /// API URL of the environment.
    #[must_use]
    pub fn url(self) -> &'static str {
        match self {
            Self::Production => "https://api.openshift.com",
            Self::Stage => "https://api.stage.openshift.com",
            Self::Integration => "https://api.integration.openshift.com",
        }
    }
}

impl std::fmt::Display for OcmEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Stage => write!(f, "stage"),
            Self::Integration => write!(f, "integration"),
        }
    }
}

impl std::str::FromStr for OcmEnvironment {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "stage" | "staging" => Ok(Self::Stage),
            "integration" | "int" => Ok(Self::Integration),
            _ => Err(ProvisionError::Config(format!(
                "unknown ocm environment: {s}. Supported: production, stage, integration"
            ))),
        }
    }
}

/// Poll budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between cluster state checks.
    pub cluster_interval_secs: u64,
    /// Ready checks for hosted control plane clusters.
    pub hosted_ready_attempts: u32,
    /// Ready checks for classic clusters.
    pub classic_ready_attempts: u32,
    /// Absence checks after delete.
    pub deleted_attempts: u32,
    /// Seconds between node health checks.
    pub node_interval_secs: u64,
    /// Window for all nodes to become Ready.
    pub node_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            cluster_interval_secs: 60,
            hosted_ready_attempts: 30,
            classic_ready_attempts: 120,
            deleted_attempts: 30,
            node_interval_secs: 30,
            node_timeout_secs: 600,
        }
    }
}

/// Upgrade scheduling and poll budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Seconds between scheduling an upgrade and its start.
    pub schedule_delay_secs: u64,
    /// Checks for the operator's upgrade config to appear.
    pub config_attempts: u32,
    /// Seconds between upgrade config checks.
    pub config_interval_secs: u64,
    /// Progress checks until the upgrade finishes.
    pub progress_attempts: u32,
    /// Seconds between progress checks.
    pub progress_interval_secs: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            schedule_delay_secs: 420,
            config_attempts: 6,
            config_interval_secs: 30,
            progress_attempts: 1080,
            progress_interval_secs: 10,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// OCM environment.
    pub ocm_environment: OcmEnvironment,
    /// Explicit `rosa` binary; looked up on `PATH` when unset.
    pub rosa_binary: Option<PathBuf>,
    /// Explicit `terraform` binary; looked up on `PATH` when unset.
    pub terraform_binary: Option<PathBuf>,
    /// Base directory for per-cluster network plans.
    pub work_dir: PathBuf,
    /// Poll budgets.
    pub polling: PollingConfig,
    /// Upgrade budgets.
    pub upgrade: UpgradeConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ocm_environment: OcmEnvironment::default(),
            rosa_binary: None,
            terraform_binary: None,
            work_dir: std::env::temp_dir().join("rosa-lifecycle"),
            polling: PollingConfig::default(),
            upgrade: UpgradeConfig::default(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Io`] if the file cannot be read or
    /// [`ProvisionError::Config`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self, ProvisionError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProvisionError::io(format!("failed to read {}", path.display()), e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] if the text is not valid.
    pub fn from_yaml(content: &str) -> Result<Self, ProvisionError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ProvisionError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check budgets are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] naming the offending value.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let p = &self.polling;
        let u = &self.upgrade;
        if p.hosted_ready_attempts == 0
            || p.classic_ready_attempts == 0
            || p.deleted_attempts == 0
            || u.config_attempts == 0
            || u.progress_attempts == 0
        {
            return Err(ProvisionError::Config("poll attempts must be at least 1".into()));
        }
        if p.node_interval_secs == 0 {
            return Err(ProvisionError::Config(
                "node_interval_secs must be at least 1".into(),
            ));
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err(ProvisionError::Config("work_dir must not be empty".into()));
        }
        Ok(())
    }

    /// Controller settings derived from this configuration.
    #[must_use]
    pub fn settings(&self) -> LifecycleSettings {
        let p = &self.polling;
        let cluster_interval = Duration::from_secs(p.cluster_interval_secs);
        LifecycleSettings {
            work_dir: self.work_dir.clone(),
            hosted_ready: PollPolicy::new(p.hosted_ready_attempts, cluster_interval),
            classic_ready: PollPolicy::new(p.classic_ready_attempts, cluster_interval),
            deleted: PollPolicy::new(p.deleted_attempts, cluster_interval),
            node_health: PollPolicy::within(
                Duration::from_secs(p.node_timeout_secs),
                Duration::from_secs(p.node_interval_secs),
            ),
        }
    }
}

impl LifecycleConfig {
    /// Upgrade settings derived from this configuration.
    #[must_use]
    pub fn upgrade_settings(&self) -> UpgradeSettings {
        let u = &self.upgrade;
        UpgradeSettings {
            schedule_delay: Duration::from_secs(u.schedule_delay_secs),
            config_present: PollPolicy::new(
                u.config_attempts,
                Duration::from_secs(u.config_interval_secs),
            ),
            progress: PollPolicy::new(
                u.progress_attempts,
                Duration::from_secs(u.progress_interval_secs),
            ),
        }
    }
}
