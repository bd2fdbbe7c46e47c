//! Managed OpenShift (ROSA) cluster lifecycle orchestration.
//!
//! This crate creates and deletes ROSA clusters on AWS. A create walks the
//! prerequisites in order (account roles, OIDC configuration, VPC network),
//! submits the cluster, waits for it to become ready and finally checks node
//! health. A delete tears the same pieces down in reverse. An upgrade
//! acknowledges the version gate, schedules the upgrade and follows the
//! in-cluster upgrade operator until it finishes.
//!
//! # Example
//!
//! ```rust,ignore
//! use rosa::{ClusterLifecycleController, ClusterOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let controller = ClusterLifecycleController::new(collaborators, credentials, settings);
//! let options = ClusterOptions::new("c1", "4.14.6")
//!     .with_hosted_control_plane(true)
//!     .with_sts(true);
//! let handle = controller.create(&options, CancellationToken::new()).await?;
//! println!("cluster {} is ready", handle.id);
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod exec;
pub mod health;
pub mod muo;
pub mod network;
pub mod nodes;
pub mod ocm;
pub mod oidc;
pub mod poll;
pub mod provider;
pub mod request;
pub mod roles;
pub mod state;
pub mod terraform;
pub mod upgrade;
pub mod version;

pub use config::{LifecycleConfig, OcmEnvironment};
pub use controller::{ClusterLifecycleController, Collaborators, LifecycleSettings};
pub use credentials::{AwsCredentials, CallContext};
pub use error::{LifecycleError, Operation, ProvisionError, Stage};
pub use poll::PollPolicy;
pub use provider::RosaProvider;
pub use request::{ClusterOptions, DeleteOptions, UpgradeOptions};
pub use upgrade::{ClusterUpgrader, UpgradeCollaborators, UpgradeSettings};
