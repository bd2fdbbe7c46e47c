//! ROSA lifecycle CLI - create, upgrade and delete managed OpenShift clusters on AWS.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rosa::api::ClusterApi;
use rosa::exec::{CommandRunner, ProcessRunner};
use rosa::muo::KubeUpgradeOperator;
use rosa::nodes::KubeNodeHealth;
use rosa::request::{DEFAULT_CHANNEL_GROUP, DEFAULT_COMPUTE_MACHINE_TYPE, DEFAULT_MACHINE_CIDR};
use rosa::terraform::TerraformCli;
use rosa::{
    AwsCredentials, CallContext, ClusterLifecycleController, ClusterOptions, ClusterUpgrader,
    Collaborators, DeleteOptions, LifecycleConfig, OcmEnvironment, RosaProvider,
    UpgradeCollaborators, UpgradeOptions,
};

/// ROSA lifecycle CLI - managed OpenShift cluster orchestration.
#[derive(Parser)]
#[command(name = "rosa-lifecycle")]
#[command(about = "Create, upgrade and delete ROSA clusters on AWS")]
#[command(version, propagate_version = true)]
struct Cli {
    /// OCM offline token (or set `OCM_TOKEN` env var).
    #[arg(long, env = "OCM_TOKEN", hide_env_values = true)]
    ocm_token: String,

    /// Path to a YAML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// OCM environment (production, stage, integration). Overrides the config file.
    #[arg(long)]
    ocm_environment: Option<OcmEnvironment>,

    #[command(flatten)]
    aws: AwsArgs,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AwsArgs {
    /// AWS profile (or set `AWS_PROFILE` env var).
    #[arg(long, env = "AWS_PROFILE")]
    aws_profile: Option<String>,

    /// AWS access key id (or set `AWS_ACCESS_KEY_ID` env var).
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    aws_access_key_id: Option<String>,

    /// AWS secret access key (or set `AWS_SECRET_ACCESS_KEY` env var).
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    aws_secret_access_key: Option<String>,

    /// AWS region (or set `AWS_REGION` env var).
    #[arg(long, env = "AWS_REGION")]
    aws_region: String,
}

impl AwsArgs {
    fn credentials(self) -> Result<AwsCredentials> {
        let credentials = AwsCredentials {
            profile: self.aws_profile,
            access_key_id: self.aws_access_key_id,
            secret_access_key: self.aws_secret_access_key,
            region: self.aws_region,
        };
        credentials.validate()?;
        Ok(credentials)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a cluster and wait until it is ready.
    ///
    /// Account roles, OIDC config and network are created first when the
    /// topology needs them and reused if they already exist.
    Create {
        /// Cluster name.
        #[arg(long)]
        name: String,

        /// OpenShift version (e.g., 4.14.6).
        #[arg(long)]
        version: String,

        /// Channel group.
        #[arg(long, default_value = DEFAULT_CHANNEL_GROUP)]
        channel_group: String,

        /// Compute machine type.
        #[arg(long, default_value = DEFAULT_COMPUTE_MACHINE_TYPE)]
        compute_machine_type: String,

        /// Machine CIDR.
        #[arg(long, default_value = DEFAULT_MACHINE_CIDR)]
        machine_cidr: String,

        /// Worker replicas.
        #[arg(long)]
        replicas: Option<u32>,

        /// Use a hosted control plane.
        #[arg(long, default_value = "false")]
        hosted_cp: bool,

        /// Use AWS STS.
        #[arg(long, default_value = "false")]
        sts: bool,

        /// Create a managed OIDC config (hosted control plane only).
        #[arg(long, default_value = "false")]
        managed_oidc: bool,

        /// Extra cluster properties passed through verbatim.
        #[arg(long)]
        properties: Option<String>,
    },

    /// Upgrade a cluster in place and wait for the upgrade to finish.
    ///
    /// A minor upgrade acknowledges the version gate first.
    Upgrade {
        /// Cluster ID.
        #[arg(long)]
        cluster_id: String,

        /// Version the cluster currently runs (e.g., 4.14.9).
        #[arg(long)]
        from_version: String,

        /// Version to upgrade to (e.g., 4.15.2).
        #[arg(long)]
        to_version: String,
    },

    /// Delete a cluster and the resources created for it.
    Delete {
        /// Cluster ID.
        #[arg(long)]
        cluster_id: String,

        /// Cluster name.
        #[arg(long)]
        cluster_name: String,

        /// The cluster uses a hosted control plane.
        #[arg(long, default_value = "false")]
        hosted_cp: bool,

        /// The cluster uses AWS STS.
        #[arg(long, default_value = "false")]
        sts: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info,rosa=debug,rosa_lifecycle=debug")
    } else {
        EnvFilter::new("warn,rosa=info,rosa_lifecycle=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => LifecycleConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LifecycleConfig::default(),
    };
    if let Some(environment) = cli.ocm_environment {
        config.ocm_environment = environment;
    }

    let credentials = Arc::new(cli.aws.credentials().context("invalid AWS credentials")?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight operations");
            on_signal.cancel();
        }
    });

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let ctx = CallContext::new(Arc::clone(&credentials), cancel.clone());
    let provider = Arc::new(
        RosaProvider::connect(&config, &cli.ocm_token, Arc::clone(&runner), &ctx)
            .await
            .context("failed to connect to OCM")?,
    );
    let terraform = TerraformCli::locate(config.terraform_binary.clone(), runner)
        .context("failed to locate terraform")?;

    let clusters: Arc<dyn ClusterApi> = provider.clone();
    let upgrader = ClusterUpgrader::new(
        UpgradeCollaborators {
            upgrades: provider.clone(),
            clusters: Arc::clone(&clusters),
            operator: Arc::new(KubeUpgradeOperator),
        },
        Arc::clone(&credentials),
        config.upgrade_settings(),
    );
    let collaborators = Collaborators {
        account_roles: provider.clone(),
        oidc: provider,
        clusters,
        network: Arc::new(terraform),
        nodes: Arc::new(KubeNodeHealth),
    };
    let controller =
        ClusterLifecycleController::new(collaborators, credentials, config.settings());

    match cli.command {
        Commands::Create {
            name,
            version,
            channel_group,
            compute_machine_type,
            machine_cidr,
            replicas,
            hosted_cp,
            sts,
            managed_oidc,
            properties,
        } => {
            let mut options = ClusterOptions::new(name, version)
                .with_channel_group(channel_group)
                .with_compute_machine_type(compute_machine_type)
                .with_machine_cidr(machine_cidr)
                .with_hosted_control_plane(hosted_cp)
                .with_sts(sts)
                .with_managed_oidc_config(managed_oidc);
            if let Some(replicas) = replicas {
                options = options.with_replicas(replicas);
            }
            if let Some(properties) = properties {
                options = options.with_properties(properties);
            }

            let handle = controller.create(&options, cancel).await?;
            info!(cluster = %handle.name, cluster_id = %handle.id, "✅ Cluster is ready");
            println!("{}", handle.id);
        }
        Commands::Upgrade {
            cluster_id,
            from_version,
            to_version,
        } => {
            let options = UpgradeOptions::new(cluster_id.clone(), from_version, to_version.clone());
            upgrader.upgrade(&options, cancel).await?;
            info!(cluster_id = %cluster_id, version = %to_version, "✅ Cluster upgraded");
        }
        Commands::Delete {
            cluster_id,
            cluster_name,
            hosted_cp,
            sts,
        } => {
            let options = DeleteOptions::new(cluster_id, cluster_name)
                .with_hosted_control_plane(hosted_cp)
                .with_sts(sts);

            controller.delete(&options, cancel).await?;
            info!(cluster = %options.cluster_name(), "✅ Cluster deleted");
        }
    }

    Ok(())
}
