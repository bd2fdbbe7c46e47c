//! Terraform runner behind the [`InfraPlan`] contract.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::api::InfraPlan;
use crate::credentials::CallContext;
use crate::error::ProvisionError;
use crate::exec::{decode_object, CommandRunner, CommandSpec};

/// Name of the binary looked up on `PATH`.
pub const TERRAFORM_BINARY: &str = "terraform";

/// Plan file written by `plan` and consumed by `apply`.
const PLAN_FILE: &str = "tfplan";

/// Local plugin and module cache created by `init`.
const LOCAL_STATE_DIR: &str = ".terraform";

#[derive(Debug, Deserialize)]
struct OutputValue {
    value: serde_json::Value,
}

/// Runs `terraform` in a working directory.
#[derive(Clone)]
pub struct TerraformCli {
    binary: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl TerraformCli {
    /// Use `binary` through `runner`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    /// Use the explicit path if given, otherwise find `terraform` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] if no binary can be found.
    pub fn locate(
        explicit: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ProvisionError> {
        let binary = match explicit {
            Some(path) => path,
            None => which::which(TERRAFORM_BINARY).map_err(|e| {
                ProvisionError::Config(format!("{TERRAFORM_BINARY} binary not found on PATH: {e}"))
            })?,
        };
        Ok(Self::new(binary, runner))
    }

    async fn run(
        &self,
        dir: &Path,
        args: Vec<String>,
        ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        let spec = CommandSpec::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .env("TF_IN_AUTOMATION", "1")
            .with_credentials(ctx.credentials());
        Ok(self.runner.run(spec, ctx.cancel()).await?.stdout)
    }
}

fn var_args(vars: &BTreeMap<String, String>) -> impl Iterator<Item = String> + '_ {
    vars.iter()
        .flat_map(|(k, v)| ["-var".to_string(), format!("{k}={v}")])
}

#[async_trait]
impl InfraPlan for TerraformCli {
    async fn init(&self, dir: &Path, ctx: &CallContext) -> Result<(), ProvisionError> {
        self.run(dir, vec!["init".into(), "-input=false".into()], ctx)
            .await
            .map(|_| ())
    }

    async fn plan(
        &self,
        dir: &Path,
        vars: &BTreeMap<String, String>,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            format!("-out={PLAN_FILE}"),
        ];
        args.extend(var_args(vars));
        self.run(dir, args, ctx).await.map(|_| ())
    }

    async fn apply(&self, dir: &Path, ctx: &CallContext) -> Result<(), ProvisionError> {
        let args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
            PLAN_FILE.to_string(),
        ];
        self.run(dir, args, ctx).await.map(|_| ())
    }

    async fn output(
        &self,
        dir: &Path,
        ctx: &CallContext,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        let stdout = self
            .run(dir, vec!["output".into(), "-json".into()], ctx)
            .await?;
        let outputs: BTreeMap<String, OutputValue> = decode_object("terraform output", &stdout)?;
        Ok(outputs
            .into_iter()
            .map(|(name, output)| (name, output.value.to_string()))
            .collect())
    }

    async fn destroy(
        &self,
        dir: &Path,
        vars: &BTreeMap<String, String>,
        ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
        ];
        args.extend(var_args(vars));
        self.run(dir, args, ctx).await.map(|_| ())
    }

    async fn uninstall(&self, dir: &Path) -> Result<(), ProvisionError> {
        let local = dir.join(LOCAL_STATE_DIR);
        match tokio::fs::remove_dir_all(&local).await {
            Ok(()) => {
                debug!(dir = %local.display(), "Removed terraform local state");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProvisionError::io(
                format!("failed to remove {}", local.display()),
                e,
            )),
        }
    }
}
