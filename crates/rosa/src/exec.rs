//! External command execution.
//!
//! Every CLI the orchestrator drives (`rosa`, `terraform`) goes through a
//! [`CommandRunner`], so tests can substitute canned output and credentials
//! stay scoped to the spawned child.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::credentials::AwsCredentials;
use crate::error::ProvisionError;

/// A command to run: program, arguments and child-only environment.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments.
    pub args: Vec<String>,
    /// Environment entries set on the child only.
    pub envs: Vec<(String, String)>,
    /// Inherited environment entries removed from the child.
    pub env_removes: Vec<String>,
    /// Working directory for the child.
    pub current_dir: Option<PathBuf>,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // env values may carry secrets
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &redacted_args(&self.args))
            .field("envs", &env_keys)
            .field("env_removes", &self.env_removes)
            .field("current_dir", &self.current_dir)
            .finish()
    }
}

const REDACTED: &str = "<redacted>";

/// Flags whose value is a secret.
const SECRET_FLAGS: [&str; 1] = ["--token"];

/// Copy of `args` with the values of secret flags replaced.
fn redacted_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push(REDACTED.to_string());
            hide_next = false;
            continue;
        }
        match arg.split_once('=') {
            Some((flag, _)) if SECRET_FLAGS.contains(&flag) => {
                out.push(format!("{flag}={REDACTED}"));
            }
            _ => {
                hide_next = SECRET_FLAGS.contains(&arg.as_str());
                out.push(arg.clone());
            }
        }
    }
    out
}

impl CommandSpec {
    /// Start a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            env_removes: Vec::new(),
            current_dir: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Apply AWS credentials to the child environment.
    ///
    /// Identity variables the credentials do not set are removed, so ambient
    /// keys in the parent cannot override the chosen profile or key pair.
    #[must_use]
    pub fn with_credentials(mut self, credentials: &AwsCredentials) -> Self {
        self.envs.extend(credentials.env_vars());
        self.env_removes.extend(credentials.env_removals());
        self
    }

    /// Set an extra child environment entry.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Short human-readable form, e.g. `rosa create cluster`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let program = self.program.file_name().map_or_else(
            || self.program.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        let verbs: Vec<&str> = self
            .args
            .iter()
            .take_while(|a| !a.starts_with('-'))
            .take(2)
            .map(String::as_str)
            .collect();
        if verbs.is_empty() {
            program
        } else {
            format!("{program} {}", verbs.join(" "))
        }
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Output with the given stdout and empty stderr.
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs external commands.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion, aborting if `cancel` fires.
    async fn run(
        &self,
        spec: CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ProvisionError>;
}

/// [`CommandRunner`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        spec: CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ProvisionError> {
        let name = spec.display_name();
        debug!(command = %name, "Running command");

        let mut command = Command::new(&spec.program);
        for key in &spec.env_removes {
            command.env_remove(key);
        }
        command
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| ProvisionError::external(&name, format!("failed to start command: {e}")))?;

        // dropping the wait future kills the child
        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProvisionError::Cancelled),
            output = child.wait_with_output() => output,
        }
        .map_err(|e| ProvisionError::external(&name, format!("failed to wait for command: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ProvisionError::external(
                &name,
                format!("{} ({})", stderr.trim(), output.status),
            ));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Decode stdout holding a single JSON object.
///
/// # Errors
///
/// Returns [`ProvisionError::Decode`] if stdout is not the expected object.
pub fn decode_object<T: DeserializeOwned>(
    operation: &str,
    stdout: &str,
) -> Result<T, ProvisionError> {
    serde_json::from_str(stdout.trim()).map_err(|source| ProvisionError::Decode {
        operation: operation.to_string(),
        source,
    })
}

/// Decode stdout holding a JSON array of objects. Empty stdout is an empty list.
///
/// # Errors
///
/// Returns [`ProvisionError::Decode`] if stdout is not a list of the expected objects.
pub fn decode_list<T: DeserializeOwned>(
    operation: &str,
    stdout: &str,
) -> Result<Vec<T>, ProvisionError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    decode_object(operation, stdout)
}
