//! Admin command execution
//!
//! Wraps invocation of the Ceph admin binaries (`radosgw-admin`, `ceph`) with
//! the connection arguments every admin command needs. Output is returned as
//! opaque text; parsing is the caller's job. Nothing here retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::OperatorConfig;
use crate::{Error, Result};

/// Keyring file name of the admin identity inside the cluster config dir
const ADMIN_KEYRING_FILE: &str = "client.admin.keyring";

/// Exit status the admin tools return when the target entity already exists
pub const EEXIST: i32 = 17;

/// Process-level failure of an admin command
#[derive(Debug, Error)]
pub enum ExecError {
    /// The binary could not be started
    #[error("failed to launch: {0}")]
    Launch(#[source] std::io::Error),

    /// The binary ran and exited unsuccessfully
    #[error("exited with status {code:?}: {output}")]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },
}

impl ExecError {
    /// Whether the command failed because its target already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ExecError::NonZeroExit { code: Some(EEXIST), .. })
    }
}

/// Trait abstracting process execution for testability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` and return its combined stdout and stderr
    async fn execute_combined_output(
        &self,
        program: &str,
        args: &[String],
    ) -> std::result::Result<String, ExecError>;
}

/// Executor that spawns real processes
#[derive(Debug, Default, Clone)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Create a new process executor
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute_combined_output(
        &self,
        program: &str,
        args: &[String],
    ) -> std::result::Result<String, ExecError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(ExecError::Launch)?;

        // stdout first so structured output stays at the front
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ExecError::NonZeroExit {
                code: output.status.code(),
                output: combined,
            })
        }
    }
}

/// Append the standard admin connection arguments to `args`
///
/// Every admin command targets the cluster named after the namespace, using the
/// generated config and admin keyring under `<config_dir>/<namespace>/`.
pub fn append_admin_connection_args(
    mut args: Vec<String>,
    config_dir: &Path,
    namespace: &str,
) -> Vec<String> {
    let cluster_dir = config_dir.join(namespace);
    args.push(format!("--cluster={}", namespace));
    args.push(format!(
        "--conf={}",
        cluster_dir.join(format!("{}.config", namespace)).display()
    ));
    args.push(format!(
        "--keyring={}",
        cluster_dir.join(ADMIN_KEYRING_FILE).display()
    ));
    args
}

/// Runs Ceph admin binaries against one cluster namespace
#[derive(Clone)]
pub struct AdminCommandRunner {
    executor: Arc<dyn CommandExecutor>,
    config_dir: PathBuf,
    namespace: String,
    rgw_admin_binary: String,
    ceph_binary: String,
}

impl AdminCommandRunner {
    /// Create a runner for the cluster in `namespace`
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        config: &OperatorConfig,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            config_dir: config.config_dir.clone(),
            namespace: namespace.into(),
            rgw_admin_binary: config.rgw_admin_binary.clone(),
            ceph_binary: config.ceph_binary.clone(),
        }
    }

    /// Run a `radosgw-admin` subcommand
    pub async fn run_rgw_admin(&self, args: &[&str]) -> Result<String> {
        self.run(&self.rgw_admin_binary, args).await
    }

    /// Run a `ceph` subcommand
    pub async fn run_ceph(&self, args: &[&str]) -> Result<String> {
        self.run(&self.ceph_binary, args).await
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let args = append_admin_connection_args(
            args.iter().map(|a| a.to_string()).collect(),
            &self.config_dir,
            &self.namespace,
        );
        let command = render_command(program, &args);
        debug!(command = %command, "running admin command");

        self.executor
            .execute_combined_output(program, &args)
            .await
            .map_err(|e| Error::execution(command, e))
    }
}

/// Render a command line for logs and errors, quoting arguments with whitespace
fn render_command(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push_str(&format!("\"{}\"", arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}
