//! Local process execution.

use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info};

use edgeorch_core::ExecutionOutput;

use crate::error::{DispatchError, DispatchResult};

/// Runs an approved executable on this device.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, executable: &str, args: &[String]) -> DispatchResult<ExecutionOutput>;
}

/// Spawns the executable directly, without a shell.
///
/// A non-zero exit status is still a completed execution; only failing to
/// spawn is an error. The child is killed if the future is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, executable: &str, args: &[String]) -> DispatchResult<ExecutionOutput> {
        debug!(%executable, ?args, "spawning local process");

        let output = tokio::process::Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DispatchError::Spawn {
                executable: executable.to_string(),
                source,
            })?;

        let result = ExecutionOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        info!(%executable, exit_code = ?result.exit_code, "local process finished");
        Ok(result)
    }
}
