//! Command runners.

use super::{Invocation, ProcessOutcome};
use crate::errors::{ReleaseflowError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tracing::debug;

/// Runs external processes.
///
/// Implementations must stop the child process when the returned future is
/// dropped; cancellation and timeouts rely on it.
#[async_trait]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Runs the invocation to completion.
    ///
    /// A non-zero exit is reported through the outcome, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started.
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome>;
}

/// Runs processes on the local machine with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(invocation.args.iter().map(super::Arg::expose))
            .envs(invocation.env.iter().map(|(k, v)| (k, v.expose())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref cwd) = invocation.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|e| {
            ReleaseflowError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to start '{}': {e}", invocation.program.display()),
            ))
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(tool = %invocation.tool, "{}", line);
        }

        Ok(ProcessOutcome::from_output(&output))
    }
}
