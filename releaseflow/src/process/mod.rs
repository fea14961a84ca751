//! External-process invocation.
//!
//! Compilers, signers and release tools all report failure the same way: a
//! non-zero exit code. Every invocation is therefore wrapped into a
//! [`ProcessOutcome`] rather than an error, and the stage that made the call
//! decides which error the outcome maps to. [`run_bounded`] adds the two
//! things every call needs: a bounded wait and a way out when the run is
//! cancelled.

mod invocation;
mod runner;

pub use invocation::{Arg, Invocation};
pub use runner::{CommandRunner, SystemCommandRunner};

use crate::cancellation::CancellationToken;
use crate::errors::{ReleaseflowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum number of stderr bytes kept on an outcome.
pub const STDERR_TAIL_BYTES: usize = 4096;

/// What an external process reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// The exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// The tail of the process's stderr.
    pub stderr: String,
}

impl ProcessOutcome {
    /// A successful exit.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stderr: String::new(),
        }
    }

    /// An exit with the given code.
    #[must_use]
    pub fn exited(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: code == 0,
            exit_code: Some(code),
            stderr: tail(&stderr.into(), STDERR_TAIL_BYTES),
        }
    }

    /// Builds an outcome from a finished process.
    #[must_use]
    pub fn from_output(output: &std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_BYTES),
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "exit code {code}")?,
            None => write!(f, "terminated by signal")?,
        }
        let last_line = self.stderr.lines().rev().find(|l| !l.trim().is_empty());
        if let Some(line) = last_line {
            write!(f, ": {}", line.trim())?;
        }
        Ok(())
    }
}

/// Keeps at most `max` bytes from the end of `text`, on a char boundary.
fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Runs `invocation` through `runner`, giving up after `timeout` or as soon
/// as `cancel` fires, whichever comes first.
///
/// Dropping the runner's future is what stops the child process, so runners
/// must kill their child on drop.
///
/// # Errors
///
/// `Cancelled` if the token fired, `Timeout` if the wait ran out, or
/// whatever the runner itself returned (spawn failures, typically).
pub async fn run_bounded(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<ProcessOutcome> {
    let cancelled = || ReleaseflowError::Cancelled {
        reason: cancel.reason().unwrap_or_else(|| "run cancelled".to_string()),
    };

    if cancel.is_cancelled() {
        return Err(cancelled());
    }

    info!(tool = %invocation.tool, command = %invocation, "Invoking external tool");

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(cancelled()),
        result = tokio::time::timeout(timeout, runner.run(invocation)) => match result {
            Ok(outcome) => outcome?,
            Err(_) => {
                return Err(ReleaseflowError::Timeout {
                    tool: invocation.tool.clone(),
                    seconds: timeout.as_secs(),
                })
            }
        },
    };

    debug!(tool = %invocation.tool, %outcome, "External tool finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Response, ScriptedRunner};
    use std::sync::Arc;

    #[test]
    fn test_outcome_display_uses_last_stderr_line() {
        let outcome = ProcessOutcome::exited(2, "warning: x\nerror: linker failed\n\n");
        assert!(!outcome.success);
        assert_eq!(outcome.to_string(), "exit code 2: error: linker failed");
        assert_eq!(ProcessOutcome::ok().to_string(), "exit code 0");
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let noisy = "é".repeat(STDERR_TAIL_BYTES);
        let outcome = ProcessOutcome::exited(1, noisy);
        assert!(outcome.stderr.len() <= STDERR_TAIL_BYTES);
        assert!(outcome.stderr.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn test_run_bounded_times_out() {
        let runner = ScriptedRunner::new().respond_to("cargo", Response::Hang);
        let invocation = Invocation::new("cargo", "cargo").arg("build");
        let token = CancellationToken::new();

        let err = run_bounded(&runner, &invocation, &token, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[tokio::test]
    async fn test_run_bounded_honours_cancellation() {
        let runner = Arc::new(ScriptedRunner::new().respond_to("cargo", Response::Hang));
        let token = Arc::new(CancellationToken::new());

        let task = {
            let runner = runner.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let invocation = Invocation::new("cargo", "cargo");
                run_bounded(runner.as_ref(), &invocation, &token, Duration::from_secs(60)).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel("macos-arm64 failed");

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        assert!(err.to_string().contains("macos-arm64 failed"));
    }

    #[tokio::test]
    async fn test_run_bounded_refuses_to_start_when_cancelled() {
        let runner = ScriptedRunner::new();
        let token = CancellationToken::new();
        token.cancel("already doomed");

        let err = run_bounded(
            &runner,
            &Invocation::new("cargo", "cargo"),
            &token,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(err.is_cancellation());
        assert!(runner.invocations().is_empty());
    }
}
