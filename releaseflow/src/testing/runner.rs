//! A command runner that answers from a script instead of spawning.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::Result;
use crate::process::{CommandRunner, Invocation, ProcessOutcome};

/// How a scripted tool behaves.
#[derive(Debug, Clone)]
pub enum Response {
    /// Exit zero.
    Succeed,
    /// Exit with `code`, printing `stderr`.
    Fail {
        /// Exit code.
        code: i32,
        /// Stderr text.
        stderr: String,
    },
    /// Write a file at the given path, then exit zero.
    WriteFile(PathBuf),
    /// Sleep, then exit zero.
    Sleep(Duration),
    /// Never finish. Counted in [`ScriptedRunner::interrupted`] once the
    /// caller gives up on it.
    Hang,
}

impl Response {
    /// Shorthand for a failing exit.
    #[must_use]
    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Self::Fail {
            code,
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug)]
struct Rule {
    tool: String,
    arg: Option<String>,
    response: Response,
}

impl Rule {
    fn matches(&self, invocation: &Invocation) -> bool {
        self.tool == invocation.tool
            && self.arg.as_deref().map_or(true, |arg| invocation.has_arg(arg))
    }
}

/// Records every invocation and answers it from the first matching rule.
/// Invocations no rule matches succeed.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    invocations: Mutex<Vec<Invocation>>,
    interrupted: AtomicUsize,
}

impl ScriptedRunner {
    /// Creates a runner where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every invocation of `tool` with `response`.
    #[must_use]
    pub fn respond_to(mut self, tool: impl Into<String>, response: Response) -> Self {
        self.rules.push(Rule {
            tool: tool.into(),
            arg: None,
            response,
        });
        self
    }

    /// Answers invocations of `tool` that carry `arg` with `response`.
    #[must_use]
    pub fn respond_to_matching(
        mut self,
        tool: impl Into<String>,
        arg: impl Into<String>,
        response: Response,
    ) -> Self {
        self.rules.push(Rule {
            tool: tool.into(),
            arg: Some(arg.into()),
            response,
        });
        self
    }

    /// Every invocation so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    /// Invocations of one tool.
    #[must_use]
    pub fn invocations_of(&self, tool: &str) -> Vec<Invocation> {
        self.invocations
            .lock()
            .iter()
            .filter(|i| i.tool == tool)
            .cloned()
            .collect()
    }

    /// How many hanging invocations were abandoned by their caller.
    #[must_use]
    pub fn interrupted(&self) -> usize {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn response_for(&self, invocation: &Invocation) -> Response {
        self.rules
            .iter()
            .find(|rule| rule.matches(invocation))
            .map_or(Response::Succeed, |rule| rule.response.clone())
    }
}

struct InterruptGuard<'a>(&'a AtomicUsize);

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
        self.invocations.lock().push(invocation.clone());

        match self.response_for(invocation) {
            Response::Succeed => Ok(ProcessOutcome::ok()),
            Response::Fail { code, stderr } => Ok(ProcessOutcome::exited(code, stderr)),
            Response::WriteFile(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, format!("{} output\n", invocation.tool)).await?;
                Ok(ProcessOutcome::ok())
            }
            Response::Sleep(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ProcessOutcome::ok())
            }
            Response::Hang => {
                let _guard = InterruptGuard(&self.interrupted);
                std::future::pending::<()>().await;
                Ok(ProcessOutcome::ok())
            }
        }
    }
}
