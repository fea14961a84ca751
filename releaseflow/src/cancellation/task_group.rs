//! Structured task group: parallel tasks joined by a single barrier.

use super::CancellationToken;
use crate::errors::{ReleaseflowError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How one task in a group ended.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    /// The name the task was spawned under.
    pub name: String,
    /// What it returned.
    pub result: Result<T>,
}

/// A group of related tasks with structured cancellation.
///
/// `wait` is a barrier: it returns only after every task has finished.
/// The first task to fail (with anything other than a cancellation)
/// cancels the group's token so still-running siblings can stop early.
pub struct StructuredTaskGroup<T> {
    /// The cancellation token shared by every task.
    cancel_token: Arc<CancellationToken>,
    /// Handles to spawned tasks.
    handles: Mutex<Vec<(String, JoinHandle<Result<T>>)>>,
}

impl<T: Send + 'static> StructuredTaskGroup<T> {
    /// Creates a new task group with its own token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_token(Arc::new(CancellationToken::new()))
    }

    /// Creates a task group sharing an existing token.
    #[must_use]
    pub fn with_token(cancel_token: Arc<CancellationToken>) -> Self {
        Self {
            cancel_token,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel_token
    }

    /// Spawns a task in the group.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, task: F)
    where
        F: FnOnce(Arc<CancellationToken>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let token = self.cancel_token.clone();
        let handle = tokio::spawn(async move { task(token).await });
        self.handles.lock().push((name.into(), handle));
    }

    /// Waits for every task to finish, in completion order.
    pub async fn wait(&self) -> Vec<TaskOutcome<T>> {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .map(|(name, handle)| async move { (name, handle.await) })
            .collect();

        let mut outcomes = Vec::new();
        while let Some((name, joined)) = pending.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_error) => Err(ReleaseflowError::Internal(format!(
                    "task '{name}' did not complete: {join_error}"
                ))),
            };

            if let Err(ref e) = result {
                if e.is_cancellation() {
                    debug!(task = %name, "Task stopped by cancellation");
                } else if !self.cancel_token.is_cancelled() {
                    warn!(task = %name, error = %e, "Task failed; cancelling siblings");
                    self.cancel_token.cancel(format!("'{name}' failed: {e}"));
                }
            }

            outcomes.push(TaskOutcome { name, result });
        }

        outcomes
    }

    /// Returns the number of tasks not yet awaited.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.lock().len()
    }
}

impl<T: Send + 'static> Default for StructuredTaskGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for StructuredTaskGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredTaskGroup")
            .field("task_count", &self.handles.lock().len())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}

/// Picks the error that doomed a group: the first failure that is not
/// itself a cancellation, falling back to a cancellation if that is all
/// there is.
pub fn first_failure<T>(outcomes: Vec<TaskOutcome<T>>) -> Result<Vec<(String, T)>> {
    let mut successes = Vec::new();
    let mut root_cause = None;
    let mut cancellation = None;

    for outcome in outcomes {
        match outcome.result {
            Ok(value) => successes.push((outcome.name, value)),
            Err(e) if e.is_cancellation() => {
                cancellation.get_or_insert(e);
            }
            Err(e) => {
                root_cause.get_or_insert(e);
            }
        }
    }

    match root_cause.or(cancellation) {
        Some(e) => Err(e),
        None => Ok(successes),
    }
}
