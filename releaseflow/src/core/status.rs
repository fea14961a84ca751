//! Run and stage status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The overall result of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    /// No terminal result yet; no failure has been observed.
    #[default]
    Pending,
    /// The run finished successfully.
    Success,
    /// The run failed.
    Failure,
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl std::str::FromStr for RunResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" | "" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(format!("unknown run result '{other}'")),
        }
    }
}

/// State of one pipeline execution, as seen by the release gate.
///
/// Values are replaced rather than mutated: the orchestrator derives a new
/// status after each barrier and threads it forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Identifier of the run.
    pub run_id: String,
    /// The branch being built.
    pub branch: String,
    /// The overall result so far.
    pub overall: RunResult,
}

impl RunStatus {
    /// Creates the initial status for a run on `branch`.
    #[must_use]
    pub fn pending(branch: impl Into<String>) -> Self {
        Self {
            run_id: crate::utils::generate_run_id(),
            branch: branch.into(),
            overall: RunResult::Pending,
        }
    }

    /// Returns this status with a new overall result.
    #[must_use]
    pub fn with_result(self, overall: RunResult) -> Self {
        Self { overall, ..self }
    }

    /// Returns true if no failure has been recorded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.overall != RunResult::Failure
    }
}

/// The execution status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully.
    Ok,
    /// Stage was skipped.
    Skip,
    /// Stage was cancelled.
    Cancel,
    /// Stage failed.
    Fail,
    /// Stage is pending execution.
    #[default]
    Pending,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skip => write!(f, "skip"),
            Self::Cancel => write!(f, "cancel"),
            Self::Fail => write!(f, "fail"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Cancel)
    }
}

/// What happened to one stage during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name, e.g. `build:linux-x86_64`.
    pub name: String,
    /// Final status.
    pub status: StageStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Error message if the stage failed or was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_result_parse() {
        assert_eq!("SUCCESS".parse::<RunResult>(), Ok(RunResult::Success));
        assert_eq!("".parse::<RunResult>(), Ok(RunResult::Pending));
        assert!("unstable".parse::<RunResult>().is_err());
    }

    #[test]
    fn test_run_status_threading() {
        let status = RunStatus::pending("main");
        let run_id = status.run_id.clone();
        assert!(status.is_healthy());

        let failed = status.with_result(RunResult::Failure);
        assert_eq!(failed.run_id, run_id);
        assert_eq!(failed.branch, "main");
        assert!(!failed.is_healthy());
    }

    #[test]
    fn test_stage_status() {
        assert!(StageStatus::Ok.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(StageStatus::Cancel.is_failure());
        assert!(!StageStatus::Skip.is_failure());
        assert_eq!(serde_json::to_string(&StageStatus::Cancel).unwrap(), r#""cancel""#);
    }
}
