//! What a run did.

use crate::core::{Artifact, ReleaseRequest, RunResult, RunStatus, StageRecord, StageStatus};
use crate::errors::ReleaseflowError;
use std::fmt::Write as _;

/// The outcome of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// Final run status.
    pub status: RunStatus,
    /// One record per stage, in execution order; builds in registry order.
    pub stages: Vec<StageRecord>,
    /// The request handed to the release tool, if the gate opened.
    pub released: Option<ReleaseRequest>,
    /// Whether the release tool was skipped.
    pub dry_run: bool,
    /// Every artifact in the store when the run ended.
    pub artifacts: Vec<Artifact>,
    /// The error that failed the run.
    pub error: Option<ReleaseflowError>,
}

impl RunReport {
    /// An empty report for a run that has just started.
    #[must_use]
    pub fn new(status: RunStatus, dry_run: bool) -> Self {
        Self {
            status,
            stages: Vec::new(),
            released: None,
            dry_run,
            artifacts: Vec::new(),
            error: None,
        }
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.overall == RunResult::Success
    }

    /// The record for stage `name`.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Names of the stages that ended with `status`.
    #[must_use]
    pub fn stages_with(&self, status: StageStatus) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// A human-readable multi-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "run {} on '{}': {}",
            self.status.run_id, self.status.branch, self.status.overall
        );
        for stage in &self.stages {
            let _ = write!(out, "  {:<28} {:<7} {:>9.1}ms", stage.name, stage.status.to_string(), stage.duration_ms);
            if let Some(ref error) = stage.error {
                let _ = write!(out, "  {error}");
            }
            out.push('\n');
        }
        match self.released {
            Some(ref request) => {
                let verb = if self.dry_run { "would release" } else { "released" };
                let _ = writeln!(
                    out,
                    "{verb} {}/{} ({} bump) with {} assets:",
                    request.owner,
                    request.repo,
                    request.bump,
                    request.assets.len()
                );
                for name in request.asset_names() {
                    let _ = writeln!(out, "  {name}");
                }
            }
            None => out.push_str("no release\n"),
        }
        if let Some(ref error) = self.error {
            let _ = writeln!(out, "error [{}]: {error}", error.code());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_failed_run() {
        let mut report = RunReport::new(RunStatus::pending("main").with_result(RunResult::Failure), false);
        report.stages.push(StageRecord {
            name: "build:macos-arm64".to_string(),
            status: StageStatus::Fail,
            duration_ms: 12.0,
            error: Some("exit code 101".to_string()),
        });
        report.error = Some(ReleaseflowError::config("bad"));

        let summary = report.summary();
        assert!(!report.is_success());
        assert!(summary.contains("on 'main': failure"));
        assert!(summary.contains("no release"));
        assert!(summary.contains("error [CONFIG]"));
        assert_eq!(report.stages_with(StageStatus::Fail), vec!["build:macos-arm64"]);
        assert!(report.stage("sign").is_none());
    }
}
