use crate::core::RunStatus;

/// Decides whether a run may publish a release.
///
/// True iff no failure has been recorded and the run is on `target_branch`.
/// `Pending` counts as eligible because the gate is evaluated before the
/// run's terminal result is set.
#[must_use]
pub fn should_release(status: &RunStatus, target_branch: &str) -> bool {
    status.is_healthy() && status.branch == target_branch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunResult;

    fn status(branch: &str, overall: RunResult) -> RunStatus {
        RunStatus::pending(branch).with_result(overall)
    }

    #[test]
    fn test_gate_truth_table() {
        let cases = [
            ("main", RunResult::Pending, true),
            ("main", RunResult::Success, true),
            ("main", RunResult::Failure, false),
            ("feature/x", RunResult::Pending, false),
            ("feature/x", RunResult::Success, false),
            ("feature/x", RunResult::Failure, false),
        ];

        for (branch, overall, expected) in cases {
            assert_eq!(
                should_release(&status(branch, overall), "main"),
                expected,
                "branch={branch} result={overall}"
            );
        }
    }

    #[test]
    fn test_branch_match_is_exact() {
        assert!(!should_release(&status("Main", RunResult::Success), "main"));
        assert!(!should_release(&status("main ", RunResult::Success), "main"));
        assert!(!should_release(&status("release/main", RunResult::Success), "main"));
    }
}
