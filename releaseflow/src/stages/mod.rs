//! The four stages of a release run.
//!
//! Stages do not talk to each other directly. Builds publish into the
//! artifact store, signing and publishing read from it, and the release gate
//! only ever sees the [`RunStatus`](crate::core::RunStatus) the orchestrator
//! derives after each barrier.

mod build;
mod gate;
mod publish;
mod sign;

pub use build::build_target;
pub use gate::should_release;
pub use publish::{collect_release_set, publish_release, release_invocation, PublishMode};
pub use sign::{sign_artifacts, signing_targets, SigningCredential};

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{StageRecord, StageStatus};
use crate::errors::Result;
use crate::events::{RunEvents, STAGE_CANCELLED, STAGE_COMPLETED, STAGE_FAILED, STAGE_SKIPPED, STAGE_STARTED};
use crate::process::CommandRunner;
use crate::registry::{AgentPool, TargetRegistry};
use crate::secrets::SecretSource;
use crate::store::ArtifactStore;
use crate::utils::elapsed_ms;
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Name of the signing stage.
pub const SIGN_STAGE: &str = "sign";
/// Name of the release gate.
pub const GATE_STAGE: &str = "gate";
/// Name of the release publisher.
pub const PUBLISH_STAGE: &str = "publish";

/// Name of the build stage for `triple`.
#[must_use]
pub fn build_stage_name(triple: &str) -> String {
    format!("build:{triple}")
}

/// Everything a stage may touch. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Run configuration.
    pub config: Arc<PipelineConfig>,
    /// Targets of this run.
    pub registry: Arc<TargetRegistry>,
    /// Agents able to take work.
    pub agents: Arc<AgentPool>,
    /// The run's artifact store.
    pub store: Arc<dyn ArtifactStore>,
    /// Where this run's builds land under their canonical names.
    pub dist_dir: PathBuf,
    /// Spawns external tools.
    pub runner: Arc<dyn CommandRunner>,
    /// Where credentials come from.
    pub secrets: Arc<dyn SecretSource>,
    /// Lifecycle events for this run.
    pub events: RunEvents,
    /// Fired when the run is doomed.
    pub cancel: Arc<CancellationToken>,
}

/// Runs `stage`, emitting its lifecycle events, and records how it ended.
pub async fn tracked<T, Fut>(events: &RunEvents, name: &str, stage: Fut) -> (StageRecord, Result<T>)
where
    Fut: Future<Output = Result<T>>,
{
    events.stage(STAGE_STARTED, name, json!({}));
    let start = Instant::now();
    let result = stage.await;
    let duration_ms = elapsed_ms(start);

    let (status, error) = match result {
        Ok(_) => {
            events.stage(STAGE_COMPLETED, name, json!({ "duration_ms": duration_ms }));
            (StageStatus::Ok, None)
        }
        Err(ref e) if e.is_cancellation() => {
            events.stage(STAGE_CANCELLED, name, json!({ "reason": e.to_string() }));
            (StageStatus::Cancel, Some(e.to_string()))
        }
        Err(ref e) => {
            events.stage(
                STAGE_FAILED,
                name,
                json!({
                    "error": e.to_string(),
                    "code": e.code(),
                    "duration_ms": duration_ms,
                }),
            );
            (StageStatus::Fail, Some(e.to_string()))
        }
    };

    let record = StageRecord {
        name: name.to_string(),
        status,
        duration_ms,
        error,
    };
    (record, result)
}

/// Records a stage that did not apply to this run.
pub fn skipped(events: &RunEvents, name: &str, reason: &str) -> StageRecord {
    events.stage(STAGE_SKIPPED, name, json!({ "reason": reason }));
    StageRecord {
        name: name.to_string(),
        status: StageStatus::Skip,
        duration_ms: 0.0,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReleaseflowError;
    use crate::events::CollectingEventSink;

    #[tokio::test]
    async fn test_tracked_records_outcomes() {
        let sink = Arc::new(CollectingEventSink::new());
        let events = RunEvents::new(sink.clone(), "run", "main");

        let (record, result) = tracked(&events, "ok", async { Ok(7) }).await;
        assert_eq!(record.status, StageStatus::Ok);
        assert_eq!(result.unwrap(), 7);

        let (record, _) = tracked::<(), _>(&events, "bad", async {
            Err(ReleaseflowError::config("broken"))
        })
        .await;
        assert_eq!(record.status, StageStatus::Fail);

        let (record, _) = tracked::<(), _>(&events, "stopped", async {
            Err(ReleaseflowError::Cancelled {
                reason: "sibling".to_string(),
            })
        })
        .await;
        assert_eq!(record.status, StageStatus::Cancel);

        let record = skipped(&events, SIGN_STAGE, "feature branch");
        assert_eq!(record.status, StageStatus::Skip);

        assert_eq!(
            sink.event_types(),
            vec![
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.failed",
                "stage.started",
                "stage.cancelled",
                "stage.skipped",
            ]
        );
        assert_eq!(sink.payloads(STAGE_FAILED)[0]["code"], "CONFIG");
    }
}
