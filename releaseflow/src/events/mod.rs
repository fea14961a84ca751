//! Pipeline lifecycle events.
//!
//! Every stage transition of a run is reported through an [`EventSink`] in
//! addition to the tracing log, so CI integrations and tests can observe a
//! run without scraping log output.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde_json::{json, Value};
use std::sync::Arc;

/// A run began.
pub const RUN_STARTED: &str = "run.started";
/// A stage began.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage finished successfully.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// A stage was stopped because the run failed elsewhere.
pub const STAGE_CANCELLED: &str = "stage.cancelled";
/// A stage did not apply to this run.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// The release gate was evaluated.
pub const GATE_EVALUATED: &str = "gate.evaluated";
/// The release tool was invoked successfully.
pub const RELEASE_PUBLISHED: &str = "release.published";
/// A run finished without error.
pub const RUN_COMPLETED: &str = "run.completed";
/// A run finished with an error.
pub const RUN_FAILED: &str = "run.failed";

/// Emits events stamped with the run they belong to.
#[derive(Debug, Clone)]
pub struct RunEvents {
    sink: Arc<dyn EventSink>,
    run_id: String,
    branch: String,
}

impl RunEvents {
    /// Creates an emitter for one run.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, run_id: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            sink,
            run_id: run_id.into(),
            branch: branch.into(),
        }
    }

    /// Emits `event_type`, merging `run_id`, `branch` and `timestamp` into
    /// the payload object.
    pub fn emit(&self, event_type: &str, data: Value) {
        let mut payload = json!({
            "run_id": self.run_id,
            "branch": self.branch,
            "timestamp": crate::utils::iso_timestamp(),
        });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), data) {
            target.extend(extra);
        }
        self.sink.try_emit(event_type, Some(payload));
    }

    /// Emits a stage event.
    pub fn stage(&self, event_type: &str, stage: &str, data: Value) {
        let mut payload = json!({ "stage": stage });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), data) {
            target.extend(extra);
        }
        self.emit(event_type, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_events_stamp_payload() {
        let sink = Arc::new(CollectingEventSink::new());
        let events = RunEvents::new(sink.clone(), "run-1", "main");

        events.stage(STAGE_FAILED, "build:macos-arm64", json!({"error": "boom"}));

        let recorded = sink.events();
        assert_eq!(recorded.len(), 1);
        let (event_type, data) = &recorded[0];
        let data = data.as_ref().unwrap();
        assert_eq!(event_type, STAGE_FAILED);
        assert_eq!(data["run_id"], "run-1");
        assert_eq!(data["branch"], "main");
        assert_eq!(data["stage"], "build:macos-arm64");
        assert_eq!(data["error"], "boom");
        assert!(data["timestamp"].is_string());
    }

    #[test]
    fn test_non_object_data_is_ignored() {
        let sink = Arc::new(CollectingEventSink::new());
        RunEvents::new(sink.clone(), "run-1", "main").emit(RUN_STARTED, Value::Null);
        assert_eq!(sink.payloads(RUN_STARTED)[0]["branch"], "main");
    }
}
