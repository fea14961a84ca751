//! Event sink trait and implementations.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use tracing::{info, warn};

/// Receives pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync + Debug {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "stage.started")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without blocking. Must never fail.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes every event to the tracing log. Failures and cancellations are
/// logged at warn level, everything else at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    fn log_event(event_type: &str, data: Option<&Value>) {
        let run_id = data
            .and_then(|d| d.get("run_id"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let stage = data
            .and_then(|d| d.get("stage"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        if event_type.ends_with(".failed") || event_type.ends_with(".cancelled") {
            warn!(event_type, run_id, stage, event_data = ?data, "Event: {event_type}");
        } else {
            info!(event_type, run_id, stage, event_data = ?data, "Event: {event_type}");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        Self::log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        Self::log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Payloads of every event of exactly `event_type`.
    #[must_use]
    pub fn payloads(&self, event_type: &str) -> Vec<Value> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t == event_type)
            .map(|(_, d)| d.clone().unwrap_or(Value::Null))
            .collect()
    }

    /// Stage names carried by events of exactly `event_type`, sorted.
    #[must_use]
    pub fn stages(&self, event_type: &str) -> Vec<String> {
        let mut stages: Vec<String> = self
            .payloads(event_type)
            .iter()
            .filter_map(|p| p.get("stage").and_then(Value::as_str).map(String::from))
            .collect();
        stages.sort();
        stages
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit("run.started", None).await;
        LoggingEventSink.emit("stage.failed", Some(json!({"stage": "sign"}))).await;
        LoggingEventSink.try_emit("run.completed", None);
    }

    #[tokio::test]
    async fn test_collecting_sink_filters() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("stage.started", Some(json!({"stage": "build:b"}))).await;
        sink.try_emit("stage.started", Some(json!({"stage": "build:a"})));
        sink.try_emit("gate.evaluated", None);

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.stages("stage.started"), vec!["build:a", "build:b"]);
        assert_eq!(sink.payloads("gate.evaluated"), vec![Value::Null]);
        assert_eq!(sink.event_types()[2], "gate.evaluated");
    }
}
