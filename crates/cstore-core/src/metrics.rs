//! Fire-and-forget metric events emitted by the content store.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

/// Metric names.
pub mod names {
    /// Latency of `load_content` / `load_content_by_prefix`.
    pub const LOAD_TIME: &str = "content_storage.load_time";
    /// Latency of `load_all_content_keys`.
    pub const LOAD_KEYS_TIME: &str = "content_storage.load_keys_time";
    /// Number of stored keys, recorded on a successful key load.
    pub const COUNT: &str = "content_storage.count";
    /// Number of operations in each committed mutation.
    pub const COMMIT_MUTATION_COUNT: &str = "content_storage.commit_mutation_count";
    /// Time from mutation creation to successful commit.
    pub const OPERATION_COMMIT_TIME: &str = "content_storage.operation_commit_time";
}

/// Destination for metric events.
pub trait MetricsSink {
    fn record_time(&self, name: &'static str, elapsed: Duration);
    fn record_count(&self, name: &'static str, count: u64);
}

/// Emits every metric as a `tracing` debug event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record_time(&self, name: &'static str, elapsed: Duration) {
        debug!(metric = name, elapsed_us = elapsed.as_micros() as u64, "timing");
    }

    fn record_count(&self, name: &'static str, count: u64) {
        debug!(metric = name, count, "count");
    }
}

/// A recorded metric event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricEvent {
    Time { name: &'static str, elapsed: Duration },
    Count { name: &'static str, count: u64 },
}

impl MetricEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Time { name, .. } | Self::Count { name, .. } => name,
        }
    }
}

/// Keeps metric events in memory. Clones share the same event list.
#[derive(Clone, Debug, Default)]
pub struct RecordingMetrics {
    events: Rc<RefCell<Vec<MetricEvent>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, oldest first.
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.borrow().clone()
    }

    /// Values of every count recorded under `name`.
    pub fn counts(&self, name: &str) -> Vec<u64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                MetricEvent::Count { name: n, count } if *n == name => Some(*count),
                _ => None,
            })
            .collect()
    }

    /// Number of timings recorded under `name`.
    pub fn timings(&self, name: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, MetricEvent::Time { name: n, .. } if *n == name))
            .count()
    }
}

impl MetricsSink for RecordingMetrics {
    fn record_time(&self, name: &'static str, elapsed: Duration) {
        self.events
            .borrow_mut()
            .push(MetricEvent::Time { name, elapsed });
    }

    fn record_count(&self, name: &'static str, count: u64) {
        self.events
            .borrow_mut()
            .push(MetricEvent::Count { name, count });
    }
}
