//! # LogWriter: renders lifecycle events through `tracing`
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO groupvisor: registered task="api"
//! INFO groupvisor: starting task="api" attempt=1
//! INFO groupvisor: ready task="db" attempt=1
//! WARN groupvisor: backoff task="worker" delay_ms=200 after_attempt=2 err="execution failed: boom"
//! INFO groupvisor: shutdown-signaled task="api" attempt=1
//! ERROR groupvisor: dead task="worker" err="execution failed: boom"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ShutdownRequested => tracing::info!(target: "groupvisor", "shutdown-requested"),
            EventKind::TaskShutdownRequested => {
                tracing::info!(target: "groupvisor", task, "task-shutdown-requested")
            }
            EventKind::ShutdownSignaled => {
                tracing::info!(target: "groupvisor", task, attempt = e.attempt, "shutdown-signaled")
            }
            EventKind::TaskRegistered => tracing::info!(target: "groupvisor", task, "registered"),
            EventKind::TaskStarting => {
                tracing::info!(target: "groupvisor", task, attempt = e.attempt, "starting")
            }
            EventKind::TaskReady => {
                tracing::info!(target: "groupvisor", task, attempt = e.attempt, "ready")
            }
            EventKind::TaskStopped => {
                tracing::info!(target: "groupvisor", task, attempt = e.attempt, "stopped")
            }
            EventKind::TaskFailed => {
                tracing::warn!(target: "groupvisor", task, attempt = e.attempt, err = reason, "failed")
            }
            EventKind::BackoffScheduled => tracing::warn!(
                target: "groupvisor",
                task,
                delay_ms = e.delay_ms,
                after_attempt = e.attempt,
                err = reason,
                "backoff"
            ),
            EventKind::TaskDead => tracing::error!(target: "groupvisor", task, err = reason, "dead"),
            EventKind::TaskRemoved => tracing::info!(target: "groupvisor", task, "removed"),
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "groupvisor", subscriber = task, reason, "subscriber-overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: "groupvisor", subscriber = task, info = reason, "subscriber-panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
