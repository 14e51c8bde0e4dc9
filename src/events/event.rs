//! # Lifecycle events emitted by the supervisor.
//!
//! [`EventKind`] classifies events into:
//! - **Lifecycle events**: a task attempt starting, becoming ready, stopping or failing
//! - **Shutdown events**: group/task shutdown requests and per-task signal delivery
//! - **Registry events**: registration, permanent failure, removal
//!
//! Each event has a process-wide sequence number (`seq`) that increases
//! monotonically; use it to restore order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use groupvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_task("worker")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(400))
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.task.as_deref(), Some("worker"));
//! assert_eq!(ev.delay_ms, Some(400));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Group-wide shutdown requested (explicit call, external cancellation,
    /// OS signal or a fatal task failure).
    ShutdownRequested,

    /// Shutdown requested for a single task.
    ///
    /// Sets `task`.
    TaskShutdownRequested,

    /// The task's shutdown signal was delivered (no running dependents left).
    ///
    /// Sets `task`, `attempt`.
    ShutdownSignaled,

    // === Task lifecycle events ===
    /// Task was added to the registry.
    ///
    /// Sets `task`.
    TaskRegistered,

    /// A launch attempt is about to run the task body.
    ///
    /// Sets `task`, `attempt` (1-based, per task).
    TaskStarting,

    /// Task declared itself ready for dependents.
    ///
    /// Sets `task`, `attempt`.
    TaskReady,

    /// Task body returned successfully (or with `Canceled`); the task is finished.
    ///
    /// Sets `task`, `attempt`.
    TaskStopped,

    /// Task attempt failed and will be relaunched.
    ///
    /// Sets `task`, `attempt`, `reason`.
    TaskFailed,

    /// Next launch of a retrying task was scheduled.
    ///
    /// Sets `task`, `attempt` (the failed one), `delay_ms`, `reason`.
    BackoffScheduled,

    // === Registry events ===
    /// Task failed permanently and was recorded as a failure.
    ///
    /// Sets `task`, `attempt`, `reason`.
    TaskDead,

    /// Task was removed from the registry.
    ///
    /// Sets `task`.
    TaskRemoved,
}

/// Lifecycle event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
