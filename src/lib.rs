//! # groupvisor
//!
//! **Groupvisor** supervises a dynamic group of named, interdependent async
//! tasks: dependency-ordered startup, dependency-respecting graceful shutdown,
//! retry with exponential backoff, and panic containment.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   TaskSpec   │   │   TaskSpec   │   │   TaskSpec   │
//!     │  "db" []     │   │ "api" [db]   │   │"worker" [api]│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Mutex<Registry> (order, tasks, shutdown flag, failures)        │
//! │  - Notify (wakes the run loop on every state change)              │
//! │  - Bus (broadcast lifecycle events) ──► SubscriberSet             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   run_attempt         run_attempt        run_attempt     (one tokio task per attempt)
//!   Handle{db,#1}       Handle{api,#1}     Handle{worker,#1}
//! ```
//!
//! ### Lifecycle
//! ```text
//! register ──► Waiting ──(all deps ready)──► launch ──► body runs ──► ready()
//!                 ▲                                         │
//!                 │               Err + retry               ▼
//!                 └──── backoff (100ms → ×2 → 3s cap) ◄── returns
//!                                                           │
//!               Ok / Canceled ──► removed                   │
//!               Err, no retry ──► removed + Failure + group shutdown
//!
//! shutdown: a task's signal fires only once none of its dependents is running,
//!           so the group stops in reverse dependency order.
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                      |
//! |-------------------|--------------------------------------------------------------|-----------------------------------------|
//! | **Supervision**   | Register tasks, run the group, request shutdown.             | [`Supervisor`], [`SupervisorConfig`]    |
//! | **Tasks**         | Define tasks as functions or trait objects.                  | [`Task`], [`TaskFn`], [`TaskSpec`]      |
//! | **Execution**     | Readiness, shutdown signal, child tasks, bounded waits.      | [`Handle`]                              |
//! | **Policies**      | Retry delays.                                                | [`BackoffPolicy`], [`JitterPolicy`]     |
//! | **Errors**        | Typed task errors and terminal failures.                     | [`TaskError`], [`Failure`]              |
//! | **Events**        | Lifecycle events for logging/metrics.                        | [`Event`], [`Subscribe`]                |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber rendering events through `tracing`.
//!
//! ## Limitations
//! - Dependency cycles are not detected; tasks in a cycle never start.
//! - A task that ignores its shutdown signal blocks group shutdown forever.
//!
//! ## Example
//! ```rust
//! use groupvisor::{Handle, Supervisor, TaskError};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let failures = Supervisor::run_one("hello", |h: Handle| async move {
//!         h.log("hello from a supervised task");
//!         Ok::<(), TaskError>(())
//!     })
//!     .await;
//!     assert!(failures.is_empty());
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{
    Handle, Supervisor, SupervisorBuilder, SupervisorConfig, TaskState, TaskStatus,
};
pub use crate::error::{Failure, TaskError};
pub use crate::events::{Bus, Event, EventKind};
pub use crate::policies::{BackoffPolicy, JitterPolicy};
pub use crate::subscribers::{Subscribe, SubscriberSet};
pub use crate::tasks::{Task, TaskFn, TaskRef, TaskSpec, TaskSpecBuilder};

#[cfg(feature = "logging")]
pub use crate::subscribers::LogWriter;
