//! Runtime core: registry, reconciliation and task execution.
//!
//! The public API from this module is [`Supervisor`] (with its builder and
//! config), the per-attempt [`Handle`], and the status types.
//!
//! Internal modules:
//! - [`registry`]: task map, reconciliation pass, completion bookkeeping;
//! - [`supervisor`]: lock + wake-up loop, registration, shutdown requests;
//! - [`runner`]: one launch attempt (backoff pause, panic capture, completion);
//! - [`handle`]: execution context handed to task bodies;
//! - [`panic`]: panic-to-error conversion with backtraces;
//! - [`shutdown`]: cross-platform OS termination signals.

mod builder;
mod config;
mod handle;
pub(crate) mod panic;
mod registry;
mod runner;
mod shutdown;
mod supervisor;

#[cfg(test)]
mod tests;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use handle::Handle;
pub use registry::{TaskState, TaskStatus};
pub use supervisor::Supervisor;
