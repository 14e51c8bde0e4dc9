//! # Task abstraction.
//!
//! A task receives a fresh [`Handle`] for every launch attempt. The handle is
//! how the body declares readiness, observes its shutdown signal and logs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Handle;
use crate::error::TaskError;

/// Shared reference to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Supervised asynchronous unit of work.
///
/// A `Task` has a stable [`name`](Task::name) and an async [`run`](Task::run)
/// method. Implementors should call [`Handle::ready`] once they can serve
/// dependents, and return promptly after [`Handle::shutdown_signal`] resolves.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use groupvisor::{Handle, Task, TaskError};
///
/// struct Listener;
///
/// #[async_trait]
/// impl Task for Listener {
///     fn name(&self) -> &str { "listener" }
///
///     async fn run(&self, handle: Handle) -> Result<(), TaskError> {
///         handle.ready();
///         handle.shutdown_signal().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes one attempt of the task until completion or shutdown.
    async fn run(&self, handle: Handle) -> Result<(), TaskError>;
}
