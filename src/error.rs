//! Error types used by the groupvisor runtime and tasks.
//!
//! - [`TaskError`]: errors raised by a single task attempt.
//! - [`Failure`]: a terminal task failure, as returned by [`Supervisor::run`](crate::Supervisor::run).
//!
//! [`TaskError`] provides helper methods (`as_label`, `as_message`) for logging/metrics.

use std::fmt;

use thiserror::Error;

/// # Errors produced by task execution.
///
/// Whether an error is retried is decided by the task's registration
/// ([`TaskSpec::retry`](crate::TaskSpec::retry)), not by the variant.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task body panicked; the panic was contained at the task boundary.
    #[error("panicked: {message}\n{backtrace}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
        /// Backtrace captured at the panic site.
        backtrace: String,
    },

    /// Task observed its shutdown signal and exited early.
    ///
    /// Treated exactly like `Ok(())` by the supervisor.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use groupvisor::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use groupvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a one-line human-readable message (without backtrace).
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { message, .. } => format!("panic: {message}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// True for [`TaskError::Panicked`].
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }
}

/// A task that failed permanently.
///
/// Collected by the supervisor and handed back from [`Supervisor::run`](crate::Supervisor::run).
/// A caller driving a process should treat a non-empty list as overall failure.
#[derive(Error, Debug)]
#[error("task {task:?} failed: {}", error.as_message())]
pub struct Failure {
    /// Name of the failed task.
    pub task: String,
    /// The last error the task returned.
    #[source]
    pub error: TaskError,
}
