//! # Task specification for supervised execution.
//!
//! [`TaskSpec`] describes how a task joins a group: its dependencies, whether
//! failures are retried, and an optional backoff override.
//!
//! Specs are built with [`TaskSpec::builder`].
//!
//! Dependencies may name tasks that are not registered yet; the task simply
//! stays un-launched until every dependency is registered and ready.

use std::borrow::Cow;
use std::future::Future;

use crate::core::Handle;
use crate::error::TaskError;
use crate::policies::BackoffPolicy;
use crate::tasks::{TaskFn, TaskRef};

/// Specification for running a task under supervision.
///
/// ## Example
/// ```rust
/// use groupvisor::{Handle, TaskError, TaskSpec};
///
/// let api = TaskSpec::builder("api")
///     .depends_on(["db"])
///     .retry(true)
///     .build(|handle: Handle| async move {
///         handle.ready();
///         handle.shutdown_signal().await;
///         Ok::<(), TaskError>(())
///     });
///
/// assert_eq!(api.name(), "api");
/// assert_eq!(api.deps(), ["db".to_string()]);
/// assert!(api.retry());
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    deps: Vec<String>,
    retry: bool,
    backoff: Option<BackoffPolicy>,
}

impl TaskSpec {
    /// Creates a builder for constructing a spec with fluent API.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> TaskSpecBuilder {
        TaskSpecBuilder::new(name)
    }

    /// Returns reference to the task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the task name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Names of the tasks that must be ready before this one launches.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Whether failures are retried (`true`) or fatal to the group (`false`).
    pub fn retry(&self) -> bool {
        self.retry
    }

    /// Per-task backoff override, if any.
    pub fn backoff(&self) -> Option<BackoffPolicy> {
        self.backoff
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name())
            .field("deps", &self.deps)
            .field("retry", &self.retry)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Builder for [`TaskSpec`].
#[derive(Clone, Debug)]
pub struct TaskSpecBuilder {
    name: Cow<'static, str>,
    deps: Vec<String>,
    retry: bool,
    backoff: Option<BackoffPolicy>,
}

impl TaskSpecBuilder {
    /// Creates a new builder with the given task name (no deps, no retry).
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            retry: false,
            backoff: None,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Build a spec from a closure.
    pub fn build<F, Fut>(self, f: F) -> TaskSpec
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let task: TaskRef = TaskFn::arc(self.name.clone(), f);
        self.build_from_task(task)
    }

    /// Build a spec from an existing task; the task's own name wins.
    pub fn build_from_task(self, task: TaskRef) -> TaskSpec {
        TaskSpec {
            task,
            deps: self.deps,
            retry: self.retry,
            backoff: self.backoff,
        }
    }
}
