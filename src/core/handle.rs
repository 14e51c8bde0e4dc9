//! # Handle: the execution context of one task attempt.
//!
//! A fresh [`Handle`] is created for every launch attempt and passed to
//! [`Task::run`](crate::Task::run). It is cheap to clone; every clone refers to
//! the same attempt.
//!
//! ```text
//! task body ──► handle.ready()              ─► registry marks attempt ready ─► wake run loop
//!           ──► handle.shutdown_signal()    ◄─ token cancelled once no running dependents remain
//!           ──► handle.spawn(f)             ─► register "<name>-<n>" (no deps, no retry)
//!           ──► handle.run(fut)             ─► Some(out) | None if shutdown came first
//!           ──► handle.log(msg)             ─► tracing INFO with task=<name>
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use crate::core::Supervisor;
use crate::core::panic;
use crate::core::registry::Launch;
use crate::error::TaskError;
use crate::tasks::TaskSpec;

/// Execution context passed to a running task.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    sup: Supervisor,
    name: Arc<str>,
    id: u64,
    attempt: u32,
    token: CancellationToken,
    children: Arc<AtomicU64>,
    span: tracing::Span,
}

impl Handle {
    pub(crate) fn new(sup: Supervisor, launch: &Launch) -> Self {
        let span = tracing::info_span!("task", name = %launch.name, attempt = launch.attempt);
        Self {
            inner: Arc::new(HandleInner {
                sup,
                name: launch.name.clone(),
                id: launch.id,
                attempt: launch.attempt,
                token: launch.token.clone(),
                children: launch.children.clone(),
                span,
            }),
        }
    }

    /// Name of the owning task.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 1-based launch counter of the owning task.
    pub fn attempt(&self) -> u32 {
        self.inner.attempt
    }

    /// The supervisor running this task.
    pub fn supervisor(&self) -> &Supervisor {
        &self.inner.sup
    }

    /// Span the task body runs in (`task{name, attempt}`).
    pub fn span(&self) -> &tracing::Span {
        &self.inner.span
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// Declares this task available to its dependents. Idempotent.
    pub fn ready(&self) {
        self.inner.sup.mark_ready(&self.inner.name, self.inner.id);
    }

    /// Whether [`ready`](Self::ready) has been called on this attempt.
    pub fn is_ready(&self) -> bool {
        self.inner
            .sup
            .attempt_ready(&self.inner.name, self.inner.id)
    }

    /// Resolves once the supervisor decided this task should shut down.
    ///
    /// Can be awaited any number of times, from any clone.
    pub async fn shutdown_signal(&self) {
        self.inner.token.cancelled().await
    }

    /// Whether the shutdown signal has been delivered.
    pub fn is_shutdown_signaled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// A token that is cancelled together with this task's shutdown signal.
    ///
    /// Cancelling the returned token does not signal the task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Registers a child task named `<name>-<n>` with no dependencies and retry disabled.
    ///
    /// Returns the child's name. The child is scheduled independently of this task.
    /// Ordinals whose name is already live in the group are skipped.
    pub fn spawn<F, Fut>(&self, f: F) -> String
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.spawn_with(Vec::<String>::new(), false, f)
    }

    /// Like [`spawn`](Self::spawn), with explicit dependencies and retry flag.
    pub fn spawn_with<I, S, F, Fut>(&self, deps: I, retry: bool, f: F) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let deps: Vec<String> = deps.into_iter().map(Into::into).collect();
        self.inner.sup.register_unique(
            || self.next_child_name(),
            move |name| {
                TaskSpec::builder(name)
                    .depends_on(deps)
                    .retry(retry)
                    .build(f)
            },
        )
    }

    /// Reserves the next child name without registering anything.
    pub fn next_child_name(&self) -> String {
        let n = self.inner.children.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.inner.name, n)
    }

    /// Runs `fut` on its own tokio task and waits for it or for shutdown.
    ///
    /// Returns `Some(output)` if `fut` finished first and `None` if the shutdown
    /// signal fired first. In the latter case `fut` keeps running detached; it is
    /// not cancelled. A panic inside `fut` is re-raised here.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let join = tokio::spawn(panic::capture(fut));
        self.race(join).await
    }

    /// Like [`run`](Self::run) for synchronous blocking work (`spawn_blocking`).
    pub async fn run_blocking<F, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let join = tokio::task::spawn_blocking(move || panic::capture_sync(f));
        self.race(join).await
    }

    /// Emits a log line tagged with this task's name.
    pub fn log(&self, msg: impl fmt::Display) {
        tracing::info!(parent: &self.inner.span, task = %self.inner.name, "{msg}");
    }

    async fn race<T>(
        &self,
        join: tokio::task::JoinHandle<Result<T, panic::CapturedPanic>>,
    ) -> Option<T> {
        tokio::select! {
            biased;
            res = join => match res {
                Ok(Ok(out)) => Some(out),
                Ok(Err(p)) => std::panic::resume_unwind(Box::new(p)),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => None,
            },
            _ = self.inner.token.cancelled() => None,
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.inner.name)
            .field("attempt", &self.inner.attempt)
            .field("signaled", &self.inner.token.is_cancelled())
            .finish()
    }
}
