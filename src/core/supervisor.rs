//! # Supervisor: owns a group of interdependent tasks and drives them.
//!
//! The [`Supervisor`] holds the [`Registry`] behind a single mutex, paired with a
//! [`Notify`] that plays the role of a condition variable: every state change
//! (registration, readiness, completion, shutdown request) wakes the run loop,
//! which then reconciles the whole registry in one pass.
//!
//! ## High-level architecture
//! ```text
//! register(spec) ─┐
//! shutdown()     ─┤                      ┌──────────────── run_until(cancel) ────────────────┐
//! handle.ready() ─┼─► lock ─► mutate ─► wake ─► loop {                                        │
//! completion     ─┘                      │        lock ─► reconcile() ─► Vec<Launch>          │
//!                                        │        empty registry? ─► break                    │
//!                                        │        spawn runner::run_attempt per launch        │
//!                                        │        select! { wake | tick | cancel | signal }   │
//!                                        │      }                                             │
//!                                        └─► Vec<Failure> ────────────────────────────────────┘
//!
//! Event flow:
//!   Registry / runner ── publish(Event) ──► Bus ──► forwarder ──► SubscriberSet::emit(&Event)
//! ```
//!
//! ## Rules
//! - One coarse lock; reconciliation is cheap and the graph is small (tens of tasks).
//! - The lock is never held across an `.await`.
//! - The tick (default 1s) is a fallback wake-up only; it bounds how long a
//!   change without an explicit wake can go unnoticed.
//! - Only one `run` per supervisor at a time.
//!
//! ## Example
//! ```rust
//! use groupvisor::{Handle, Supervisor, SupervisorConfig, TaskError, TaskSpec};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let sup = Supervisor::new(SupervisorConfig::default());
//!
//!     sup.register(TaskSpec::builder("db").build(|h: Handle| async move {
//!         h.ready();
//!         h.shutdown_signal().await;
//!         Ok::<(), TaskError>(())
//!     }));
//!     sup.register(TaskSpec::builder("api").depends_on(["db"]).build(|h: Handle| async move {
//!         h.ready();
//!         // Serve until told to stop, then end the whole group.
//!         h.supervisor().shutdown();
//!         h.shutdown_signal().await;
//!         Ok::<(), TaskError>(())
//!     }));
//!
//!     let failures = sup.run().await;
//!     assert!(failures.is_empty());
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::handle::Handle;
use crate::core::registry::{Launch, Outcome, Registry, TaskStatus};
use crate::core::{runner, shutdown};
use crate::error::{Failure, TaskError};
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::TaskSpec;

/// Coordinates one group of interdependent tasks.
///
/// Cheap to clone; all clones (and all task handles) refer to the same group.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Shared>,
}

struct Shared {
    cfg: SupervisorConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    state: Mutex<Registry>,
    wake: Notify,
}

impl Supervisor {
    /// Creates a supervisor without subscribers.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self::builder(cfg).build()
    }

    /// Creates a builder for a supervisor with subscribers.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: SupervisorConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let state = Mutex::new(Registry::new(cfg.backoff));
        Self {
            inner: Arc::new(Shared {
                cfg,
                bus,
                subscribers,
                state,
                wake: Notify::new(),
            }),
        }
    }

    /// Runs a single function under supervision until it returns.
    ///
    /// The task has no dependencies and retry disabled.
    pub async fn run_one<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Vec<Failure>
    where
        F: Fn(Handle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let sup = Supervisor::new(SupervisorConfig::default());
        sup.register(TaskSpec::builder(name).build(f));
        sup.run().await
    }

    /// Event bus of this group; subscribe to observe lifecycle events directly.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Adds a task to the group. Can be called before or during [`run`](Self::run).
    ///
    /// # Panics
    /// If a live task with the same name is already registered.
    pub fn register(&self, spec: TaskSpec) {
        let name = spec.name().to_string();
        let inserted = self.lock().insert(spec, &self.inner.bus);
        if !inserted {
            panic!("task {name:?} is already registered");
        }
        self.inner.wake.notify_one();
    }

    /// Requests graceful shutdown of the whole group. Idempotent.
    ///
    /// Tasks are signaled in reverse dependency order: a task is only signaled
    /// once none of its dependents is still running.
    pub fn shutdown(&self) {
        if self.lock().request_shutdown(&self.inner.bus) {
            tracing::info!("group shutdown requested");
        }
        self.inner.wake.notify_one();
    }

    /// Requests shutdown of one task; deferred while its dependents are running.
    ///
    /// Returns `false` if no live task has this name.
    pub fn shutdown_task(&self, name: &str) -> bool {
        let found = self.lock().request_task_shutdown(name, &self.inner.bus);
        self.inner.wake.notify_one();
        found
    }

    /// Live task names in registration order.
    pub fn list_tasks(&self) -> Vec<String> {
        self.lock().names()
    }

    /// Snapshot of every live task, in registration order.
    pub fn status(&self) -> Vec<TaskStatus> {
        self.lock().status()
    }

    /// Whether `name` is live and its current attempt declared readiness.
    pub fn is_ready(&self, name: &str) -> bool {
        self.lock().is_ready(name)
    }

    /// Whether `name` is live and has a current attempt.
    pub fn is_running(&self, name: &str) -> bool {
        self.lock().is_running(name)
    }

    /// Runs until the registry is empty and returns the terminal failures.
    pub async fn run(&self) -> Vec<Failure> {
        self.run_until(CancellationToken::new()).await
    }

    /// Like [`run`](Self::run); cancelling `cancel` requests group shutdown.
    pub async fn run_until(&self, cancel: CancellationToken) -> Vec<Failure> {
        let forwarder = self.spawn_forwarder();
        let signals = self
            .inner
            .cfg
            .handle_os_signals
            .then(|| self.spawn_signal_listener());

        let mut tick = tokio::time::interval(self.inner.cfg.tick_period());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancel_seen = false;

        loop {
            let launches = {
                let mut reg = self.lock();
                let launches = reg.reconcile(&self.inner.bus);
                if reg.is_empty() {
                    break;
                }
                launches
            };
            for launch in launches {
                self.spawn_attempt(launch);
            }

            tokio::select! {
                _ = self.inner.wake.notified() => {}
                _ = tick.tick() => {}
                _ = cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    self.shutdown();
                }
            }
        }

        let failures = self.lock().finish_run();
        if let Some(listener) = signals {
            listener.abort();
        }
        if let Some((stop, join)) = forwarder {
            stop.cancel();
            let _ = join.await;
        }
        tracing::debug!(failures = failures.len(), "group finished");
        failures
    }

    // ---------------------------
    // Crate-internal hooks used by handles and runners
    // ---------------------------

    /// Registers a spec under the first name from `next_name` that is not live.
    ///
    /// Picking the name and inserting happen under one lock acquisition.
    pub(crate) fn register_unique(
        &self,
        mut next_name: impl FnMut() -> String,
        make: impl FnOnce(String) -> TaskSpec,
    ) -> String {
        let name = {
            let mut reg = self.lock();
            let name = loop {
                let candidate = next_name();
                if !reg.contains(&candidate) {
                    break candidate;
                }
            };
            reg.insert(make(name.clone()), &self.inner.bus);
            name
        };
        self.inner.wake.notify_one();
        name
    }

    pub(crate) fn mark_ready(&self, name: &str, id: u64) {
        if self.lock().set_ready(name, id, &self.inner.bus) {
            self.inner.wake.notify_one();
        }
    }

    pub(crate) fn attempt_ready(&self, name: &str, id: u64) -> bool {
        self.lock().attempt_ready(name, id)
    }

    pub(crate) fn mark_started(&self, name: &str, id: u64) {
        self.lock().mark_started(name, id, &self.inner.bus);
    }

    pub(crate) fn complete(&self, name: &str, id: u64, outcome: Outcome) {
        self.lock().complete(name, id, outcome, &self.inner.bus);
        self.inner.wake.notify_one();
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_attempt(&self, launch: Launch) {
        let handle = Handle::new(self.clone(), &launch);
        tokio::spawn(runner::run_attempt(launch.task, handle, launch.delay));
    }

    /// Forwards bus events to the subscriber set until stopped, then flushes.
    fn spawn_forwarder(&self) -> Option<(CancellationToken, JoinHandle<()>)> {
        if self.inner.subscribers.is_empty() {
            return None;
        }
        let set = SubscriberSet::new(self.inner.subscribers.clone(), self.inner.bus.clone());
        let mut rx = self.inner.bus.subscribe();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event forwarder lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            set.shutdown().await;
        });
        Some((stop, join))
    }

    fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let sup = self.clone();
        tokio::spawn(async move {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(()) => {
                    tracing::info!("termination signal received");
                    sup.shutdown();
                }
                Err(error) => tracing::warn!(%error, "failed to listen for termination signals"),
            }
        })
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("cfg", &self.inner.cfg)
            .field("tasks", &self.list_tasks())
            .finish()
    }
}
