//! # Task registry and reconciliation.
//!
//! [`Registry`] is the whole mutable state of one group. It is only ever
//! touched under the supervisor's single mutex; every mutation that can change
//! the outcome of [`Registry::reconcile`] is followed by a wake-up of the run loop.
//!
//! ## Reconciliation (registration order)
//! ```text
//! for task in order:
//!   done                              ─► remove
//!   stop requested (task or group):
//!     ├─ running, not yet signaled    ─► signal if no running dependents, else wait
//!     ├─ running, already signaled    ─► wait for it to exit
//!     └─ not running                  ─► finished ─► remove
//!   otherwise, not running:
//!     └─ every dep registered+ready   ─► launch (new attempt, new token)
//! ```
//!
//! ## Completion
//! ```text
//! Ok / Canceled                 ─► finished
//! Err, retry, no stop requested ─► failures += 1, delay = backoff.next(failures-1), relaunch later
//! Err, retry, stop requested    ─► finished, recorded as failure, group shutdown
//! Err, no retry                 ─► finished, recorded as failure, group shutdown
//! ```
//!
//! A retrying task stopped during its backoff pause still holds the error of
//! its last attempt; that error is terminal too.
//!
//! ## Rules
//! - Names are unique among live tasks; removed names may be registered again.
//! - Attempts are identified by a registry-wide id, so a stale handle can never
//!   mark a newer attempt ready or complete it.
//! - Dependency cycles are not detected: tasks in a cycle never launch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Failure, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::tasks::{TaskRef, TaskSpec};

/// Coarse state of a live task, as reported by [`Supervisor::status`](crate::Supervisor::status).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Not running: waiting for dependencies (or for the next reconciliation pass).
    Waiting,
    /// Launched, pausing before relaunch after a failure.
    Backoff,
    /// Body is running and has not declared readiness.
    Running,
    /// Body is running and ready for dependents.
    Ready,
    /// Shutdown signal delivered; waiting for the body to return.
    Stopping,
}

/// Point-in-time view of one live task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskStatus {
    /// Task name.
    pub name: String,
    /// Current state.
    pub state: TaskState,
    /// Declared dependencies.
    pub deps: Vec<String>,
    /// Number of launch attempts so far.
    pub attempts: u32,
    /// Number of consecutive failures so far.
    pub failures: u32,
}

/// How an attempt ended.
pub(crate) enum Outcome {
    /// The body ran and returned (panics already converted).
    Ran(Result<(), TaskError>),
    /// Shutdown arrived during the backoff pause; the body never ran.
    Interrupted,
}

/// Everything the supervisor needs to start one attempt outside the lock.
pub(crate) struct Launch {
    pub(crate) name: Arc<str>,
    pub(crate) task: TaskRef,
    pub(crate) id: u64,
    pub(crate) attempt: u32,
    pub(crate) token: CancellationToken,
    pub(crate) children: Arc<AtomicU64>,
    pub(crate) delay: Duration,
}

struct Attempt {
    id: u64,
    number: u32,
    token: CancellationToken,
    started: bool,
    ready: bool,
    signaled: bool,
}

struct Entry {
    task: TaskRef,
    deps: Vec<String>,
    retry: bool,
    backoff: BackoffPolicy,
    stop_requested: bool,
    done: bool,
    last_error: Option<TaskError>,
    current: Option<Attempt>,
    attempts: u32,
    failures: u32,
    delay: Duration,
    children: Arc<AtomicU64>,
}

impl Entry {
    fn is_ready(&self) -> bool {
        self.current.as_ref().is_some_and(|a| a.ready)
    }
}

enum Verdict {
    Finished,
    Retry(TaskError),
    Dead(TaskError),
}

/// Mutable state of one supervised group.
pub(crate) struct Registry {
    order: Vec<Arc<str>>,
    tasks: HashMap<Arc<str>, Entry>,
    shutdown: bool,
    failures: Vec<Failure>,
    next_attempt_id: u64,
    default_backoff: BackoffPolicy,
}

impl Registry {
    pub(crate) fn new(default_backoff: BackoffPolicy) -> Self {
        Self {
            order: Vec::new(),
            tasks: HashMap::new(),
            shutdown: false,
            failures: Vec::new(),
            next_attempt_id: 1,
            default_backoff,
        }
    }

    /// Inserts a task; returns `false` (and changes nothing) if the name is live.
    pub(crate) fn insert(&mut self, spec: TaskSpec, bus: &Bus) -> bool {
        let name: Arc<str> = Arc::from(spec.name());
        if self.tasks.contains_key(&name) {
            return false;
        }

        let entry = Entry {
            task: spec.task().clone(),
            deps: spec.deps().to_vec(),
            retry: spec.retry(),
            backoff: spec.backoff().unwrap_or(self.default_backoff),
            stop_requested: false,
            done: false,
            last_error: None,
            current: None,
            attempts: 0,
            failures: 0,
            delay: Duration::ZERO,
            children: Arc::new(AtomicU64::new(0)),
        };
        self.order.push(name.clone());
        self.tasks.insert(name.clone(), entry);
        bus.publish(Event::new(EventKind::TaskRegistered).with_task(name));
        true
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Sets the group shutdown flag; returns `true` if it was not set before.
    pub(crate) fn request_shutdown(&mut self, bus: &Bus) -> bool {
        if self.shutdown {
            return false;
        }
        self.shutdown = true;
        bus.publish(Event::new(EventKind::ShutdownRequested));
        true
    }

    /// Requests shutdown of one task; returns `false` if the name is not live.
    pub(crate) fn request_task_shutdown(&mut self, name: &str, bus: &Bus) -> bool {
        let Some(entry) = self.tasks.get_mut(name) else {
            return false;
        };
        if !entry.stop_requested {
            entry.stop_requested = true;
            bus.publish(Event::new(EventKind::TaskShutdownRequested).with_task(name));
        }
        true
    }

    /// Marks attempt `id` of `name` ready; returns `true` if this changed anything.
    pub(crate) fn set_ready(&mut self, name: &str, id: u64, bus: &Bus) -> bool {
        let Some(attempt) = self.attempt_mut(name, id) else {
            return false;
        };
        if attempt.ready {
            return false;
        }
        attempt.ready = true;
        let number = attempt.number;
        bus.publish(
            Event::new(EventKind::TaskReady)
                .with_task(name)
                .with_attempt(number),
        );
        true
    }

    /// Records that attempt `id` finished its backoff pause and is entering the body.
    pub(crate) fn mark_started(&mut self, name: &str, id: u64, bus: &Bus) {
        if let Some(attempt) = self.attempt_mut(name, id) {
            attempt.started = true;
            let number = attempt.number;
            bus.publish(
                Event::new(EventKind::TaskStarting)
                    .with_task(name)
                    .with_attempt(number),
            );
        }
    }

    /// Whether attempt `id` of `name` is the live one and is ready.
    pub(crate) fn attempt_ready(&self, name: &str, id: u64) -> bool {
        self.tasks
            .get(name)
            .and_then(|e| e.current.as_ref())
            .is_some_and(|a| a.id == id && a.ready)
    }

    /// One reconciliation pass; returns the attempts to start.
    pub(crate) fn reconcile(&mut self, bus: &Bus) -> Vec<Launch> {
        let mut launches = Vec::new();
        let mut removed: Vec<Arc<str>> = Vec::new();

        for i in 0..self.order.len() {
            let name = self.order[i].clone();
            let Some(entry) = self.tasks.get(&name) else {
                continue;
            };
            if entry.done {
                removed.push(name);
                continue;
            }

            if entry.stop_requested || self.shutdown {
                match entry.current.as_ref().map(|a| a.signaled) {
                    Some(false) => {
                        if !self.has_running_dependents(&name) {
                            self.signal(&name, bus);
                        }
                    }
                    Some(true) => {}
                    None => {
                        self.finish_idle(&name, bus);
                        removed.push(name);
                    }
                }
            } else if entry.current.is_none() && self.deps_ready(entry) {
                launches.extend(self.launch(&name));
            }
        }

        if !removed.is_empty() {
            for name in &removed {
                self.tasks.remove(name);
                bus.publish(Event::new(EventKind::TaskRemoved).with_task(name.clone()));
            }
            self.order.retain(|n| !removed.contains(n));
        }
        launches
    }

    /// Applies the outcome of attempt `id` of `name`.
    ///
    /// Returns `false` if the attempt is not the live one (already completed or stale).
    pub(crate) fn complete(&mut self, name: &str, id: u64, outcome: Outcome, bus: &Bus) -> bool {
        let group_shutdown = self.shutdown;
        let Some(entry) = self.tasks.get_mut(name) else {
            return false;
        };
        let Some(attempt) = entry.current.take_if(|a| a.id == id) else {
            return false;
        };

        let result = match outcome {
            Outcome::Ran(result) => {
                entry.last_error = None;
                result
            }
            Outcome::Interrupted => entry.last_error.take().map_or(Ok(()), Err),
        };

        let verdict = match result {
            Ok(()) | Err(TaskError::Canceled) => Verdict::Finished,
            Err(error) if entry.retry && !(entry.stop_requested || group_shutdown) => {
                Verdict::Retry(error)
            }
            Err(error) => Verdict::Dead(error),
        };

        match verdict {
            Verdict::Finished => {
                entry.done = true;
                tracing::debug!(task = name, attempt = attempt.number, "task finished");
                bus.publish(
                    Event::new(EventKind::TaskStopped)
                        .with_task(name)
                        .with_attempt(attempt.number),
                );
            }
            Verdict::Retry(error) => {
                entry.failures += 1;
                entry.delay = entry.backoff.next(entry.failures - 1);
                let reason = error.to_string();
                tracing::warn!(
                    task = name,
                    attempt = attempt.number,
                    delay_ms = entry.delay.as_millis() as u64,
                    error = %reason,
                    "task failed, relaunching after backoff"
                );
                bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(name)
                        .with_attempt(attempt.number)
                        .with_reason(reason.as_str()),
                );
                bus.publish(
                    Event::new(EventKind::BackoffScheduled)
                        .with_task(name)
                        .with_attempt(attempt.number)
                        .with_delay(entry.delay)
                        .with_reason(reason),
                );
                entry.last_error = Some(error);
            }
            Verdict::Dead(error) => {
                entry.done = true;
                self.record_failure(name, Some(attempt.number), error, bus);
            }
        }
        true
    }

    /// Drains the failure list and clears the group shutdown flag.
    pub(crate) fn finish_run(&mut self) -> Vec<Failure> {
        self.shutdown = false;
        std::mem::take(&mut self.failures)
    }

    /// Live task names in registration order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.order.iter().map(|n| n.to_string()).collect()
    }

    pub(crate) fn is_ready(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(Entry::is_ready)
    }

    pub(crate) fn is_running(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(|e| e.current.is_some())
    }

    pub(crate) fn status(&self) -> Vec<TaskStatus> {
        self.order
            .iter()
            .filter_map(|name| {
                let e = self.tasks.get(name)?;
                let state = match &e.current {
                    None => TaskState::Waiting,
                    Some(a) if a.signaled => TaskState::Stopping,
                    Some(a) if !a.started => TaskState::Backoff,
                    Some(a) if a.ready => TaskState::Ready,
                    Some(_) => TaskState::Running,
                };
                Some(TaskStatus {
                    name: name.to_string(),
                    state,
                    deps: e.deps.clone(),
                    attempts: e.attempts,
                    failures: e.failures,
                })
            })
            .collect()
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn attempt_mut(&mut self, name: &str, id: u64) -> Option<&mut Attempt> {
        self.tasks
            .get_mut(name)?
            .current
            .as_mut()
            .filter(|a| a.id == id)
    }

    fn deps_ready(&self, entry: &Entry) -> bool {
        entry
            .deps
            .iter()
            .all(|dep| self.tasks.get(dep.as_str()).is_some_and(Entry::is_ready))
    }

    fn has_running_dependents(&self, name: &str) -> bool {
        self.tasks
            .values()
            .any(|e| e.current.is_some() && e.deps.iter().any(|d| d.as_str() == name))
    }

    fn signal(&mut self, name: &str, bus: &Bus) {
        let Some(attempt) = self.tasks.get_mut(name).and_then(|e| e.current.as_mut()) else {
            return;
        };
        attempt.signaled = true;
        attempt.token.cancel();
        tracing::debug!(task = name, attempt = attempt.number, "shutdown signaled");
        bus.publish(
            Event::new(EventKind::ShutdownSignaled)
                .with_task(name)
                .with_attempt(attempt.number),
        );
    }

    /// Finishes a task that is not running; a pending failure is recorded (and is terminal).
    fn finish_idle(&mut self, name: &str, bus: &Bus) {
        let Some(entry) = self.tasks.get_mut(name) else {
            return;
        };
        entry.done = true;
        if let Some(error) = entry.last_error.take() {
            let attempt = (entry.attempts > 0).then_some(entry.attempts);
            self.record_failure(name, attempt, error, bus);
        }
    }

    /// Records a terminal failure and requests group shutdown.
    fn record_failure(&mut self, name: &str, attempt: Option<u32>, error: TaskError, bus: &Bus) {
        tracing::error!(task = name, error = %error, "task failed permanently");
        let mut ev = Event::new(EventKind::TaskDead)
            .with_task(name)
            .with_reason(error.to_string());
        if let Some(n) = attempt {
            ev = ev.with_attempt(n);
        }
        bus.publish(ev);
        self.failures.push(Failure {
            task: name.to_string(),
            error,
        });
        self.request_shutdown(bus);
    }

    fn launch(&mut self, name: &Arc<str>) -> Option<Launch> {
        let entry = self.tasks.get_mut(name)?;
        let id = self.next_attempt_id;
        self.next_attempt_id += 1;
        entry.attempts += 1;
        let token = CancellationToken::new();
        entry.current = Some(Attempt {
            id,
            number: entry.attempts,
            token: token.clone(),
            started: false,
            ready: false,
            signaled: false,
        });
        tracing::debug!(task = &**name, attempt = entry.attempts, "launching");

        Some(Launch {
            name: name.clone(),
            task: entry.task.clone(),
            id,
            attempt: entry.attempts,
            token,
            children: entry.children.clone(),
            delay: entry.delay,
        })
    }
}
