//! Runtime behavior of a supervised group, driven end to end on a real runtime.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::{Handle, Supervisor, SupervisorConfig, TaskState};
use crate::error::{Failure, TaskError};
use crate::events::{Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::subscribers::Subscribe;
use crate::tasks::TaskSpec;

fn cfg() -> SupervisorConfig {
    SupervisorConfig {
        tick: Duration::from_millis(20),
        ..SupervisorConfig::default()
    }
}

async fn within<F: Future>(fut: F) -> F::Output {
    timeout(Duration::from_secs(10), fut)
        .await
        .expect("test timed out")
}

async fn until(mut cond: impl FnMut() -> bool) {
    within(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

fn start(sup: &Supervisor) -> tokio::task::JoinHandle<Vec<Failure>> {
    let sup = sup.clone();
    tokio::spawn(async move { sup.run().await })
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn contains(&self, line: &str) -> bool {
        self.0.lock().unwrap().iter().any(|l| l == line)
    }
}

/// Declares readiness, waits for the shutdown signal, then logs `"<name> stop"`.
fn service(name: &'static str, deps: &[&'static str], log: &Log) -> TaskSpec {
    let log = log.clone();
    TaskSpec::builder(name)
        .depends_on(deps.iter().copied())
        .build(move |h: Handle| {
            let log = log.clone();
            async move {
                log.push(format!("{} start", h.name()));
                h.ready();
                h.shutdown_signal().await;
                log.push(format!("{} stop", h.name()));
                Ok(())
            }
        })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependent_starts_only_after_dependency_is_ready() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    let gate = Arc::new(Notify::new());

    let (l, g) = (log.clone(), gate.clone());
    sup.register(TaskSpec::builder("db").build(move |h: Handle| {
        let (l, g) = (l.clone(), g.clone());
        async move {
            l.push("db start");
            g.notified().await;
            l.push("db ready");
            h.ready();
            h.shutdown_signal().await;
            Ok(())
        }
    }));
    let l = log.clone();
    sup.register(TaskSpec::builder("api").depends_on(["db"]).build(move |h: Handle| {
        let l = l.clone();
        async move {
            l.push("api start");
            h.supervisor().shutdown();
            h.shutdown_signal().await;
            Ok(())
        }
    }));

    let runner = start(&sup);
    until(|| log.contains("db start")).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!log.contains("api start"));
    assert!(!sup.is_running("api"));

    gate.notify_one();
    let failures = within(runner).await.unwrap();
    assert!(failures.is_empty());
    assert_eq!(log.lines(), vec!["db start", "db ready", "api start"]);
    assert!(sup.list_tasks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependency_is_not_signaled_while_dependent_is_exiting() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    let barrier = Arc::new(Notify::new());
    sup.register(service("db", &[], &log));

    let (l, b) = (log.clone(), barrier.clone());
    sup.register(TaskSpec::builder("api").depends_on(["db"]).build(move |h: Handle| {
        let (l, b) = (l.clone(), b.clone());
        async move {
            h.ready();
            h.shutdown_signal().await;
            l.push("api signaled");
            b.notified().await;
            Ok(())
        }
    }));

    let runner = start(&sup);
    until(|| sup.is_ready("api")).await;
    sup.shutdown();
    until(|| log.contains("api signaled")).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!log.contains("db stop"), "db signaled while api still running");
    assert_eq!(
        sup.status().iter().map(|s| s.state).collect::<Vec<_>>(),
        vec![TaskState::Ready, TaskState::Stopping]
    );

    barrier.notify_one();
    assert!(within(runner).await.unwrap().is_empty());
    assert!(log.contains("db stop"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_runs_in_reverse_dependency_order() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("worker", &["api"], &log));
    sup.register(service("api", &["db"], &log));

    let l = log.clone();
    sup.register(TaskSpec::builder("db").build(move |h: Handle| {
        let l = l.clone();
        async move {
            h.ready();
            h.shutdown_signal().await;
            let sup = h.supervisor();
            if sup.is_running("api") || sup.is_running("worker") {
                l.push("db signaled early");
            }
            l.push("db stop");
            Ok(())
        }
    }));

    let runner = start(&sup);
    until(|| sup.is_ready("worker")).await;
    sup.shutdown();

    let failures = within(runner).await.unwrap();
    assert!(failures.is_empty());
    let stops: Vec<_> = log
        .lines()
        .into_iter()
        .filter(|l| !l.ends_with("start"))
        .collect();
    assert_eq!(stops, vec!["worker stop", "api stop", "db stop"]);
}

#[test]
#[should_panic(expected = "already registered")]
fn duplicate_name_panics() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("db", &[], &log));
    sup.register(service("db", &[], &log));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn name_is_reusable_after_removal() {
    let sup = Supervisor::new(cfg());
    let ran = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
        let r = ran.clone();
        sup.register(TaskSpec::builder("once").build(move |_h: Handle| {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        assert!(within(sup.run()).await.is_empty());
    }
    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panic_without_retry_is_a_failure_and_stops_the_group() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("bystander", &[], &log));
    sup.register(TaskSpec::builder("boom").build(|_h: Handle| async move {
        if true {
            panic!("kaboom");
        }
        Ok(())
    }));

    let failures = within(sup.run()).await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task, "boom");
    assert!(failures[0].error.is_panic());
    match &failures[0].error {
        TaskError::Panicked { message, backtrace } => {
            assert_eq!(message, "kaboom");
            assert!(!backtrace.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(log.contains("bystander stop"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_retry_task_is_relaunched() {
    let sup = Supervisor::new(cfg());
    let attempts = Arc::new(AtomicU32::new(0));

    let a = attempts.clone();
    sup.register(
        TaskSpec::builder("flaky")
            .retry(true)
            .build(move |h: Handle| {
                let a = a.clone();
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    if h.attempt() < 3 {
                        panic!("attempt {} panicked", h.attempt());
                    }
                    Ok(())
                }
            }),
    );

    let failures = within(sup.run()).await;
    assert!(failures.is_empty());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retry_delays_double_from_100ms() {
    let sup = Supervisor::new(cfg());
    let mut rx = sup.bus().subscribe();

    sup.register(
        TaskSpec::builder("flaky")
            .retry(true)
            .build(|h: Handle| async move {
                if h.attempt() < 5 {
                    return Err(TaskError::fail(format!("attempt {}", h.attempt())));
                }
                Ok(())
            }),
    );

    let failures = within(sup.run()).await;
    assert!(failures.is_empty());

    let delays: Vec<u32> = drain(&mut rx)
        .into_iter()
        .filter(|ev| ev.kind == EventKind::BackoffScheduled)
        .filter_map(|ev| ev.delay_ms)
        .collect();
    assert_eq!(delays, vec![100, 200, 400, 800]);
}

#[tokio::test(start_paused = true)]
async fn relaunch_pauses_grow_up_to_the_cap() {
    let sup = Supervisor::new(cfg());
    let starts = Arc::new(Mutex::new(Vec::new()));

    let s = starts.clone();
    sup.register(
        TaskSpec::builder("flaky")
            .retry(true)
            .build(move |h: Handle| {
                let s = s.clone();
                async move {
                    s.lock().unwrap().push(tokio::time::Instant::now());
                    if h.attempt() < 7 {
                        return Err(TaskError::fail("again"));
                    }
                    Ok(())
                }
            }),
    );

    assert!(within(sup.run()).await.is_empty());

    let starts = starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 7);
    let gaps: Vec<Duration> = starts.windows(2).map(|w| w[1] - w[0]).collect();
    let scheduled = [100, 200, 400, 800, 1600, 3000].map(Duration::from_millis);
    for (gap, min) in gaps.iter().zip(scheduled) {
        assert!(*gap >= min, "relaunched after {gap:?}, expected at least {min:?}");
        assert!(*gap < min + Duration::from_millis(50), "relaunch late: {gap:?}");
    }
    assert!(gaps.windows(2).all(|w| w[0] <= w[1]), "gaps shrank: {gaps:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ready_and_shutdown_are_idempotent() {
    let sup = Supervisor::new(cfg());
    let mut rx = sup.bus().subscribe();

    sup.register(TaskSpec::builder("svc").build(|h: Handle| async move {
        h.ready();
        h.ready();
        assert!(h.is_ready());
        let sup = h.supervisor();
        sup.shutdown();
        sup.shutdown();

        let other = h.clone();
        h.shutdown_signal().await;
        other.shutdown_signal().await;
        h.shutdown_signal().await;
        assert!(h.is_shutdown_signaled());
        h.ready();
        Ok(())
    }));

    assert!(within(sup.run()).await.is_empty());

    let events = drain(&mut rx);
    let count = |kind: EventKind| events.iter().filter(|ev| ev.kind == kind).count();
    assert_eq!(count(EventKind::TaskReady), 1);
    assert_eq!(count(EventKind::ShutdownRequested), 1);
    assert_eq!(count(EventKind::ShutdownSignaled), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_failure_shuts_down_the_pipeline() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("db", &[], &log));
    sup.register(service("api", &["db"], &log));
    sup.register(
        TaskSpec::builder("worker")
            .depends_on(["api"])
            .build(|_h: Handle| async move { Err(TaskError::fail("boom")) }),
    );

    let failures = within(sup.run()).await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task, "worker");
    assert!(failures[0].error.to_string().contains("boom"));

    let stops: Vec<_> = log
        .lines()
        .into_iter()
        .filter(|l| l.ends_with("stop"))
        .collect();
    assert_eq!(stops, vec!["api stop", "db stop"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn task_shutdown_waits_for_running_dependents() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("db", &[], &log));
    sup.register(service("api", &["db"], &log));

    let runner = start(&sup);
    until(|| sup.is_ready("api")).await;

    assert!(!sup.shutdown_task("missing"));
    assert!(sup.shutdown_task("db"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!log.contains("db stop"), "api still depends on db");
    assert!(sup.is_running("db"));

    assert!(sup.shutdown_task("api"));
    let failures = within(runner).await.unwrap();
    assert!(failures.is_empty());
    assert_eq!(
        log.lines()
            .into_iter()
            .filter(|l| l.ends_with("stop"))
            .collect::<Vec<_>>(),
        vec!["api stop", "db stop"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_can_be_registered_while_running() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("db", &[], &log));

    let runner = start(&sup);
    until(|| sup.is_ready("db")).await;

    let l = log.clone();
    sup.register(TaskSpec::builder("late").depends_on(["db"]).build(move |h: Handle| {
        let l = l.clone();
        async move {
            l.push("late ran");
            h.supervisor().shutdown();
            Ok(())
        }
    }));

    let failures = within(runner).await.unwrap();
    assert!(failures.is_empty());
    assert!(log.contains("late ran"));
    assert!(log.contains("db stop"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_children_get_unique_names() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();

    let l = log.clone();
    sup.register(TaskSpec::builder("parent").build(move |h: Handle| {
        let l = l.clone();
        async move {
            for _ in 0..2 {
                let l = l.clone();
                h.spawn(move |child: Handle| {
                    let l = l.clone();
                    async move {
                        l.push(child.name());
                        Ok(())
                    }
                });
            }
            h.ready();
            h.shutdown_signal().await;
            Ok(())
        }
    }));

    let runner = start(&sup);
    until(|| log.lines().len() == 2).await;
    sup.shutdown();
    assert!(within(runner).await.unwrap().is_empty());

    let mut names = log.lines();
    names.sort();
    assert_eq!(names, vec!["parent-1", "parent-2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn child_names_skip_live_tasks() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("parent-1", &[], &log));

    let l = log.clone();
    sup.register(TaskSpec::builder("parent").build(move |h: Handle| {
        let l = l.clone();
        async move {
            let child = h.spawn(|_c: Handle| async { Ok(()) });
            l.push(format!("spawned {child}"));
            h.ready();
            h.shutdown_signal().await;
            Ok(())
        }
    }));

    let runner = start(&sup);
    until(|| log.contains("spawned parent-2")).await;
    until(|| sup.is_ready("parent")).await;
    sup.shutdown();
    assert!(within(runner).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bounded_waits_yield_to_shutdown() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();

    let l = log.clone();
    sup.register(TaskSpec::builder("svc").build(move |h: Handle| {
        let l = l.clone();
        async move {
            let done = h.run(async { 40 + 2 }).await;
            l.push(format!("run: {done:?}"));
            let blocking = h.run_blocking(|| "blocking").await;
            l.push(format!("blocking: {blocking:?}"));

            h.supervisor().shutdown();
            let never = h.run(std::future::pending::<()>()).await;
            l.push(format!("pending: {never:?}"));
            Ok(())
        }
    }));

    assert!(within(sup.run()).await.is_empty());
    assert_eq!(
        log.lines(),
        vec!["run: Some(42)", "blocking: Some(\"blocking\")", "pending: None"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panic_inside_bounded_wait_reaches_the_task() {
    let failures = within(Supervisor::run_one("svc", |h: Handle| async move {
        h.run(async {
            if true {
                panic!("deep");
            }
        })
        .await;
        Ok(())
    }))
    .await;

    assert_eq!(failures.len(), 1);
    match &failures[0].error {
        TaskError::Panicked { message, .. } => assert_eq!(message, "deep"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panic_in_blocking_work_keeps_its_backtrace() {
    let failures = within(Supervisor::run_one("svc", |h: Handle| async move {
        h.run_blocking(|| {
            if true {
                panic!("deep-blocking");
            }
        })
        .await;
        Ok(())
    }))
    .await;

    assert_eq!(failures.len(), 1);
    match &failures[0].error {
        TaskError::Panicked { message, backtrace } => {
            assert_eq!(message, "deep-blocking");
            assert!(!backtrace.is_empty());
            assert!(!backtrace.starts_with("<backtrace unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_token_observes_but_cannot_signal() {
    let log = Log::default();
    let l = log.clone();
    let failures = within(Supervisor::run_one("svc", move |h: Handle| {
        let l = l.clone();
        async move {
            let own = h.shutdown_token();
            own.cancel();
            tokio::time::sleep(Duration::from_millis(50)).await;
            l.push(format!("signaled after cancel: {}", h.is_shutdown_signaled()));

            let watcher = h.shutdown_token();
            h.supervisor().shutdown();
            watcher.cancelled().await;
            l.push(format!("signaled after shutdown: {}", h.is_shutdown_signaled()));
            Ok(())
        }
    }))
    .await;

    assert!(failures.is_empty());
    assert_eq!(
        log.lines(),
        vec!["signaled after cancel: false", "signaled after shutdown: true"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelling_run_until_shuts_the_group_down() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("db", &[], &log));
    sup.register(service("api", &["db"], &log));

    let cancel = CancellationToken::new();
    let runner = {
        let sup = sup.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { sup.run_until(cancel).await })
    };
    until(|| sup.is_ready("api")).await;
    cancel.cancel();

    assert!(within(runner).await.unwrap().is_empty());
    assert!(log.contains("api stop"));
    assert!(log.contains("db stop"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_one_reports_only_real_failures() {
    let ok = within(Supervisor::run_one("ok", |_h: Handle| async { Ok(()) })).await;
    assert!(ok.is_empty());

    let canceled =
        within(Supervisor::run_one("canceled", |_h: Handle| async { Err(TaskError::Canceled) }))
            .await;
    assert!(canceled.is_empty());

    let failed =
        within(Supervisor::run_one("bad", |_h: Handle| async { Err(TaskError::fail("boom")) }))
            .await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].to_string(), "task \"bad\" failed: error: boom");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn status_reports_waiting_and_ready_tasks() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("db", &[], &log));
    sup.register(service("api", &["cache"], &log));

    let runner = start(&sup);
    until(|| sup.is_ready("db")).await;

    let status = sup.status();
    assert_eq!(status.len(), 2);
    assert_eq!(status[0].name, "db");
    assert_eq!(status[0].state, TaskState::Ready);
    assert_eq!(status[0].attempts, 1);
    assert_eq!(status[1].name, "api");
    assert_eq!(status[1].state, TaskState::Waiting);
    assert_eq!(status[1].deps, vec!["cache"]);
    assert_eq!(status[1].attempts, 0);

    sup.shutdown();
    assert!(within(runner).await.unwrap().is_empty());
    assert!(!log.contains("api start"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stopping_a_retrying_task_with_pending_failure_stops_the_group() {
    let sup = Supervisor::new(cfg());
    let log = Log::default();
    sup.register(service("steady", &[], &log));
    sup.register(
        TaskSpec::builder("flaky")
            .retry(true)
            .backoff(BackoffPolicy {
                first: Duration::from_secs(30),
                max: Duration::from_secs(30),
                ..BackoffPolicy::default()
            })
            .build(|_h: Handle| async { Err(TaskError::fail("flaked")) }),
    );

    let runner = start(&sup);
    until(|| {
        sup.status()
            .iter()
            .any(|s| s.name == "flaky" && s.state == TaskState::Backoff)
    })
    .await;

    assert!(sup.shutdown_task("flaky"));
    let failures = within(runner).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task, "flaky");
    assert!(failures[0].error.to_string().contains("flaked"));
    assert!(log.contains("steady stop"));
}

struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.kinds.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscribers_see_events_published_during_run() {
    let recorder = Arc::new(Recorder {
        kinds: Mutex::new(Vec::new()),
    });
    let sup = Supervisor::builder(cfg())
        .with_subscriber(recorder.clone())
        .build();

    let started = Arc::new(AtomicBool::new(false));
    let s = started.clone();
    sup.register(TaskSpec::builder("svc").build(move |h: Handle| {
        let s = s.clone();
        async move {
            s.store(true, Ordering::SeqCst);
            h.ready();
            Ok(())
        }
    }));

    assert!(within(sup.run()).await.is_empty());
    assert!(started.load(Ordering::SeqCst));

    let kinds = recorder.kinds.lock().unwrap().clone();
    let pos = |kind: EventKind| kinds.iter().position(|k| *k == kind);
    let starting = pos(EventKind::TaskStarting).expect("TaskStarting delivered");
    let ready = pos(EventKind::TaskReady).expect("TaskReady delivered");
    let removed = pos(EventKind::TaskRemoved).expect("TaskRemoved delivered");
    assert!(starting < ready && ready < removed);
}
