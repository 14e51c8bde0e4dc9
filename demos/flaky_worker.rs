//! # Example: flaky_worker
//!
//! A retrying task implemented as a [`Task`] trait object. It fails on its
//! first attempts and succeeds on the fourth; the supervisor relaunches it
//! after a growing pause (100ms, 200ms, 400ms with equal jitter).
//!
//! ```text
//! attempt 1 ─► Err ─► backoff ~100ms
//! attempt 2 ─► Err ─► backoff ~200ms
//! attempt 3 ─► Err ─► backoff ~400ms
//! attempt 4 ─► Ok  ─► removed ─► run returns []
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example flaky_worker
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use groupvisor::{
    BackoffPolicy, EventKind, Handle, JitterPolicy, Supervisor, SupervisorConfig, Task,
    TaskError, TaskSpec,
};

struct FlakyWorker {
    succeed_on: u32,
}

#[async_trait]
impl Task for FlakyWorker {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn run(&self, handle: Handle) -> Result<(), TaskError> {
        let attempt = handle.attempt();
        if attempt < self.succeed_on {
            return Err(TaskError::fail(format!("upstream unavailable (attempt {attempt})")));
        }
        handle.ready();
        handle.log(format!("connected on attempt {attempt}"));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let sup = Supervisor::new(SupervisorConfig {
        tick: Duration::from_millis(50),
        ..SupervisorConfig::default()
    });

    let mut events = sup.bus().subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ev) if ev.kind == EventKind::BackoffScheduled => {
                    println!(
                        "retrying {} in {}ms",
                        ev.task.as_deref().unwrap_or("?"),
                        ev.delay_ms.unwrap_or_default()
                    );
                }
                Ok(ev) if ev.kind == EventKind::TaskRemoved => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let task = Arc::new(FlakyWorker { succeed_on: 4 });
    sup.register(
        TaskSpec::builder(task.name().to_string())
            .retry(true)
            .backoff(BackoffPolicy {
                jitter: JitterPolicy::Equal,
                ..BackoffPolicy::default()
            })
            .build_from_task(task),
    );

    let failures = sup.run().await;
    watcher.await?;
    anyhow::ensure!(failures.is_empty(), "unexpected failures: {failures:?}");
    println!("flaky worker eventually succeeded");
    Ok(())
}
