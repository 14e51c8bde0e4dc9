//! # Example: pipeline
//!
//! A three-stage group where each stage depends on the previous one:
//!
//! ```text
//! db ──ready──► api ──ready──► worker
//! ```
//!
//! - `db` opens "connections" for 300ms before declaring readiness.
//! - `api` serves until told to stop.
//! - `worker` processes a few jobs through the api, then fails with `boom`.
//!
//! The worker failure is fatal (retry disabled), so the group shuts down in
//! reverse dependency order: api first, then db. Ctrl-C does the same at any time.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example pipeline --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use groupvisor::{Handle, LogWriter, Supervisor, SupervisorConfig, TaskError, TaskSpec};

fn db() -> TaskSpec {
    TaskSpec::builder("db").build(|h: Handle| async move {
        h.log("opening connection pool");
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.ready();
        h.shutdown_signal().await;
        h.log("closing connection pool");
        Ok(())
    })
}

fn api(jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<u32>>>) -> TaskSpec {
    TaskSpec::builder("api")
        .depends_on(["db"])
        .build(move |h: Handle| {
            let jobs = jobs.clone();
            async move {
                h.ready();
                let mut jobs = jobs.lock().await;
                loop {
                    tokio::select! {
                        job = jobs.recv() => match job {
                            Some(n) => h.log(format!("served request #{n}")),
                            None => break,
                        },
                        _ = h.shutdown_signal() => break,
                    }
                }
                h.log("draining connections");
                Ok(())
            }
        })
}

fn worker(jobs: mpsc::Sender<u32>) -> TaskSpec {
    TaskSpec::builder("worker")
        .depends_on(["api"])
        .build(move |h: Handle| {
            let jobs = jobs.clone();
            async move {
                for n in 1..=3 {
                    if jobs.send(n).await.is_err() {
                        return Err(TaskError::Canceled);
                    }
                    let paused = h.run(tokio::time::sleep(Duration::from_millis(200))).await;
                    if paused.is_none() {
                        return Ok(());
                    }
                }
                Err(TaskError::fail("boom"))
            }
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (tx, rx) = mpsc::channel(8);
    let cfg = SupervisorConfig {
        handle_os_signals: true,
        ..SupervisorConfig::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_subscriber(Arc::new(LogWriter::new()))
        .build();

    sup.register(db());
    sup.register(api(Arc::new(tokio::sync::Mutex::new(rx))));
    sup.register(worker(tx));

    let failures = sup.run().await;
    for failure in &failures {
        eprintln!("{failure}");
    }
    if failures.is_empty() {
        println!("pipeline stopped cleanly");
        Ok(())
    } else {
        anyhow::bail!("pipeline stopped with {} failure(s)", failures.len())
    }
}
