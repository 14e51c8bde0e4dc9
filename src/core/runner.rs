//! # Run a single launch attempt of a task.
//!
//! ```text
//! run_attempt(task, handle, delay)
//!   ├─► delay > 0: sleep(delay) | shutdown signal ─► complete(Interrupted)
//!   ├─► mark_started            (publishes TaskStarting)
//!   ├─► capture(task.run(handle).instrument(span))
//!   │       └─ panic ─► TaskError::Panicked { message, backtrace }
//!   └─► complete(Ran(result))   (registry decides finish / retry / dead)
//! ```
//!
//! ## Rules
//! - The backoff pause happens at the start of the attempt, inside the attempt.
//! - A panic never escapes this function.
//! - Exactly one `complete` per attempt.

use std::time::Duration;

use tracing::Instrument;

use crate::core::handle::Handle;
use crate::core::panic;
use crate::core::registry::Outcome;
use crate::tasks::TaskRef;

pub(crate) async fn run_attempt(task: TaskRef, handle: Handle, delay: Duration) {
    let sup = handle.supervisor().clone();
    let name = handle.name().to_string();
    let id = handle.id();

    if !delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = handle.shutdown_signal() => {
                sup.complete(&name, id, Outcome::Interrupted);
                return;
            }
        }
    }

    sup.mark_started(&name, id);
    let span = handle.span().clone();
    let result = match panic::capture(task.run(handle).instrument(span)).await {
        Ok(result) => result,
        Err(p) => {
            tracing::error!(task = %name, panic = %p.message, "task panicked");
            Err(p.into())
        }
    };
    sup.complete(&name, id, Outcome::Ran(result));
}
