//! # Panic containment with backtraces.
//!
//! [`capture`] polls a future inside `catch_unwind` and converts a panic into a
//! [`CapturedPanic`]. By the time `catch_unwind` returns the stack has already
//! unwound, so the backtrace is taken earlier by a process panic hook:
//!
//! ```text
//! capture(fut)
//!   └─► Armed::poll  (ARMED += 1 for the duration of the poll)
//!         └─► fut panics ─► hook: ARMED > 0 ─► CAPTURED = Backtrace::force_capture()
//!                                └─► previous hook (stderr report, etc.)
//!   └─► catch_unwind Err(payload) ─► CapturedPanic { message, CAPTURED.take() }
//! ```
//!
//! [`capture_sync`] does the same for a closure run on the current thread
//! (blocking work handed to `spawn_blocking`).
//!
//! The hook is installed once and chains to whatever hook was set before it.
//! Panics outside an armed poll are passed straight through.
//!
//! A [`CapturedPanic`] re-raised with `resume_unwind` (as `Handle::run` does for
//! work it ran on another tokio task) is recognized and kept intact.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use futures::FutureExt;

use crate::error::TaskError;

thread_local! {
    static ARMED: Cell<u32> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// A panic converted into data.
#[derive(Debug)]
pub(crate) struct CapturedPanic {
    pub(crate) message: String,
    pub(crate) backtrace: String,
}

impl From<CapturedPanic> for TaskError {
    fn from(p: CapturedPanic) -> Self {
        TaskError::Panicked {
            message: p.message,
            backtrace: p.backtrace,
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(p) = payload.downcast_ref::<CapturedPanic>() {
        p.message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `fut` to completion, converting a panic into [`CapturedPanic`].
pub(crate) async fn capture<F: Future>(fut: F) -> Result<F::Output, CapturedPanic> {
    install_hook();
    let armed = Armed {
        inner: Box::pin(fut),
    };
    match AssertUnwindSafe(armed).catch_unwind().await {
        Ok(out) => Ok(out),
        Err(payload) => {
            let captured = take_captured();
            match payload.downcast::<CapturedPanic>() {
                Ok(forwarded) => Err(*forwarded),
                Err(payload) => Err(CapturedPanic {
                    message: payload_message(&*payload),
                    backtrace: captured
                        .unwrap_or_else(|| "<backtrace unavailable>".to_string()),
                }),
            }
        }
    }
}

/// Runs `f` on the current thread, converting a panic into [`CapturedPanic`].
pub(crate) fn capture_sync<F, T>(f: F) -> Result<T, CapturedPanic>
where
    F: FnOnce() -> T,
{
    install_hook();
    let result = {
        let _guard = ArmGuard::new();
        std::panic::catch_unwind(AssertUnwindSafe(f))
    };
    result.map_err(|payload| CapturedPanic {
        message: payload_message(&*payload),
        backtrace: take_captured().unwrap_or_else(|| "<backtrace unavailable>".to_string()),
    })
}

fn install_hook() {
    HOOK.call_once(|| {
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let armed = ARMED.try_with(|a| a.get() > 0).unwrap_or(false);
            if armed {
                let trace = Backtrace::force_capture().to_string();
                let _ = CAPTURED.try_with(|c| *c.borrow_mut() = Some(trace));
            }
            prev(info);
        }));
    });
}

fn take_captured() -> Option<String> {
    CAPTURED.try_with(|c| c.borrow_mut().take()).ok().flatten()
}

/// Marks the current thread as armed while the inner future is being polled.
struct Armed<F> {
    inner: Pin<Box<F>>,
}

struct ArmGuard;

impl ArmGuard {
    fn new() -> Self {
        ARMED.with(|a| a.set(a.get() + 1));
        ArmGuard
    }
}

impl Drop for ArmGuard {
    fn drop(&mut self) {
        let _ = ARMED.try_with(|a| a.set(a.get().saturating_sub(1)));
    }
}

impl<F: Future> Future for Armed<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = ArmGuard::new();
        self.inner.as_mut().poll(cx)
    }
}
