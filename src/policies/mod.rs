//! Retry delay policies.
//!
//! A task registered with `retry = true` is relaunched after every failure;
//! these knobs control **how long** it pauses before the next launch.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! TaskSpec { retry: true, backoff: Option<BackoffPolicy> }
//!      └─► core::registry on failure:
//!           - failures += 1
//!           - delay = backoff.next(failures - 1)
//!           - core::runner pauses `delay` at the start of the next launch
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=3s, jitter=None.
//! - `JitterPolicy::None` keeps successive delays non-decreasing.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
