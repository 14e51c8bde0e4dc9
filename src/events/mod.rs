//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the registry (registration, reconciliation, completion),
//!   `runner::run_attempt`, [`Handle::ready`](crate::Handle::ready).
//! - **Consumer**: the forwarder spawned by `Supervisor::run_until`, which fans
//!   events out to the [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
