//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for observing the lifecycle [`Event`](crate::Event)s
//! of a supervised group. [`SubscriberSet`] fans each event out to every
//! subscriber through a dedicated bounded queue and worker, so a slow
//! subscriber never stalls the supervisor or its peers.
//!
//! ```text
//! Bus ──► run-loop forwarder ──► SubscriberSet::emit(&Event)
//!                                   ├──► [queue S1] ─► worker ─► S1.on_event()
//!                                   └──► [queue SN] ─► worker ─► SN.on_event()
//! ```
//!
//! With the `logging` feature, [`LogWriter`] renders events through `tracing`.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
