use std::sync::Arc;

use crate::core::config::SupervisorConfig;
use crate::core::supervisor::Supervisor;
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Supervisor`] with event subscribers.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues while [`Supervisor::run`] is active.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the supervisor. Does not require a running tokio runtime.
    pub fn build(self) -> Supervisor {
        Supervisor::from_parts(self.cfg, self.subscribers)
    }
}
