//! # Task abstractions and specifications.
//!
//! - [`Task`] - trait for implementing supervised async work
//! - [`TaskFn`] - function-based task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] - task bundled with its dependencies and retry policy

mod spec;
mod task;
mod task_fn;

pub use spec::{TaskSpec, TaskSpecBuilder};
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
