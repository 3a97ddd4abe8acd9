//! # The `runTask` seam.
//!
//! Direct and sequential processors do not know what a task does; they call a
//! [`TaskRunner`] once per attempt. Any `Fn(&Task) -> TaskOutput` closure is a
//! runner, and [`Service`](crate::Service) is a runner that dispatches on
//! [`Task::kind`].
//!
//! ## Example
//! ```rust
//! use taskproc::{RunnerRef, Task, TaskOutput};
//! use std::sync::Arc;
//!
//! let echo: RunnerRef = Arc::new(|task: &Task| {
//!     TaskOutput::value(task.payload().cloned().unwrap_or_default())
//! });
//! # let _ = echo;
//! ```

use std::sync::Arc;

use crate::tasks::{Task, TaskOutput};

/// Shared handle to a runner.
pub type RunnerRef = Arc<dyn TaskRunner>;

/// Executes one attempt of a task.
///
/// Called once per attempt; a retried task calls `run` again with the same
/// [`Task`]. Implementations must not assume they are called only once.
pub trait TaskRunner: Send + Sync + 'static {
    /// Starts one attempt and returns its output.
    fn run(&self, task: &Task) -> TaskOutput;
}

impl<F> TaskRunner for F
where
    F: Fn(&Task) -> TaskOutput + Send + Sync + 'static,
{
    fn run(&self, task: &Task) -> TaskOutput {
        (self)(task)
    }
}
