//! # Task values and the adapters that turn user code into result streams.
//!
//! - [`Task`] the immutable unit of work (`kind`, optional `payload`, `uid`)
//! - [`TaskOutput`] what user code returns: a ready value, a pending future or a stream
//! - [`TaskRunner`] the `runTask` seam used by direct and sequential processors
//! - [`Service`] a table of named methods dispatched by task kind

mod output;
mod service;
mod task;
mod task_fn;

pub use output::{TaskOutput, TaskStream};
pub use service::{Handler, Service};
pub use task::Task;
pub use task_fn::{RunnerRef, TaskRunner};

pub(crate) use output::try_run;
