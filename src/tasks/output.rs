//! # Normalising whatever user code returns into a result stream.
//!
//! A task function may answer synchronously, hand back a future, or produce
//! a whole stream of values. [`TaskOutput`] names those three cases explicitly
//! and [`TaskOutput::into_stream`] turns each into the same [`TaskStream`].
//!
//! ```text
//! Ready(Ok(v))     ──► [v]
//! Ready(Err(e))    ──► [Err(e)]
//! Pending(fut)     ──► [fut.await]
//! Stream(s)        ──► s
//! ```
//!
//! [`try_run`] additionally catches panics, both while calling the user
//! function and while polling what it returned, and reports them as an
//! ordinary [`TaskError`].

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::{
    future::{self, BoxFuture},
    stream::{self, BoxStream},
    FutureExt, Stream, StreamExt,
};
use serde_json::Value;

use crate::error::TaskError;
use crate::tasks::{Task, TaskRunner};

/// Stream of task results: zero or more values, then at most one error.
///
/// End of stream is completion. Dropping the stream cancels delivery.
pub type TaskStream = BoxStream<'static, Result<Value, TaskError>>;

/// What a task function produced.
pub enum TaskOutput {
    /// Synchronous answer.
    Ready(Result<Value, TaskError>),
    /// Answer that arrives later.
    Pending(BoxFuture<'static, Result<Value, TaskError>>),
    /// Any number of values.
    Stream(TaskStream),
}

impl TaskOutput {
    /// A single successful value.
    pub fn value(v: impl Into<Value>) -> Self {
        TaskOutput::Ready(Ok(v.into()))
    }

    /// A synchronous failure.
    pub fn error(e: impl Into<TaskError>) -> Self {
        TaskOutput::Ready(Err(e.into()))
    }

    /// A single value computed by a future.
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        TaskOutput::Pending(fut.boxed())
    }

    /// A stream of results.
    pub fn stream<S>(s: S) -> Self
    where
        S: Stream<Item = Result<Value, TaskError>> + Send + 'static,
    {
        TaskOutput::Stream(s.boxed())
    }

    /// A fixed sequence of values followed by completion.
    pub fn values<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        TaskOutput::Stream(stream::iter(items.into_iter().map(Ok)).boxed())
    }

    /// Converts any variant into a [`TaskStream`].
    pub fn into_stream(self) -> TaskStream {
        match self {
            TaskOutput::Ready(r) => stream::once(future::ready(r)).boxed(),
            TaskOutput::Pending(fut) => fut.into_stream().boxed(),
            TaskOutput::Stream(s) => s,
        }
    }
}

impl From<Result<Value, TaskError>> for TaskOutput {
    fn from(r: Result<Value, TaskError>) -> Self {
        TaskOutput::Ready(r)
    }
}

/// Runs `runner` for `task` and returns a panic-safe stream that stops after
/// its first error.
pub(crate) fn try_run(runner: &dyn TaskRunner, task: &Task) -> TaskStream {
    let output = match std::panic::catch_unwind(AssertUnwindSafe(|| runner.run(task))) {
        Ok(out) => out,
        Err(panic) => return stream::iter([Err(TaskError::from_panic(panic))]).boxed(),
    };

    AssertUnwindSafe(output.into_stream())
        .catch_unwind()
        .map(|r| r.unwrap_or_else(|panic| Err(TaskError::from_panic(panic))))
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}
