//! # The processor contract.
//!
//! Every variant (direct, sequential, router, proxy, worker bridge, logging
//! decorator) implements [`Processor`]. Callers submit a [`Task`] and read
//! back a [`TaskStream`]: zero or more values, then an error or the end of
//! the stream. Misuse never panics; it comes back through the same stream.
//!
//! ## Lifecycle
//! ```text
//! alive ──finish()──► draining ──last in-flight task ends──► finished
//!   │                    │                                     │
//!   process() runs       process() ─► Err(worker:finishing)     event streams end,
//!                                                              finished() resolves
//! ```

use std::sync::Arc;

use futures::{
    future::{self, BoxFuture},
    stream, FutureExt, StreamExt,
};
use serde_json::Value;

use crate::error::TaskError;
use crate::events::{EventKind, EventStream};
use crate::tasks::{Task, TaskStream};

/// Future returned by [`Processor::finish`].
pub type FinishFuture = BoxFuture<'static, Result<(), TaskError>>;

/// Shared handle to any processor.
pub type ProcessorRef = Arc<dyn Processor>;

/// Accepts tasks, runs them asynchronously and reports what happens.
pub trait Processor: Send + Sync + 'static {
    /// Name used in logs.
    fn caption(&self) -> &str;

    /// Submits a task. Dropping the returned stream stops delivery.
    fn process(&self, task: Task) -> TaskStream;

    /// Whether new `process` calls are accepted.
    fn is_alive(&self) -> bool;

    /// Stops accepting work and resolves once in-flight work has drained.
    ///
    /// Idempotent: later calls resolve at the same moment as the first.
    fn finish(&self) -> FinishFuture;

    /// Hot stream of every instrumentation event published from now on.
    ///
    /// Ends when the processor has finished.
    fn subscribe(&self) -> EventStream;

    /// Resolves once the processor has finished, also for late callers.
    fn finished(&self) -> BoxFuture<'static, ()>;
}

impl<P: Processor + ?Sized> Processor for Arc<P> {
    fn caption(&self) -> &str {
        (**self).caption()
    }

    fn process(&self, task: Task) -> TaskStream {
        (**self).process(task)
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }

    fn finish(&self) -> FinishFuture {
        (**self).finish()
    }

    fn subscribe(&self) -> EventStream {
        (**self).subscribe()
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        (**self).finished()
    }
}

/// Convenience views over [`Processor`].
pub trait ProcessorExt: Processor {
    /// Events of a single kind.
    fn on(&self, kind: EventKind) -> EventStream {
        self.subscribe()
            .filter(move |ev| future::ready(ev.kind == kind))
            .boxed()
    }

    /// First attempts starting.
    fn on_task_started(&self) -> EventStream {
        self.on(EventKind::TaskStarted)
    }

    /// Retry attempts starting.
    fn on_task_restarted(&self) -> EventStream {
        self.on(EventKind::TaskRestarted)
    }

    /// Values produced.
    fn on_task_result(&self) -> EventStream {
        self.on(EventKind::TaskResult)
    }

    /// Permanent failures.
    fn on_task_error(&self) -> EventStream {
        self.on(EventKind::TaskFailed)
    }

    /// Normal completions.
    fn on_task_completed(&self) -> EventStream {
        self.on(EventKind::TaskCompleted)
    }

    /// Submits a task and gathers its values, or its error.
    fn collect(&self, task: Task) -> BoxFuture<'static, Result<Vec<Value>, TaskError>> {
        let mut results = self.process(task);
        async move {
            let mut values = Vec::new();
            while let Some(item) = results.next().await {
                values.push(item?);
            }
            Ok(values)
        }
        .boxed()
    }
}

impl<P: Processor + ?Sized> ProcessorExt for P {}

/// A stream that fails immediately with `err`.
pub(crate) fn failed(err: TaskError) -> TaskStream {
    stream::once(future::ready(Err(err))).boxed()
}
