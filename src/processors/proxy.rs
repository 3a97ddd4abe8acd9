//! # RouterProxy: a router seen through one prefix.
//!
//! The inverse of [`RouterProcessor`](crate::RouterProcessor): callers submit
//! bare kinds and the proxy re-adds its fixed prefix before delegating.
//!
//! ```text
//! proxy("svc1").process(Task "add") ─► target.process(Task "svc1/add")
//! proxy("svc1").subscribe()         ◄─ target events with kind "svc1/..." (prefix stripped)
//! proxy("svc1").finish()            ─► [Err(invalidop.proxy.finish)]
//! ```
//!
//! The proxy does not own the target's lifecycle: it can observe it
//! (`is_alive`, `finished`) but never end it.

use std::sync::Arc;

use futures::{
    future::{self, BoxFuture},
    FutureExt, StreamExt,
};

use crate::config::DEFAULT_ROUTE_SEPARATOR;
use crate::core::{FinishFuture, Processor, ProcessorRef};
use crate::error::TaskError;
use crate::events::EventStream;
use crate::tasks::{Task, TaskStream};

/// Forwards tasks to `target` under a fixed route prefix.
#[derive(Clone)]
pub struct RouterProxy {
    target: ProcessorRef,
    prefix: String,
    separator: String,
    caption: String,
}

impl RouterProxy {
    /// Proxy using the default `/` separator.
    pub fn new(target: ProcessorRef, prefix: impl Into<String>) -> Self {
        Self::with_separator(target, prefix, DEFAULT_ROUTE_SEPARATOR)
    }

    /// Proxy using a custom separator; it must match the target router's.
    pub fn with_separator(
        target: ProcessorRef,
        prefix: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        let prefix = prefix.into();
        let caption = format!("{}:{}", target.caption(), prefix);
        Self {
            target,
            prefix,
            separator: separator.into(),
            caption,
        }
    }

    /// Convenience constructor for a router owned elsewhere.
    pub fn of<P: Processor>(target: &Arc<P>, prefix: impl Into<String>) -> Self {
        Self::new(Arc::clone(target) as ProcessorRef, prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Processor for RouterProxy {
    fn caption(&self) -> &str {
        &self.caption
    }

    fn process(&self, task: Task) -> TaskStream {
        self.target.process(task.prefixed(&self.prefix, &self.separator))
    }

    fn is_alive(&self) -> bool {
        self.target.is_alive()
    }

    fn finish(&self) -> FinishFuture {
        future::ready(Err(TaskError::ProxyFinish)).boxed()
    }

    /// Target events under this proxy's prefix, with the prefix removed.
    fn subscribe(&self) -> EventStream {
        let head = format!("{}{}", self.prefix, self.separator);
        self.target
            .subscribe()
            .filter_map(move |ev| {
                let inner = ev
                    .task
                    .kind()
                    .strip_prefix(head.as_str())
                    .map(|k| ev.task.with_kind(k));
                future::ready(inner.map(|task| ev.with_task(task)))
            })
            .boxed()
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        self.target.finished()
    }
}
