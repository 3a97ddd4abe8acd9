//! # RouterProcessor: dispatch by kind prefix.
//!
//! The router owns a table of child processors keyed by route prefix. A task
//! kind `<prefix><sep><inner>` is split on the **first** separator; the
//! prefix picks the child, the child sees only `<inner>`.
//!
//! ```text
//! process(Task "svc1/add")
//!   └─► split_once("/") ─► ("svc1", "add")
//!         ├─ no separator   ─► [Err(argument.invalid.task.kind)]
//!         ├─ unknown prefix ─► [Err(argument.invalid.task.prefix)]
//!         └─ children["svc1"].process(Task "add") ─► stream returned as is
//!
//! subscribe()
//!   children[*].subscribe() ─► kind re-prefixed ("add" ─► "svc1/add") ─► merged
//! ```
//!
//! ## Rules
//! - Alive while any child is alive.
//! - `finish()` finishes every child and resolves when the last one has.
//! - Events from different children are merged without relative ordering.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::{
    future::{self, BoxFuture},
    stream, FutureExt, StreamExt,
};
use tracing::debug;

use crate::config::RouterConfig;
use crate::core::{failed, FinishFuture, Processor, ProcessorRef};
use crate::error::TaskError;
use crate::events::EventStream;
use crate::tasks::{Task, TaskStream};

/// Routes tasks to child processors by kind prefix.
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use taskproc::{
///     DirectProcessor, Processor, ProcessorConfig, ProcessorExt, RouterConfig, RouterProcessor,
///     Task, TaskOutput,
/// };
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), taskproc::TaskError> {
///     let echo = DirectProcessor::new(
///         |t: &Task| TaskOutput::value(json!(t.kind())),
///         ProcessorConfig::named("echo"),
///     );
///     let router = RouterProcessor::builder(RouterConfig::default())
///         .route("svc1", echo)
///         .build();
///
///     assert_eq!(router.collect(Task::new("svc1/ping")).await?, vec![json!("ping")]);
///     router.finish().await
/// }
/// ```
pub struct RouterProcessor {
    cfg: RouterConfig,
    routes: BTreeMap<String, ProcessorRef>,
}

/// Collects routes for a [`RouterProcessor`].
pub struct RouterBuilder {
    cfg: RouterConfig,
    routes: BTreeMap<String, ProcessorRef>,
}

impl RouterBuilder {
    /// Adds (or replaces) the child handling `prefix`.
    #[must_use]
    pub fn route(self, prefix: impl Into<String>, processor: impl Processor) -> Self {
        self.route_ref(prefix, Arc::new(processor))
    }

    /// Same as [`RouterBuilder::route`] for an already shared processor.
    #[must_use]
    pub fn route_ref(mut self, prefix: impl Into<String>, processor: ProcessorRef) -> Self {
        self.routes.insert(prefix.into(), processor);
        self
    }

    pub fn build(self) -> RouterProcessor {
        RouterProcessor::new(self.routes, self.cfg)
    }
}

impl RouterProcessor {
    /// Creates a router over `routes`.
    pub fn new(routes: BTreeMap<String, ProcessorRef>, cfg: RouterConfig) -> Self {
        debug!(
            processor = %cfg.caption,
            routes = ?routes.keys().collect::<Vec<_>>(),
            "router created"
        );
        Self { cfg, routes }
    }

    pub fn builder(cfg: RouterConfig) -> RouterBuilder {
        RouterBuilder {
            cfg,
            routes: BTreeMap::new(),
        }
    }

    /// Route separator in use.
    pub fn separator(&self) -> &str {
        &self.cfg.route_separator
    }

    /// Registered prefixes, sorted.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Child processor registered under `prefix`.
    pub fn route(&self, prefix: &str) -> Option<&ProcessorRef> {
        self.routes.get(prefix)
    }

    fn resolve(&self, task: &Task) -> Result<(&ProcessorRef, Task), TaskError> {
        let (prefix, inner) = task
            .kind()
            .split_once(self.cfg.route_separator.as_str())
            .ok_or_else(|| TaskError::InvalidKind {
                kind: task.kind().to_string(),
            })?;
        let child = self
            .routes
            .get(prefix)
            .ok_or_else(|| TaskError::InvalidPrefix {
                prefix: prefix.to_string(),
            })?;
        Ok((child, task.with_kind(inner)))
    }
}

impl Processor for RouterProcessor {
    fn caption(&self) -> &str {
        &self.cfg.caption
    }

    fn process(&self, task: Task) -> TaskStream {
        match self.resolve(&task) {
            Ok((child, inner)) => child.process(inner),
            Err(err) => {
                debug!(processor = %self.cfg.caption, task = %task, error = %err, "route rejected");
                failed(err)
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.routes.values().any(|p| p.is_alive())
    }

    fn finish(&self) -> FinishFuture {
        let all: Vec<_> = self.routes.values().map(|p| p.finish()).collect();
        let caption = self.cfg.caption.clone();
        async move {
            let results = future::join_all(all).await;
            debug!(processor = %caption, "all routes finished");
            results.into_iter().collect()
        }
        .boxed()
    }

    fn subscribe(&self) -> EventStream {
        let sep = self.cfg.route_separator.clone();
        let streams = self.routes.iter().map(|(prefix, child)| {
            let prefix = prefix.clone();
            let sep = sep.clone();
            child
                .subscribe()
                .map(move |ev| {
                    let task = ev.task.prefixed(&prefix, &sep);
                    ev.with_task(task)
                })
                .boxed()
        });
        stream::select_all(streams).boxed()
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        let all: Vec<_> = self.routes.values().map(|p| p.finished()).collect();
        future::join_all(all).map(|_| ()).boxed()
    }
}
