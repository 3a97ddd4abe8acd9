//! # LoggedProcessor: tracing decorator for any processor.
//!
//! Wraps a processor and logs, at `debug`, every call made to it and every
//! item that flows back to the caller. Behaviour is untouched: the decorator
//! returns exactly what the inner processor returns.
//!
//! ```text
//! process(task) ─► "process" ─► inner.process(task) ─► each item: "value" | "error" ─► "end"
//! finish()      ─► "finish"  ─► inner.finish()      ─► "finished" | "finish failed"
//! subscribe()   ─► inner.subscribe() ─► each event: "event"
//! ```

use futures::{future::BoxFuture, FutureExt, StreamExt};
use tracing::{debug, warn};

use crate::core::{FinishFuture, Processor};
use crate::events::EventStream;
use crate::tasks::{Task, TaskStream};

/// Logs calls and results of the wrapped processor.
pub struct LoggedProcessor<P> {
    inner: P,
}

impl<P: Processor> LoggedProcessor<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

/// Logs `end` once the caller is done with the stream.
struct ItemLog {
    processor: String,
    task: String,
}

impl Drop for ItemLog {
    fn drop(&mut self) {
        debug!(processor = %self.processor, task = %self.task, "end");
    }
}

impl<P: Processor> Processor for LoggedProcessor<P> {
    fn caption(&self) -> &str {
        self.inner.caption()
    }

    fn process(&self, task: Task) -> TaskStream {
        debug!(processor = %self.caption(), task = %task, payload = ?task.payload(), "process");
        let log = ItemLog {
            processor: self.caption().to_string(),
            task: task.to_string(),
        };
        self.inner
            .process(task)
            .inspect(move |item| match item {
                Ok(value) => debug!(processor = %log.processor, task = %log.task, %value, "value"),
                Err(err) => debug!(
                    processor = %log.processor,
                    task = %log.task,
                    error = %err,
                    label = err.as_label(),
                    "error"
                ),
            })
            .boxed()
    }

    fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    fn finish(&self) -> FinishFuture {
        let caption = self.caption().to_string();
        debug!(processor = %caption, "finish");
        self.inner
            .finish()
            .inspect(move |res| match res {
                Ok(()) => debug!(processor = %caption, "finished"),
                Err(err) => warn!(processor = %caption, error = %err, "finish failed"),
            })
            .boxed()
    }

    fn subscribe(&self) -> EventStream {
        let caption = self.caption().to_string();
        self.inner
            .subscribe()
            .inspect(move |ev| {
                debug!(
                    processor = %caption,
                    seq = ev.seq,
                    kind = ?ev.kind,
                    task = %ev.task,
                    attempt = ?ev.attempt,
                    "event"
                )
            })
            .boxed()
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        self.inner.finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::core::ProcessorExt;
    use crate::error::TaskError;
    use crate::events::EventKind;
    use crate::processors::{DirectProcessor, RouterProxy};
    use crate::tasks::TaskOutput;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn is_transparent() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let p = LoggedProcessor::new(DirectProcessor::new(
            |t: &Task| match t.kind() {
                "ok" => TaskOutput::values(vec![json!(1), json!(2)]),
                _ => TaskOutput::error("nope"),
            },
            ProcessorConfig::named("logged"),
        ));
        assert_eq!(p.caption(), "logged");
        assert_eq!(p.collect(Task::new("ok")).await.unwrap(), vec![json!(1), json!(2)]);
        assert_eq!(
            p.collect(Task::new("bad")).await,
            Err(TaskError::normalize("nope"))
        );
        p.finish().await.unwrap();
        assert!(!p.inner().is_alive());
    }

    #[tokio::test]
    async fn events_pass_through_unchanged() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let p = LoggedProcessor::new(DirectProcessor::new(
            |_: &Task| TaskOutput::value(json!("v")),
            ProcessorConfig::named("logged-events"),
        ));
        let mut events = p.subscribe();
        let task = Task::new("t");
        p.collect(task.clone()).await.unwrap();
        p.finish().await.unwrap();

        let mut seen = Vec::new();
        while let Some(ev) = events.next().await {
            assert_eq!(ev.task.uid(), task.uid());
            seen.push(ev.kind);
        }
        assert_eq!(
            seen,
            vec![EventKind::TaskStarted, EventKind::TaskResult, EventKind::TaskCompleted]
        );
    }

    #[tokio::test]
    async fn forwards_finish_errors() {
        let direct: Arc<DirectProcessor> =
            Arc::new(DirectProcessor::new(|_: &Task| TaskOutput::value(0), ProcessorConfig::default()));
        let p = LoggedProcessor::new(RouterProxy::of(&direct, "x"));
        assert_eq!(p.finish().await, Err(TaskError::ProxyFinish));
        assert!(p.is_alive());
    }
}
