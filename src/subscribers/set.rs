//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow.
//!
//! ## Diagram
//! ```text
//!  processor.subscribe() ──► attach() ──► emit(&Event)
//!                                           ├──► [queue S1] ─► worker S1 ─► on_event()
//!                                           ├──► [queue S2] ─► worker S2 ─► on_event()
//!                                           └──► [queue SN] ─► worker SN ─► on_event()
//!  event stream ends (processor finished) ──► shutdown(): queues closed, workers joined
//! ```

use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use crate::core::Processor;
use crate::events::Event;

use super::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = crate::error::TaskError::from_panic(panic);
                        error!(subscriber = sub.name(), %info, "subscriber panicked");
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// A full or closed queue drops the event for that subscriber only.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, seq = ev.seq, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, seq = ev.seq, "event dropped: worker closed");
                }
            }
        }
    }

    /// Feeds every event of `processor` to the set until the processor has
    /// finished, then shuts the workers down.
    ///
    /// The subscription is taken before the task is spawned, so no event
    /// published after this call returns is missed.
    pub fn attach<P: Processor + ?Sized>(self, processor: &P) -> JoinHandle<()> {
        let mut events = processor.subscribe();
        tokio::spawn(async move {
            while let Some(ev) = events.next().await {
                self.emit(&ev);
            }
            self.shutdown().await;
        })
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::core::ProcessorExt;
    use crate::events::EventKind;
    use crate::processors::DirectProcessor;
    use crate::tasks::{Task, TaskOutput};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, _: &Event) {
            panic!("subscriber bug");
        }
        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    #[tokio::test]
    async fn attach_delivers_until_finished() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>, Arc::new(Exploder)]);
        assert_eq!(set.len(), 2);

        let proc = DirectProcessor::new(|_: &Task| TaskOutput::value(7), ProcessorConfig::default());
        let pump = set.attach(&proc);

        proc.collect(Task::new("x")).await.unwrap();
        proc.finish().await.unwrap();
        pump.await.unwrap();

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![
                EventKind::TaskStarted,
                EventKind::TaskResult,
                EventKind::TaskCompleted
            ]
        );
    }
}
