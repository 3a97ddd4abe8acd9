//! # Closable broadcast bus for instrumentation events.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] sender. Each call to
//! [`Bus::subscribe`] yields an independent hot stream: it sees only events
//! published after it subscribed, nothing is replayed.
//!
//! ```text
//! attempt loop ──┐
//! attempt loop ──┼── publish(Event) ──► Bus ──► subscribe() ──► EventStream
//! attempt loop ──┘                       │
//!                                        └──► close() drops the sender:
//!                                             every stream ends after
//!                                             draining what it buffered
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits for receivers.
//! - **Bounded capacity**: slow receivers skip the oldest events (logged at `warn`).
//! - **Closing is final**: after [`Bus::close`], publishes are dropped and new
//!   subscriptions end immediately.

use std::sync::{Arc, Mutex};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use super::event::Event;

/// Hot stream of instrumentation events.
pub type EventStream = BoxStream<'static, Event>;

/// Broadcast channel for instrumentation events.
///
/// Cheap to clone; all clones share one sender.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: Arc<Mutex<Option<broadcast::Sender<Event>>>>,
}

impl Bus {
    /// Creates a new bus with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// Dropped silently when nobody listens or the bus is closed.
    pub fn publish(&self, ev: Event) {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(ev);
        }
    }

    /// Creates a new stream observing subsequent events.
    pub fn subscribe(&self) -> EventStream {
        let rx = {
            let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(tx) => tx.subscribe(),
                None => return stream::empty().boxed(),
            }
        };
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => return Some((ev, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged, oldest events dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Drops the sender so every subscription ends. Idempotent.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// True once [`Bus::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::tasks::Task;

    #[tokio::test]
    async fn subscribers_see_only_later_events_and_end_on_close() {
        let bus = Bus::new(16);
        bus.publish(Event::new(EventKind::TaskStarted, Task::new("early")));

        let stream = bus.subscribe();
        bus.publish(Event::new(EventKind::TaskStarted, Task::new("late")));
        bus.close();

        let seen: Vec<String> = stream.map(|e| e.task.kind().to_string()).collect().await;
        assert_eq!(seen, vec!["late".to_string()]);
    }

    #[tokio::test]
    async fn subscribe_after_close_is_empty() {
        let bus = Bus::new(4);
        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.subscribe().count().await, 0);
    }
}
