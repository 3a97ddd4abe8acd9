//! # Foreground half: a processor whose work runs behind a message channel.
//!
//! Each `process()` mints a fresh correlation uid, posts `process` and hands
//! back a stream fed by the `N`/`E`/`C` responses carrying that uid.
//!
//! ```text
//! process(task) ─► uid ─► subs[uid] = sink ─► post {process, uid, task}
//!                                                   │
//! responses ─► dispatcher ─► run(deliver) ──────────┘
//!                 ├─ N(uid, v) ─► sink <- Ok(v)      TaskResult
//!                 ├─ E(uid, e) ─► sink <- Err(e)     TaskFailed, uid forgotten
//!                 ├─ C(uid)    ─► sink closed        TaskCompleted, uid forgotten
//!                 └─ C/E(TERMINATE_UID) ─► transport torn down, finished
//!
//! dropped stream before its end ─► post {unsubscribe, uid}
//! transport gone               ─► every pending stream <- Err(worker:disconnected)
//! ```
//!
//! ## States
//! `open ─finish()─► closing ─C(TERMINATE_UID)─► closed`. In `closing`, calls
//! are still forwarded; the background processor answers them with
//! `worker:finishing`. Only `closed` is rejected locally.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::{
    future::{BoxFuture, FutureExt},
    Stream, StreamExt,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::protocol::{WorkerItem, WorkerItemResponse, TERMINATE_UID};
use crate::core::{failed, FinishFuture, Processor};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind, EventStream, FinishLatch};
use crate::tasks::{Task, TaskStream};

/// The transport as seen from the foreground.
pub trait WorkerHandle: Send + Sync + 'static {
    /// Sends one request to the background half.
    fn post_message(&self, item: WorkerItem);

    /// Tears the transport down.
    fn terminate(&self);
}

/// Where the transport delivers background responses.
///
/// Dropping every clone tells the foreground the transport is gone.
#[derive(Clone, Debug)]
pub struct ResponseSender {
    tx: mpsc::UnboundedSender<WorkerItemResponse>,
}

impl ResponseSender {
    /// Delivers one response; `false` once the foreground is gone.
    pub fn send(&self, resp: WorkerItemResponse) -> bool {
        self.tx.send(resp).is_ok()
    }

    /// Decodes a JSON response and delivers it.
    pub fn send_json(&self, json: &str) -> Result<bool, TaskError> {
        let resp: WorkerItemResponse = serde_json::from_str(json)?;
        Ok(self.send(resp))
    }
}

/// Builds the transport, given where it must deliver responses.
pub type CreateWorker =
    Box<dyn FnOnce(ResponseSender) -> Result<Box<dyn WorkerHandle>, TaskError> + Send>;

/// Runs a delivery callback on the caller's chosen context.
pub type Run = Arc<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

/// Options of the foreground half.
pub struct ForegroundOptions {
    pub create_worker: CreateWorker,
    /// Delivery context; `None` delivers immediately on the dispatcher.
    pub run: Option<Run>,
    pub caption: String,
}

impl ForegroundOptions {
    pub fn new(
        create_worker: impl FnOnce(ResponseSender) -> Result<Box<dyn WorkerHandle>, TaskError>
            + Send
            + 'static,
    ) -> Self {
        Self {
            create_worker: Box::new(create_worker),
            run: None,
            caption: "worker".to_string(),
        }
    }

    #[must_use]
    pub fn with_run(mut self, run: impl Fn(Box<dyn FnOnce() + Send>) + Send + Sync + 'static) -> Self {
        self.run = Some(Arc::new(run));
        self
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }
}

impl fmt::Debug for ForegroundOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForegroundOptions")
            .field("caption", &self.caption)
            .field("run", &self.run.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BridgeState {
    Open,
    Closing,
    Closed,
}

struct Pending {
    task: Task,
    sink: mpsc::UnboundedSender<Result<Value, TaskError>>,
}

struct Shared {
    state: BridgeState,
    subs: HashMap<String, Pending>,
    outcome: Option<Result<(), TaskError>>,
}

struct ForegroundInner {
    caption: String,
    handle: Box<dyn WorkerHandle>,
    shared: Mutex<Shared>,
    bus: Bus,
    latch: FinishLatch,
}

/// Processor facade over a background worker.
///
/// Must be created inside a tokio runtime. Dropping it tears the transport
/// down.
pub struct ForegroundWorker {
    inner: Arc<ForegroundInner>,
}

impl ForegroundWorker {
    pub fn new(opts: ForegroundOptions) -> Result<Self, TaskError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = (opts.create_worker)(ResponseSender { tx })?;
        let inner = Arc::new(ForegroundInner {
            caption: opts.caption,
            handle,
            shared: Mutex::new(Shared {
                state: BridgeState::Open,
                subs: HashMap::new(),
                outcome: None,
            }),
            bus: Bus::new(crate::config::DEFAULT_BUS_CAPACITY),
            latch: FinishLatch::new(),
        });
        tokio::spawn(dispatch(Arc::clone(&inner), rx, opts.run));
        Ok(Self { inner })
    }

    /// Number of streams still waiting for a terminal response.
    pub fn pending(&self) -> usize {
        self.inner.lock().subs.len()
    }
}

impl Drop for ForegroundWorker {
    fn drop(&mut self) {
        if self.inner.lock().state != BridgeState::Closed {
            debug!(processor = %self.inner.caption, "dropped while open, terminating transport");
            self.inner.handle.terminate();
        }
    }
}

async fn dispatch(
    inner: Arc<ForegroundInner>,
    mut rx: mpsc::UnboundedReceiver<WorkerItemResponse>,
    run: Option<Run>,
) {
    while let Some(resp) = rx.recv().await {
        match &run {
            Some(run) => {
                let inner = Arc::clone(&inner);
                run(Box::new(move || inner.deliver(resp)));
            }
            None => inner.deliver(resp),
        }
    }
    inner.disconnected();
}

impl ForegroundInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, resp: WorkerItemResponse) {
        if resp.uid() == TERMINATE_UID {
            let outcome = match resp {
                WorkerItemResponse::Error { error, .. } => Err(error),
                WorkerItemResponse::Complete { .. } => Ok(()),
                WorkerItemResponse::Next { .. } => return,
            };
            self.close(outcome);
            return;
        }

        let mut shared = self.lock();
        match resp {
            WorkerItemResponse::Next { uid, value } => {
                let Some(p) = shared.subs.get(&uid) else {
                    return;
                };
                self.bus.publish(
                    Event::new(EventKind::TaskResult, p.task.clone()).with_value(value.clone()),
                );
                let _ = p.sink.send(Ok(value));
            }
            WorkerItemResponse::Error { uid, error } => {
                let Some(p) = shared.subs.remove(&uid) else {
                    return;
                };
                self.bus
                    .publish(Event::new(EventKind::TaskFailed, p.task).with_error(error.clone()));
                let _ = p.sink.send(Err(error));
            }
            WorkerItemResponse::Complete { uid } => {
                if let Some(p) = shared.subs.remove(&uid) {
                    self.bus.publish(Event::new(EventKind::TaskCompleted, p.task));
                }
            }
        }
    }

    /// Transport vanished: fail whatever is still pending.
    fn disconnected(&self) {
        let closed = {
            let mut shared = self.lock();
            for (_, p) in shared.subs.drain() {
                let _ = p.sink.send(Err(TaskError::Disconnected));
            }
            shared.state == BridgeState::Closed
        };
        if !closed {
            warn!(processor = %self.caption, "worker transport disconnected");
            self.close(Err(TaskError::Disconnected));
        }
    }

    fn close(&self, outcome: Result<(), TaskError>) {
        {
            let mut shared = self.lock();
            if shared.state == BridgeState::Closed {
                return;
            }
            shared.state = BridgeState::Closed;
            shared.outcome = Some(outcome);
            for (_, p) in shared.subs.drain() {
                let _ = p.sink.send(Err(TaskError::Disconnected));
            }
        }
        self.handle.terminate();
        self.bus.close();
        if self.latch.fire() {
            debug!(processor = %self.caption, "worker closed");
        }
    }

    /// Stream side gave up before its terminal response.
    fn unsubscribe(&self, uid: &str) {
        let removed = self.lock().subs.remove(uid).is_some();
        if removed {
            debug!(processor = %self.caption, %uid, "unsubscribe");
            self.handle.post_message(WorkerItem::Unsubscribe {
                uid: uid.to_string(),
            });
        }
    }
}

/// Caller stream of one bridged task.
struct BridgeStream {
    uid: String,
    rx: mpsc::UnboundedReceiver<Result<Value, TaskError>>,
    inner: Arc<ForegroundInner>,
    done: bool,
}

impl Stream for BridgeStream {
    type Item = Result<Value, TaskError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let item = futures::ready!(self.rx.poll_recv(cx));
        match &item {
            Some(Ok(_)) => {}
            Some(Err(_)) | None => self.done = true,
        }
        Poll::Ready(item)
    }
}

impl Drop for BridgeStream {
    fn drop(&mut self) {
        if !self.done {
            self.inner.unsubscribe(&self.uid);
        }
    }
}

impl Processor for ForegroundWorker {
    fn caption(&self) -> &str {
        &self.inner.caption
    }

    fn process(&self, task: Task) -> TaskStream {
        let uid = uuid::Uuid::new_v4().to_string();
        let (sink, rx) = mpsc::unbounded_channel();
        {
            let mut shared = self.inner.lock();
            if shared.state == BridgeState::Closed {
                return failed(TaskError::Finishing);
            }
            shared.subs.insert(
                uid.clone(),
                Pending {
                    task: task.clone(),
                    sink,
                },
            );
        }
        self.inner
            .bus
            .publish(Event::new(EventKind::TaskStarted, task.clone()).with_attempt(1));
        self.inner.handle.post_message(WorkerItem::Process {
            uid: uid.clone(),
            task,
        });
        BridgeStream {
            uid,
            rx,
            inner: Arc::clone(&self.inner),
            done: false,
        }
        .boxed()
    }

    fn is_alive(&self) -> bool {
        self.inner.lock().state == BridgeState::Open
    }

    fn finish(&self) -> FinishFuture {
        let first = {
            let mut shared = self.inner.lock();
            let first = shared.state == BridgeState::Open;
            if first {
                shared.state = BridgeState::Closing;
            }
            first
        };
        if first {
            debug!(processor = %self.inner.caption, "terminate sent");
            self.inner.handle.post_message(WorkerItem::terminate());
        }
        let done = self.inner.latch.wait();
        let inner = Arc::clone(&self.inner);
        async move {
            done.await;
            inner.lock().outcome.clone().unwrap_or(Ok(()))
        }
        .boxed()
    }

    fn subscribe(&self) -> EventStream {
        self.inner.bus.subscribe()
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        self.inner.latch.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProcessorExt;
    use serde_json::json;

    /// Records requests; responses are injected by the test.
    #[derive(Clone, Default)]
    struct Loopback {
        sent: Arc<Mutex<Vec<WorkerItem>>>,
        terminated: Arc<Mutex<bool>>,
    }

    impl WorkerHandle for Loopback {
        fn post_message(&self, item: WorkerItem) {
            self.sent.lock().unwrap().push(item);
        }
        fn terminate(&self) {
            *self.terminated.lock().unwrap() = true;
        }
    }

    fn worker() -> (ForegroundWorker, Loopback, ResponseSender) {
        let lb = Loopback::default();
        let handle = lb.clone();
        let (tx_slot, rx_slot) = std::sync::mpsc::channel();
        let fg = ForegroundWorker::new(ForegroundOptions::new(move |responses| {
            tx_slot.send(responses).unwrap();
            Ok(Box::new(handle) as Box<dyn WorkerHandle>)
        }))
        .unwrap();
        (fg, lb, rx_slot.recv().unwrap())
    }

    fn process_uid(lb: &Loopback, idx: usize) -> String {
        lb.sent.lock().unwrap()[idx].uid().to_string()
    }

    #[tokio::test]
    async fn responses_feed_the_matching_stream() {
        let (fg, lb, responses) = worker();
        let mut started = fg.on_task_started();
        let mut out = fg.process(Task::new("count"));
        let uid = process_uid(&lb, 0);

        for v in [1, 2, 3] {
            responses.send(WorkerItemResponse::Next {
                uid: uid.clone(),
                value: json!(v),
            });
        }
        responses.send(WorkerItemResponse::Complete { uid });

        let mut got = Vec::new();
        while let Some(item) = out.next().await {
            got.push(item.unwrap());
        }
        assert_eq!(got, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(started.next().await.unwrap().task.kind(), "count");
        assert_eq!(fg.pending(), 0);
    }

    #[tokio::test]
    async fn dropping_a_stream_unsubscribes() {
        let (fg, lb, _responses) = worker();
        let out = fg.process(Task::new("long"));
        let uid = process_uid(&lb, 0);
        drop(out);

        assert_eq!(fg.pending(), 0);
        assert_eq!(lb.sent.lock().unwrap()[1], WorkerItem::Unsubscribe { uid });
    }

    #[tokio::test]
    async fn finish_handshake() {
        let (fg, lb, responses) = worker();
        let first = fg.finish();
        let second = fg.finish();
        assert!(!fg.is_alive());
        assert_eq!(*lb.sent.lock().unwrap(), vec![WorkerItem::terminate()]);

        responses.send(WorkerItemResponse::Complete {
            uid: TERMINATE_UID.into(),
        });
        first.await.unwrap();
        second.await.unwrap();
        assert!(*lb.terminated.lock().unwrap());

        let err = fg.collect(Task::new("late")).await.unwrap_err();
        assert_eq!(err, TaskError::Finishing);
    }

    #[tokio::test]
    async fn lost_transport_fails_pending_streams() {
        let (fg, _lb, responses) = worker();
        let out = fg.process(Task::new("x"));
        drop(responses);

        let items: Vec<_> = out.collect().await;
        assert_eq!(items, vec![Err(TaskError::Disconnected)]);
        fg.finished().await;
        assert_eq!(fg.finish().await, Err(TaskError::Disconnected));
    }
}
