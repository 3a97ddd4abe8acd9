//! # Background half: serves a real processor over a message channel.
//!
//! Every `process` request opens a subscription keyed by its uid; results are
//! posted back as `N`/`E`/`C`. Each subscription owns a cancellation token so
//! `unsubscribe` can stop it without a reply.
//!
//! ```text
//! handle_message(item)
//!   ├─ Process{uid, task}  ─► spawn pump: processor.process(task)
//!   │                            ├─ Ok(v)  ─► post N(uid, v)
//!   │                            ├─ Err(e) ─► post E(uid, e), forget uid
//!   │                            └─ end    ─► post C(uid), forget uid
//!   ├─ Unsubscribe{uid}    ─► cancel token, forget uid (silent)
//!   └─ Terminate{..}       ─► processor.finish()
//!
//! watcher: processor.finished() ─► no open subscription left
//!            ─► post C(TERMINATE_UID) ─► terminate()
//! ```
//!
//! A pump posts its terminal message before leaving the table, so the
//! terminate reply is always the last message on the channel.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bridge::protocol::{WorkerItem, WorkerItemResponse, TERMINATE_UID};
use crate::core::{Processor, ProcessorRef};
use crate::error::TaskError;
use crate::tasks::Task;

/// Posts one response to the foreground.
pub type PostMessage = Arc<dyn Fn(WorkerItemResponse) + Send + Sync>;

/// Tears the transport down.
pub type Terminate = Arc<dyn Fn() + Send + Sync>;

/// Transport callbacks of the background half.
#[derive(Clone)]
pub struct BackgroundOptions {
    pub post_message: PostMessage,
    pub terminate: Terminate,
}

impl BackgroundOptions {
    pub fn new(
        post_message: impl Fn(WorkerItemResponse) + Send + Sync + 'static,
        terminate: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            post_message: Arc::new(post_message),
            terminate: Arc::new(terminate),
        }
    }
}

impl fmt::Debug for BackgroundOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundOptions").finish_non_exhaustive()
    }
}

/// Serves `processor` to a foreground half.
///
/// Must be created inside a tokio runtime.
pub struct BackgroundWorker {
    inner: Arc<BackgroundInner>,
}

struct BackgroundInner {
    processor: ProcessorRef,
    opts: BackgroundOptions,
    subs: Mutex<HashMap<String, Subscription>>,
    next_id: AtomicU64,
    open_subs: watch::Sender<usize>,
}

/// One open `process` request; `id` tells apart reuses of the same uid.
struct Subscription {
    id: u64,
    token: CancellationToken,
}

impl BackgroundWorker {
    pub fn new(processor: impl Processor, opts: BackgroundOptions) -> Self {
        Self::from_ref(Arc::new(processor), opts)
    }

    pub fn from_ref(processor: ProcessorRef, opts: BackgroundOptions) -> Self {
        let inner = Arc::new(BackgroundInner {
            processor,
            opts,
            subs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            open_subs: watch::channel(0).0,
        });

        let finished = inner.processor.finished();
        let mut open_subs = inner.open_subs.subscribe();
        let watcher = Arc::clone(&inner);
        tokio::spawn(async move {
            finished.await;
            let _ = open_subs.wait_for(|n| *n == 0).await;
            debug!(processor = %watcher.processor.caption(), "background processor finished");
            watcher.post(WorkerItemResponse::Complete {
                uid: TERMINATE_UID.to_string(),
            });
            (watcher.opts.terminate)();
        });

        Self { inner }
    }

    /// Handles one request.
    pub fn handle_message(&self, item: WorkerItem) {
        match item {
            WorkerItem::Process { uid, task } => self.inner.open(uid, task),
            WorkerItem::Unsubscribe { uid } => self.inner.cancel(&uid),
            WorkerItem::Terminate { .. } => self.inner.terminate(),
        }
    }

    /// Decodes a JSON request and handles it.
    pub fn handle_json(&self, json: &str) -> Result<(), TaskError> {
        let item: WorkerItem = serde_json::from_str(json)?;
        self.handle_message(item);
        Ok(())
    }

    /// Number of open subscriptions.
    pub fn active(&self) -> usize {
        self.inner.lock_subs().len()
    }
}

impl BackgroundInner {
    fn lock_subs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Subscription>> {
        self.subs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn post(&self, resp: WorkerItemResponse) {
        (self.opts.post_message)(resp);
    }

    fn open(self: &Arc<Self>, uid: String, task: Task) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let sub = Subscription {
            id,
            token: token.clone(),
        };
        {
            let mut subs = self.lock_subs();
            if let Some(old) = subs.insert(uid.clone(), sub) {
                warn!(%uid, "duplicate uid, previous subscription cancelled");
                old.token.cancel();
            }
            self.open_subs.send_replace(subs.len());
        }
        let mut results = self.processor.process(task);
        let this = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = token.cancelled() => return,
                    item = results.next() => item,
                };
                // Unsubscribe may have raced the item; the token decides.
                if token.is_cancelled() {
                    return;
                }
                match item {
                    Some(Ok(value)) => this.post(WorkerItemResponse::Next {
                        uid: uid.clone(),
                        value,
                    }),
                    Some(Err(error)) => {
                        this.post(WorkerItemResponse::Error {
                            uid: uid.clone(),
                            error,
                        });
                        this.forget(&uid, id);
                        return;
                    }
                    None => {
                        this.post(WorkerItemResponse::Complete { uid: uid.clone() });
                        this.forget(&uid, id);
                        return;
                    }
                }
            }
        });
    }

    /// Removes `uid` unless it was already replaced by a newer subscription.
    fn forget(&self, uid: &str, id: u64) {
        let mut subs = self.lock_subs();
        if subs.get(uid).is_some_and(|s| s.id == id) {
            subs.remove(uid);
            self.open_subs.send_replace(subs.len());
        }
    }

    fn cancel(&self, uid: &str) {
        let removed = {
            let mut subs = self.lock_subs();
            let removed = subs.remove(uid);
            self.open_subs.send_replace(subs.len());
            removed
        };
        match removed {
            Some(sub) => {
                debug!(%uid, "unsubscribed");
                sub.token.cancel();
            }
            None => debug!(%uid, "unsubscribe for unknown uid"),
        }
    }

    fn terminate(self: &Arc<Self>) {
        debug!(processor = %self.processor.caption(), "terminate requested");
        let finish = self.processor.finish();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = finish.await {
                warn!(%error, "finish rejected by the served processor");
                this.post(WorkerItemResponse::Error {
                    uid: TERMINATE_UID.to_string(),
                    error,
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::processors::DirectProcessor;
    use crate::tasks::TaskOutput;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn harness(
        processor: impl Processor,
    ) -> (
        BackgroundWorker,
        mpsc::UnboundedReceiver<WorkerItemResponse>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let terminated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&terminated);
        let bg = BackgroundWorker::new(
            processor,
            BackgroundOptions::new(
                move |resp| {
                    let _ = tx.send(resp);
                },
                move || flag.store(true, Ordering::SeqCst),
            ),
        );
        (bg, rx, terminated)
    }

    fn counter() -> DirectProcessor {
        DirectProcessor::new(
            |_: &Task| TaskOutput::values(vec![json!(1), json!(2), json!(3)]),
            ProcessorConfig::named("bg"),
        )
    }

    #[tokio::test]
    async fn posts_values_then_complete_in_order() {
        let (bg, mut rx, _) = harness(counter());
        bg.handle_json(r#"{"kind":"process","uid":"U","task":{"kind":"count"}}"#)
            .unwrap();

        let mut got = Vec::new();
        for _ in 0..4 {
            got.push(rx.recv().await.unwrap());
        }
        let next = |v| WorkerItemResponse::Next {
            uid: "U".into(),
            value: json!(v),
        };
        assert_eq!(
            got,
            vec![
                next(1),
                next(2),
                next(3),
                WorkerItemResponse::Complete { uid: "U".into() }
            ]
        );
        assert_eq!(bg.active(), 0);
    }

    #[tokio::test]
    async fn errors_are_posted_once() {
        let proc = DirectProcessor::new(|_: &Task| TaskOutput::error("bad"), ProcessorConfig::default());
        let (bg, mut rx, _) = harness(proc);
        bg.handle_message(WorkerItem::Process {
            uid: "U".into(),
            task: Task::new("x"),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            WorkerItemResponse::Error {
                uid: "U".into(),
                error: TaskError::normalize("bad")
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_is_silent() {
        let proc = DirectProcessor::new(
            |_: &Task| {
                TaskOutput::future(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!("late"))
                })
            },
            ProcessorConfig::default(),
        );
        let (bg, mut rx, _) = harness(proc);
        bg.handle_message(WorkerItem::Process {
            uid: "U".into(),
            task: Task::new("x"),
        });
        assert_eq!(bg.active(), 1);
        bg.handle_message(WorkerItem::Unsubscribe { uid: "U".into() });
        assert_eq!(bg.active(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminate_finishes_and_tears_down() {
        let (bg, mut rx, terminated) = harness(counter());
        bg.handle_message(WorkerItem::terminate());

        assert_eq!(
            rx.recv().await.unwrap(),
            WorkerItemResponse::Complete {
                uid: TERMINATE_UID.into()
            }
        );
        tokio::task::yield_now().await;
        assert!(terminated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let (bg, _rx, _) = harness(counter());
        assert!(bg.handle_json(r#"{"kind":"explode","uid":"U"}"#).is_err());
        assert_eq!(bg.active(), 0);
    }
}
