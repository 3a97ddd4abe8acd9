//! # ThreadWorker: the background half on its own OS thread.
//!
//! The thread owns a current-thread tokio runtime, builds the served
//! processor there and talks to the foreground only through JSON strings.
//!
//! ```text
//! foreground                         │  worker thread (own runtime)
//! ───────────────────────────────────┼─────────────────────────────────────
//! post_message(item) ─► to_json ─────┼──► handle_json ─► BackgroundWorker
//! ResponseSender     ◄── from_json ◄─┼─── post_message(resp) ─► to_json
//! terminate()        ─► stop token ──┼──► loop exits, runtime dropped
//! ```
//!
//! When the thread exits its `ResponseSender` is dropped, which the
//! foreground reads as a lost transport.

use std::thread;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::bridge::background::{BackgroundOptions, BackgroundWorker};
use crate::bridge::foreground::{CreateWorker, ResponseSender, WorkerHandle};
use crate::bridge::protocol::WorkerItem;
use crate::core::Processor;
use crate::error::TaskError;

/// Transport backed by a dedicated OS thread.
pub struct ThreadWorker {
    to_worker: mpsc::UnboundedSender<String>,
    stop: CancellationToken,
}

impl ThreadWorker {
    /// Returns a [`CreateWorker`] that spawns a thread named `name` serving
    /// the processor built by `make`.
    pub fn spawn<F, P>(name: impl Into<String>, make: F) -> CreateWorker
    where
        F: FnOnce() -> P + Send + 'static,
        P: Processor,
    {
        let name = name.into();
        Box::new(move |responses: ResponseSender| -> Result<Box<dyn WorkerHandle>, TaskError> {
            let (to_worker, inbox) = mpsc::unbounded_channel::<String>();
            let stop = CancellationToken::new();
            let thread_stop = stop.clone();
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || serve(make, inbox, responses, thread_stop))
                .map_err(TaskError::normalize)?;
            debug!(thread = %name, "worker thread spawned");
            Ok(Box::new(ThreadWorker { to_worker, stop }))
        })
    }
}

impl WorkerHandle for ThreadWorker {
    fn post_message(&self, item: WorkerItem) {
        match serde_json::to_string(&item) {
            Ok(json) => {
                if self.to_worker.send(json).is_err() {
                    debug!(uid = item.uid(), "worker thread gone, request dropped");
                }
            }
            Err(err) => error!(%err, "failed to encode worker request"),
        }
    }

    fn terminate(&self) {
        self.stop.cancel();
    }
}

fn serve<F, P>(
    make: F,
    mut inbox: mpsc::UnboundedReceiver<String>,
    responses: ResponseSender,
    stop: CancellationToken,
) where
    F: FnOnce() -> P,
    P: Processor,
{
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            error!(%err, "worker runtime failed to start");
            return;
        }
    };

    rt.block_on(async move {
        let terminate = stop.clone();
        let worker = BackgroundWorker::new(
            make(),
            BackgroundOptions::new(
                move |resp| match serde_json::to_string(&resp) {
                    Ok(json) => {
                        if let Err(err) = responses.send_json(&json) {
                            warn!(%err, "response rejected");
                        }
                    }
                    Err(err) => error!(%err, "failed to encode worker response"),
                },
                move || terminate.cancel(),
            ),
        );

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                msg = inbox.recv() => match msg {
                    Some(json) => {
                        if let Err(err) = worker.handle_json(&json) {
                            warn!(%err, "malformed worker request");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("worker thread stopping");
    });
}
