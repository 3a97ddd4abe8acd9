//! # Single-slot completion latch.
//!
//! Backs `Processor::finished()`: unlike the event bus, the latch remembers
//! that it fired, so a waiter arriving after completion resolves at once.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;

/// Fires once; every past and future waiter observes it.
#[derive(Clone, Debug)]
pub struct FinishLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for FinishLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FinishLatch {
    /// Creates an unfired latch.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the latch. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// True once fired.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves when the latch fires (immediately if it already has).
    pub fn wait(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(|fired| *fired).await;
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_waiters_resolve() {
        let latch = FinishLatch::new();
        let early = latch.wait();
        assert!(latch.fire());
        assert!(!latch.fire());
        early.await;
        latch.wait().await;
        assert!(latch.is_fired());
    }
}
