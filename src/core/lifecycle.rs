//! # Alive flag, in-flight accounting and drain-on-finish.
//!
//! Every admitted task holds an [`InFlight`] guard until its result stream
//! terminates. `finish()` flips the alive flag; the moment the processor is
//! not alive and no guard remains, the bus is closed and the latch fires.
//!
//! ## Rules
//! - `admit()` after `finish()` is refused (callers answer `worker:finishing`).
//! - Closing happens exactly once, whichever of `finish()` or the last
//!   guard drop gets there first.
//! - The bus is closed **before** the latch fires, so an observer awaiting
//!   `finished()` never sees further events.

use std::sync::{Arc, Mutex};

use futures::future::FutureExt;
use tracing::debug;

use crate::core::FinishFuture;
use crate::events::{Bus, FinishLatch};

#[derive(Debug)]
struct DrainState {
    alive: bool,
    in_flight: usize,
}

/// Drain state owned by one processor instance.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    caption: String,
    state: Mutex<DrainState>,
    bus: Bus,
    latch: FinishLatch,
}

/// Keeps the processor from finishing while a task is in flight.
#[derive(Debug)]
pub(crate) struct InFlight {
    life: Arc<Lifecycle>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.life.release();
    }
}

impl Lifecycle {
    pub(crate) fn new(caption: impl Into<String>, bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            caption: caption.into(),
            state: Mutex::new(DrainState {
                alive: true,
                in_flight: 0,
            }),
            bus,
            latch: FinishLatch::new(),
        })
    }

    /// Registers a new task, unless the processor is finishing.
    pub(crate) fn admit(self: &Arc<Self>) -> Option<InFlight> {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !st.alive {
            return None;
        }
        st.in_flight += 1;
        Some(InFlight {
            life: Arc::clone(self),
        })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).alive
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .in_flight
    }

    /// Stops admitting work; resolves once drained.
    pub(crate) fn finish(&self) -> FinishFuture {
        let (first, drained) = {
            let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let first = st.alive;
            st.alive = false;
            (first, st.in_flight == 0)
        };
        if first {
            debug!(processor = %self.caption, drained, "finish requested");
        }
        if drained {
            self.close();
        }
        let done = self.latch.wait();
        async move {
            done.await;
            Ok(())
        }
        .boxed()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn latch(&self) -> &FinishLatch {
        &self.latch
    }

    fn release(&self) {
        let drained = {
            let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
            st.in_flight = st.in_flight.saturating_sub(1);
            !st.alive && st.in_flight == 0
        };
        if drained {
            self.close();
        }
    }

    fn close(&self) {
        self.bus.close();
        if self.latch.fire() {
            debug!(processor = %self.caption, "finished");
        }
    }
}
