//! Instrumentation events: types, broadcast bus and the finish latch.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload
//! - [`Bus`] closable wrapper over `tokio::sync::broadcast`
//! - [`FinishLatch`] single-slot latch behind `Processor::finished`
//!
//! ## Quick reference
//! - **Publishers**: the attempt loop shared by direct and sequential
//!   processors, and the foreground half of the worker bridge.
//! - **Consumers**: `Processor::subscribe()` callers, [`SubscriberSet`](crate::SubscriberSet)
//!   and the router, which rewrites child event kinds back to their routed form.

mod bus;
mod event;
mod latch;

pub use bus::{Bus, EventStream};
pub use event::{Event, EventKind};
pub use latch::FinishLatch;
