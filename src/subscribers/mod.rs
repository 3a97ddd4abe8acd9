//! # Event subscribers.
//!
//! The [`Subscribe`] trait and its fan-out, fed from any processor's
//! instrumentation stream.
//!
//! ## Architecture
//! ```text
//! Processor ── subscribe() ──► SubscriberSet::attach ──► per-subscriber queues
//!                                                           │
//!                                                ┌──────────┼──────────┐
//!                                                ▼          ▼          ▼
//!                                            LogWriter   Metrics    Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use taskproc::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::TaskFailed {
//!             // page someone
//!         }
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
