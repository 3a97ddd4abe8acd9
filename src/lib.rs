//! # taskproc
//!
//! **taskproc** is a family of interchangeable async task processors for
//! Rust. Every processor accepts [`Task`]s, runs them on tokio and answers with
//! a stream of results, under one lifecycle and instrumentation contract.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                          caller
//!                            │ process(Task) ─► TaskStream (values, then error | end)
//!                            ▼
//!  ┌───────────────────────────────────────────────────────────────────┐
//!  │ LoggedProcessor (optional tracing decorator)                      │
//!  └──────────────────────────────┬────────────────────────────────────┘
//!                                 ▼
//!  ┌──────────────┐   ┌───────────────────┐   ┌───────────────────────┐
//!  │ RouterProxy  │──►│  RouterProcessor  │   │   ForegroundWorker    │
//!  │ (adds prefix)│   │ "svc/kind" split  │   │  WorkerItem ─► bg     │
//!  └──────────────┘   └────┬─────────┬────┘   │  bg ─► N / E / C      │
//!                          ▼         ▼        └──────────┬────────────┘
//!            ┌────────────────┐ ┌────────────────────┐   │ message channel
//!            │DirectProcessor │ │SequentialProcessor │   ▼
//!            │ all at once    │ │ one at a time,     │ BackgroundWorker
//!            │ retry per task │ │ fresh/retry queues │  └─► any processor
//!            └───────┬────────┘ └─────────┬──────────┘
//!                    └──── TaskRunner ────┘   (closure or Service)
//!
//!  every processor: Bus (broadcast Events) ─► subscribe() ─► SubscriberSet ─► LogWriter, ...
//!                   FinishLatch ─► finished()
//! ```
//!
//! ### Lifecycle
//! ```text
//! alive ──finish()──► draining ──last in-flight task terminates──► finished
//!                       │                                            │
//!                       └─ process() ─► [Err(worker:finishing)]      └─ event streams end
//! ```
//!
//! ## Features
//! | Area             | Description                                              | Key types / traits                                  |
//! |------------------|----------------------------------------------------------|-----------------------------------------------------|
//! | **Processors**   | Direct, sequential, routed, proxied and logged variants. | [`Processor`], [`DirectProcessor`], [`SequentialProcessor`], [`RouterProcessor`], [`RouterProxy`], [`LoggedProcessor`] |
//! | **Tasks**        | Task values and adapters for user code.                  | [`Task`], [`TaskOutput`], [`TaskRunner`], [`Service`] |
//! | **Policies**     | Retry budget, clamped backoff, transient classification. | [`RetryPolicy`], [`JitterPolicy`]                   |
//! | **Events**       | Hot instrumentation streams and the finish latch.        | [`Event`], [`EventKind`], [`ProcessorExt`]          |
//! | **Subscribers**  | Fan events out to slow consumers.                        | [`Subscribe`], [`SubscriberSet`], [`LogWriter`]     |
//! | **Worker bridge**| Run a processor behind a message channel.                | [`bridge`]                                          |
//! | **Errors**       | Stable error codes for every failure.                    | [`TaskError`]                                       |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use taskproc::{
//!     Processor, ProcessorExt, RetryPolicy, SequentialConfig, SequentialProcessor, Task,
//!     TaskError, TaskOutput,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let cfg = SequentialConfig::named("jobs").with_retry(RetryPolicy {
//!         min_delay: Duration::from_millis(10),
//!         ..RetryPolicy::default()
//!     });
//!     let jobs = SequentialProcessor::new(
//!         |task: &Task| TaskOutput::value(json!(format!("done: {}", task.kind()))),
//!         cfg,
//!     );
//!
//!     let out = jobs.collect(Task::new("resize")).await?;
//!     assert_eq!(out, vec![json!("done: resize")]);
//!
//!     jobs.finish().await?;
//!     assert!(!jobs.is_alive());
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod processors;
mod subscribers;
mod tasks;

pub mod bridge;

// ---- Public re-exports ----

pub use config::{ProcessorConfig, RouterConfig, SequentialConfig};
pub use config::{DEFAULT_BUS_CAPACITY, DEFAULT_ROUTE_SEPARATOR};
pub use crate::core::{FinishFuture, Processor, ProcessorExt, ProcessorRef};
pub use error::{TaskError, UNKNOWN_ERROR};
pub use events::{Bus, Event, EventKind, EventStream, FinishLatch};
pub use policies::{JitterPolicy, NextDelayFn, RetryPolicy, TransientFn};
pub use processors::{
    DirectProcessor, LoggedProcessor, RouterBuilder, RouterProcessor, RouterProxy,
    SequentialProcessor,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Handler, RunnerRef, Service, Task, TaskOutput, TaskRunner, TaskStream};

pub use bridge::{BackgroundWorker, ForegroundWorker, ThreadWorker};
