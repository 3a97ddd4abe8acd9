//! Processor contract and the machinery shared by its implementations.
//!
//! Internal modules:
//! - [`processor`]: the [`Processor`] trait and per-kind event views;
//! - [`lifecycle`]: alive flag, in-flight accounting and drain-on-finish;
//! - [`attempt`]: runs one attempt, forwards values, publishes events;
//! - [`queue`]: fresh/retry queues with alternating priority.
//!
//! ## Wiring
//! ```text
//! process(task)
//!   └─► Lifecycle::admit() ── refused ──► [Err(worker:finishing)]
//!          │ InFlight guard
//!          ▼
//!   retry loop (direct: spawned per task / sequential: one shared loop)
//!     ├─► publish TaskStarted | TaskRestarted
//!     ├─► attempt::run_attempt() ─► values ─► caller stream + TaskResult
//!     ├─► Failed(err) ─► RetryPolicy::should_retry ─► backoff ─► loop
//!     └─► terminal ─► TaskCompleted | TaskFailed, guard dropped
//!                         └─► last guard after finish() ─► Bus::close + FinishLatch::fire
//! ```

pub(crate) mod attempt;
pub(crate) mod lifecycle;
mod processor;
pub(crate) mod queue;

pub use processor::{FinishFuture, Processor, ProcessorExt, ProcessorRef};

pub(crate) use processor::failed;
