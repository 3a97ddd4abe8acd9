//! # Worker bridge: a processor split across a message boundary.
//!
//! The background half ([`BackgroundWorker`]) wraps a real processor; the
//! foreground half ([`ForegroundWorker`]) implements [`Processor`](crate::Processor)
//! by forwarding calls as [`WorkerItem`]s and replaying [`WorkerItemResponse`]s.
//! Many concurrent task streams share one channel, told apart by uid.
//!
//! ```text
//!  ForegroundWorker                                   BackgroundWorker
//!  ┌─────────────────────┐   WorkerItem (process,     ┌──────────────────────┐
//!  │ subs: uid ─► sink   │── unsubscribe, terminate) ─►│ subs: uid ─► token   │
//!  │ bus (local events)  │                            │ processor.process()  │
//!  │ open/closing/closed │◄── WorkerItemResponse ──────│ N* then E | C        │
//!  └─────────────────────┘      (N, E, C by uid)      └──────────────────────┘
//! ```
//!
//! [`ThreadWorker`] is a ready-made transport running the background half on
//! its own thread and runtime.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use taskproc::bridge::{ForegroundOptions, ForegroundWorker, ThreadWorker};
//! use taskproc::{DirectProcessor, Processor, ProcessorConfig, ProcessorExt, Task, TaskOutput};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), taskproc::TaskError> {
//!     let create = ThreadWorker::spawn("bg", || {
//!         DirectProcessor::new(|_: &Task| TaskOutput::value(json!("hi")), ProcessorConfig::default())
//!     });
//!     let fg = ForegroundWorker::new(ForegroundOptions::new(create))?;
//!
//!     assert_eq!(fg.collect(Task::new("greet")).await?, vec![json!("hi")]);
//!     fg.finish().await
//! }
//! ```

mod background;
mod foreground;
mod protocol;
mod thread;

pub use background::{BackgroundOptions, BackgroundWorker, PostMessage, Terminate};
pub use foreground::{
    CreateWorker, ForegroundOptions, ForegroundWorker, ResponseSender, Run, WorkerHandle,
};
pub use protocol::{WorkerItem, WorkerItemResponse, TERMINATE_UID};
pub use thread::ThreadWorker;
