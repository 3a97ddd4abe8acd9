//! # DirectProcessor: every task starts at once.
//!
//! Each `process()` call spawns its own retry loop; tasks submitted together
//! run concurrently with no ordering between them. Values of one task reach
//! its caller in the order they were produced.
//!
//! ## Retry loop
//! ```text
//! attempt = 1, delay = 0
//! loop {
//!   ├─► publish TaskStarted (attempt 1) | TaskRestarted (attempt n)
//!   ├─► run_attempt(runner, task) ──► values to caller + TaskResult
//!   │     ├─ Completed ─► publish TaskCompleted, exit
//!   │     ├─ Abandoned ─► caller dropped the stream, exit
//!   │     └─ Failed(e) ─► decide(policy, e, failures, delay)
//!   │                       ├─ Retry(d) ─► sleep(d) (ends early if caller leaves), continue
//!   │                       └─ GiveUp   ─► Err(e) to caller, publish TaskFailed, exit
//! }
//! exit drops the in-flight guard; after finish() the last one closes the processor
//! ```
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use taskproc::{DirectProcessor, Processor, ProcessorConfig, ProcessorExt, Service, Task, TaskOutput};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), taskproc::TaskError> {
//!     let svc = Service::new().method("double", |p| {
//!         let n = p.and_then(|v| v.as_i64()).unwrap_or(0);
//!         TaskOutput::value(json!(n * 2))
//!     });
//!     let proc = DirectProcessor::from_service(svc, ProcessorConfig::named("math"));
//!
//!     let out = proc.collect(Task::new("double").with_payload(json!(21))).await?;
//!     assert_eq!(out, vec![json!(42)]);
//!
//!     proc.finish().await
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time;
use tracing::debug;

use crate::config::ProcessorConfig;
use crate::core::attempt::{self, AttemptOutcome, Decision, ResultSink};
use crate::core::lifecycle::{InFlight, Lifecycle};
use crate::core::{failed, FinishFuture, Processor};
use crate::error::TaskError;
use crate::events::{Bus, EventStream};
use crate::tasks::{RunnerRef, Service, Task, TaskRunner, TaskStream};

/// Runs every task immediately and concurrently, with per-task retries.
pub struct DirectProcessor {
    inner: Arc<DirectInner>,
}

struct DirectInner {
    cfg: ProcessorConfig,
    runner: RunnerRef,
    life: Arc<Lifecycle>,
}

impl DirectProcessor {
    /// Creates a processor calling `runner` for each attempt.
    pub fn new(runner: impl TaskRunner, cfg: ProcessorConfig) -> Self {
        Self::from_runner(Arc::new(runner), cfg)
    }

    /// Same as [`DirectProcessor::new`] for an already shared runner.
    pub fn from_runner(runner: RunnerRef, cfg: ProcessorConfig) -> Self {
        let life = Lifecycle::new(cfg.caption.clone(), Bus::new(cfg.bus_capacity));
        Self {
            inner: Arc::new(DirectInner { cfg, runner, life }),
        }
    }

    /// Exposes a [`Service`]: the task kind picks the method, the payload
    /// is its argument.
    pub fn from_service(service: Service, cfg: ProcessorConfig) -> Self {
        Self::new(service, cfg)
    }

    /// Number of tasks whose result stream has not terminated yet.
    pub fn in_flight(&self) -> usize {
        self.inner.life.in_flight()
    }
}

impl DirectInner {
    async fn drive(self: Arc<Self>, task: Task, sink: ResultSink, _guard: InFlight) {
        let bus = self.life.bus();
        let policy = &self.cfg.retry;
        let mut failures: u32 = 0;
        let mut delay = Duration::ZERO;
        let mut last: Option<TaskError> = None;

        loop {
            let attempt = failures + 1;
            attempt::publish_start(bus, &task, attempt, last.as_ref().map(|e| (e, delay)));

            let err = match attempt::run_attempt(
                self.runner.as_ref(),
                &task,
                attempt,
                None,
                &sink,
                bus,
            )
            .await
            {
                AttemptOutcome::Completed => {
                    attempt::publish_completed(bus, &task, attempt);
                    return;
                }
                AttemptOutcome::Abandoned => {
                    debug!(processor = %self.cfg.caption, task = %task, "caller went away");
                    return;
                }
                AttemptOutcome::Failed(err) => err,
            };

            failures += 1;
            match attempt::decide(policy, &err, failures, delay) {
                Decision::Retry(next) => {
                    debug!(
                        processor = %self.cfg.caption,
                        task = %task,
                        attempt,
                        delay_ms = next.as_millis() as u64,
                        error = %err,
                        "retry scheduled"
                    );
                    delay = next;
                    last = Some(err);
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = sink.closed() => return,
                    }
                }
                Decision::GiveUp => {
                    attempt::give_up(&sink, bus, &task, attempt, err);
                    return;
                }
            }
        }
    }
}

impl Processor for DirectProcessor {
    fn caption(&self) -> &str {
        &self.inner.cfg.caption
    }

    fn process(&self, task: Task) -> TaskStream {
        let Some(guard) = self.inner.life.admit() else {
            debug!(processor = %self.inner.cfg.caption, task = %task, "rejected: finishing");
            return failed(TaskError::Finishing);
        };
        let (sink, results) = attempt::result_channel(attempt::DIRECT_LAG_LIMIT);
        tokio::spawn(Arc::clone(&self.inner).drive(task, sink, guard));
        results
    }

    fn is_alive(&self) -> bool {
        self.inner.life.is_alive()
    }

    fn finish(&self) -> FinishFuture {
        self.inner.life.finish()
    }

    fn subscribe(&self) -> EventStream {
        self.inner.life.bus().subscribe()
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        self.inner.life.latch().wait()
    }
}
