//! # SequentialProcessor: one attempt at a time.
//!
//! Tasks are queued and a single loop executes exactly one attempt at any
//! instant. New work and pending retries live in separate queues; the loop
//! alternates between them so neither starves while both hold work.
//!
//! ## Architecture
//! ```text
//! process(task) ──► WorkState{retries: 0} ──► fresh queue ─┐
//!                                                          ├─► pick() ─► execute() ─► next tick
//! backoff timer ──► WorkState{retries: n} ──► retry queue ─┘     ▲
//!                                                                │
//!                               inter_task_delay between ticks ──┘
//! ```
//!
//! ## Rules
//! - Fresh tasks start in submission order; retries compete with them.
//! - Each attempt runs under `task_timeout`; expiry is a transient error.
//!   Results are queued for the caller, so reading slowly never stalls the
//!   loop or counts against the timeout.
//! - A task whose caller dropped the stream while it waited is discarded
//!   without running.
//! - A retry is re-queued only after its backoff elapsed; the loop keeps
//!   serving other work meanwhile.
//! - The loop parks when both queues are empty and is restarted by the
//!   next push.
//! - After `finish()` the processor closes once every queued task and all of
//!   its retries have terminated.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time;
use tracing::debug;

use crate::config::SequentialConfig;
use crate::core::attempt::{self, AttemptOutcome, Decision, ResultSink};
use crate::core::lifecycle::{InFlight, Lifecycle};
use crate::core::queue::DualQueue;
use crate::core::{failed, FinishFuture, Processor};
use crate::error::TaskError;
use crate::events::{Bus, EventStream};
use crate::tasks::{RunnerRef, Task, TaskRunner, TaskStream};

/// Per-task retry state, alive until the task's stream terminates.
struct WorkState {
    task: Task,
    sink: ResultSink,
    delay: Duration,
    retries: u32,
    last_error: Option<TaskError>,
    _guard: InFlight,
}

#[derive(Default)]
struct Schedule {
    queue: DualQueue<WorkState>,
    running: bool,
}

/// Runs at most one attempt at a time, alternating fresh work and retries.
pub struct SequentialProcessor {
    inner: Arc<SequentialInner>,
}

struct SequentialInner {
    cfg: SequentialConfig,
    runner: RunnerRef,
    life: Arc<Lifecycle>,
    schedule: Mutex<Schedule>,
}

impl SequentialProcessor {
    /// Creates a processor calling `runner` for each attempt.
    pub fn new(runner: impl TaskRunner, cfg: SequentialConfig) -> Self {
        Self::from_runner(Arc::new(runner), cfg)
    }

    /// Same as [`SequentialProcessor::new`] for an already shared runner.
    pub fn from_runner(runner: RunnerRef, cfg: SequentialConfig) -> Self {
        let life = Lifecycle::new(cfg.caption.clone(), Bus::new(cfg.bus_capacity));
        Self {
            inner: Arc::new(SequentialInner {
                cfg,
                runner,
                life,
                schedule: Mutex::new(Schedule::default()),
            }),
        }
    }

    /// Number of queued tasks (fresh and retries) not yet picked.
    pub fn queued(&self) -> usize {
        self.inner.lock_schedule().queue.len()
    }

    /// Number of tasks whose result stream has not terminated yet.
    pub fn in_flight(&self) -> usize {
        self.inner.life.in_flight()
    }
}

impl SequentialInner {
    fn lock_schedule(&self) -> std::sync::MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues `work` and wakes the loop if it is parked.
    fn schedule(self: &Arc<Self>, work: WorkState) {
        let wake = {
            let mut sched = self.lock_schedule();
            if work.retries == 0 {
                sched.queue.push_fresh(work);
            } else {
                sched.queue.push_retry(work);
            }
            !std::mem::replace(&mut sched.running, true)
        };
        if wake {
            tokio::spawn(Arc::clone(self).run_loop());
        }
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            if self.cfg.inter_task_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                time::sleep(self.cfg.inter_task_delay).await;
            }

            let work = {
                let mut sched = self.lock_schedule();
                match sched.queue.pick() {
                    Some(work) => work,
                    None => {
                        sched.running = false;
                        return;
                    }
                }
            };
            if work.sink.is_closed() {
                debug!(processor = %self.cfg.caption, task = %work.task, "dropped before start");
                continue;
            }
            self.execute(work).await;
        }
    }

    async fn execute(self: &Arc<Self>, mut work: WorkState) {
        let bus = self.life.bus();
        let attempt = work.retries + 1;
        let last = work.last_error.as_ref().map(|e| (e, work.delay));
        attempt::publish_start(bus, &work.task, attempt, last);

        let outcome = attempt::run_attempt(
            self.runner.as_ref(),
            &work.task,
            attempt,
            self.cfg.timeout_opt(),
            &work.sink,
            bus,
        )
        .await;

        let err = match outcome {
            AttemptOutcome::Completed => {
                attempt::publish_completed(bus, &work.task, attempt);
                return;
            }
            AttemptOutcome::Abandoned => {
                debug!(processor = %self.cfg.caption, task = %work.task, "caller went away");
                return;
            }
            AttemptOutcome::Failed(err) => err,
        };

        work.retries += 1;
        match attempt::decide(&self.cfg.retry, &err, work.retries, work.delay) {
            Decision::Retry(delay) if !work.sink.is_closed() => {
                debug!(
                    processor = %self.cfg.caption,
                    task = %work.task,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retry scheduled"
                );
                work.delay = delay;
                work.last_error = Some(err);
                let this = Arc::clone(self);
                let sink = work.sink.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = time::sleep(delay) => this.schedule(work),
                        _ = sink.closed() => {}
                    }
                });
            }
            Decision::Retry(_) => {}
            Decision::GiveUp => {
                attempt::give_up(&work.sink, bus, &work.task, attempt, err);
            }
        }
    }
}

impl Processor for SequentialProcessor {
    fn caption(&self) -> &str {
        &self.inner.cfg.caption
    }

    fn process(&self, task: Task) -> TaskStream {
        let Some(guard) = self.inner.life.admit() else {
            debug!(processor = %self.inner.cfg.caption, task = %task, "rejected: finishing");
            return failed(TaskError::Finishing);
        };
        let (sink, results) = attempt::result_channel(self.inner.cfg.buffer_size_clamped());
        self.inner.schedule(WorkState {
            task,
            sink,
            delay: Duration::ZERO,
            retries: 0,
            last_error: None,
            _guard: guard,
        });
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
