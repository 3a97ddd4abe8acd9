//! # One attempt of a task, and the events around it.
//!
//! Shared by the direct and sequential processors. Responsibilities:
//! - **Execute ONE attempt** through [`try_run`] (panic-safe normalisation)
//! - **Forward values** to the caller's [`ResultSink`] and publish `TaskResult`
//! - **Apply timeout** if configured (wraps the attempt; delivery never waits)
//! - **Decide** between retry and give-up via [`RetryPolicy`]
//!
//! ## Event flow
//! ```text
//! publish_start ──► TaskStarted (attempt 1) | TaskRestarted (attempt n)
//! run_attempt   ──► TaskResult per value
//!               ├─ Completed ──► publish_completed ──► TaskCompleted
//!               ├─ Failed(e) ──► decide():
//!               │                 ├─ Retry(delay) ─► caller sleeps, loops
//!               │                 └─ GiveUp ───────► publish_failed ─► TaskFailed
//!               └─ Abandoned ──► caller dropped the stream, nothing more
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;
use tracing::warn;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;
use crate::tasks::{try_run, Task, TaskRunner, TaskStream};

/// Backlog at which a direct processor reports a lagging caller.
pub(crate) const DIRECT_LAG_LIMIT: usize = 64;

/// Producer side of a caller's result stream.
///
/// Delivery never waits for the caller: items queue up until read, so a slow
/// reader can neither stall the producer nor eat into its timeout. Crossing
/// `lag_limit` unread items is reported once per crossing.
#[derive(Clone, Debug)]
pub(crate) struct ResultSink {
    tx: mpsc::UnboundedSender<Result<Value, TaskError>>,
    backlog: Arc<AtomicUsize>,
    lag_limit: usize,
}

impl ResultSink {
    /// Delivers one item; `false` once the caller is gone.
    pub(crate) fn send(&self, item: Result<Value, TaskError>) -> bool {
        let backlog = self.backlog.fetch_add(1, Ordering::AcqRel) + 1;
        if self.tx.send(item).is_err() {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        if backlog == self.lag_limit + 1 {
            warn!(backlog, lag_limit = self.lag_limit, "caller is not reading its results");
        }
        true
    }

    /// Items delivered but not read yet.
    pub(crate) fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the caller drops its stream.
    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Creates a caller stream and the sink feeding it.
pub(crate) fn result_channel(lag_limit: usize) -> (ResultSink, TaskStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let backlog = Arc::new(AtomicUsize::new(0));
    let read = Arc::clone(&backlog);
    let stream = stream::unfold(rx, move |mut rx| {
        let read = Arc::clone(&read);
        async move {
            match rx.recv().await {
                Some(item) => {
                    read.fetch_sub(1, Ordering::AcqRel);
                    Some((item, rx))
                }
                None => None,
            }
        }
    })
    .boxed();
    (
        ResultSink {
            tx,
            backlog,
            lag_limit: lag_limit.max(1),
        },
        stream,
    )
}

/// How one attempt ended.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Completed,
    Failed(TaskError),
    Abandoned,
}

/// What to do after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry(Duration),
    GiveUp,
}

/// Applies the retry policy after `failures` failed attempts.
pub(crate) fn decide(
    policy: &RetryPolicy,
    err: &TaskError,
    failures: u32,
    prev_delay: Duration,
) -> Decision {
    if policy.should_retry(err, failures) {
        Decision::Retry(policy.delay_for(prev_delay, failures))
    } else {
        Decision::GiveUp
    }
}

/// Executes a single attempt, forwarding every value to `sink`.
pub(crate) async fn run_attempt(
    runner: &dyn TaskRunner,
    task: &Task,
    attempt: u32,
    timeout: Option<Duration>,
    sink: &ResultSink,
    bus: &Bus,
) -> AttemptOutcome {
    let drive = async {
        let mut results = try_run(runner, task);
        while let Some(item) = results.next().await {
            match item {
                Ok(value) => {
                    bus.publish(
                        Event::new(EventKind::TaskResult, task.clone())
                            .with_value(value.clone())
                            .with_attempt(attempt),
                    );
                    if !sink.send(Ok(value)) {
                        return AttemptOutcome::Abandoned;
                    }
                }
                Err(e) => return AttemptOutcome::Failed(e),
            }
        }
        AttemptOutcome::Completed
    };

    match timeout.filter(|d| !d.is_zero()) {
        Some(dur) => time::timeout(dur, drive)
            .await
            .unwrap_or_else(|_elapsed| AttemptOutcome::Failed(TaskError::timeout(dur))),
        None => drive.await,
    }
}

/// Publishes `TaskStarted` for the first attempt, `TaskRestarted` afterwards.
pub(crate) fn publish_start(
    bus: &Bus,
    task: &Task,
    attempt: u32,
    last: Option<(&TaskError, Duration)>,
) {
    let ev = match last {
        None => Event::new(EventKind::TaskStarted, task.clone()),
        Some((err, delay)) => Event::new(EventKind::TaskRestarted, task.clone())
            .with_error(err.clone())
            .with_delay(delay),
    };
    bus.publish(ev.with_attempt(attempt));
}

pub(crate) fn publish_completed(bus: &Bus, task: &Task, attempt: u32) {
    bus.publish(Event::new(EventKind::TaskCompleted, task.clone()).with_attempt(attempt));
}

/// Delivers the permanent error to the caller and publishes `TaskFailed`.
pub(crate) fn give_up(sink: &ResultSink, bus: &Bus, task: &Task, attempt: u32, err: TaskError) {
    let _ = sink.send(Err(err.clone()));
    bus.publish(
        Event::new(EventKind::TaskFailed, task.clone())
            .with_error(err)
            .with_attempt(attempt),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskOutput;
    use serde_json::json;

    #[tokio::test]
    async fn values_are_forwarded_and_published() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let (sink, results) = result_channel(8);
        let runner = |_: &Task| TaskOutput::values(vec![json!(1), json!(2)]);

        let outcome = run_attempt(&runner, &Task::new("t"), 1, None, &sink, &bus).await;
        assert!(matches!(outcome, AttemptOutcome::Completed));
        drop(sink);

        let got: Vec<_> = results.collect().await;
        assert_eq!(got, vec![Ok(json!(1)), Ok(json!(2))]);
        let ev = events.next().await.unwrap();
        assert_eq!(ev.kind, EventKind::TaskResult);
        assert_eq!(ev.value, Some(json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_the_attempt() {
        let bus = Bus::new(4);
        let (sink, _results) = result_channel(8);
        let runner = |_: &Task| {
            TaskOutput::future(async {
                time::sleep(Duration::from_secs(10)).await;
                Ok(json!("late"))
            })
        };
        let outcome = run_attempt(
            &runner,
            &Task::new("slow"),
            1,
            Some(Duration::from_millis(50)),
            &sink,
            &bus,
        )
        .await;
        match outcome {
            AttemptOutcome::Failed(e) => assert_eq!(e, TaskError::timeout(Duration::from_millis(50))),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_caller_abandons() {
        let bus = Bus::new(4);
        let (sink, results) = result_channel(1);
        drop(results);
        let runner = |_: &Task| TaskOutput::value(1);
        let outcome = run_attempt(&runner, &Task::new("t"), 1, None, &sink, &bus).await;
        assert!(matches!(outcome, AttemptOutcome::Abandoned));
    }

    #[tokio::test(start_paused = true)]
    async fn unread_results_do_not_count_against_timeout() {
        let bus = Bus::new(4);
        let (sink, results) = result_channel(1);
        let runner = |_: &Task| TaskOutput::values(vec![json!(1), json!(2), json!(3)]);

        let outcome = run_attempt(
            &runner,
            &Task::new("burst"),
            1,
            Some(Duration::from_millis(50)),
            &sink,
            &bus,
        )
        .await;
        assert!(matches!(outcome, AttemptOutcome::Completed));
        assert_eq!(sink.backlog(), 3);

        time::sleep(Duration::from_millis(200)).await;
        drop(sink);
        let got: Vec<_> = results.collect().await;
        assert_eq!(got, vec![Ok(json!(1)), Ok(json!(2)), Ok(json!(3))]);
    }

    #[test]
    fn decide_uses_clamped_delay() {
        let policy = RetryPolicy {
            max_retries: 2,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            ..RetryPolicy::default()
        };
        let flaky = TaskError::transient("busy");
        assert_eq!(
            decide(&policy, &flaky, 1, Duration::ZERO),
            Decision::Retry(Duration::from_millis(10))
        );
        assert_eq!(decide(&policy, &flaky, 2, Duration::ZERO), Decision::GiveUp);
    }
}
