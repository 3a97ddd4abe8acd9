//! # Events emitted while processors run tasks.
//!
//! Every event refers to the [`Task`] it concerns. Events that carry extra
//! data set the matching optional field:
//!
//! | kind            | `value` | `error` | `attempt` | `delay_ms` |
//! |-----------------|---------|---------|-----------|------------|
//! | `TaskStarted`   |         |         | 1         |            |
//! | `TaskRestarted` |         | last    | n > 1     | waited     |
//! | `TaskResult`    | yes     |         | yes       |            |
//! | `TaskFailed`    |         | yes     | yes       |            |
//! | `TaskCompleted` |         |         | yes       |            |
//!
//! ## Ordering guarantees
//! Each event has a global sequence number (`seq`) that increases
//! monotonically; use it to restore order across merged streams.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use taskproc::{Event, EventKind, Task};
//!
//! let ev = Event::new(EventKind::TaskResult, Task::new("svc/add"))
//!     .with_value(json!(3))
//!     .with_attempt(1);
//!
//! assert_eq!(ev.kind, EventKind::TaskResult);
//! assert_eq!(ev.value, Some(json!(3)));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::error::TaskError;
use crate::tasks::Task;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of instrumentation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First attempt of a task is starting.
    TaskStarted,
    /// A retry attempt is starting.
    TaskRestarted,
    /// The task produced a value.
    TaskResult,
    /// The task failed permanently; the error reached the caller.
    TaskFailed,
    /// The task completed normally.
    TaskCompleted,
}

impl EventKind {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::TaskStarted => "started",
            EventKind::TaskRestarted => "restarted",
            EventKind::TaskResult => "result",
            EventKind::TaskFailed => "failed",
            EventKind::TaskCompleted => "completed",
        }
    }
}

/// Instrumentation event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// The task, with its kind as seen by the observer.
    pub task: Task,
    /// Produced value (`TaskResult`).
    pub value: Option<Value>,
    /// Failure (`TaskFailed`, and the triggering error on `TaskRestarted`).
    pub error: Option<TaskError>,
    /// Attempt number, starting from 1.
    pub attempt: Option<u32>,
    /// Backoff waited before a restart, in milliseconds.
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates an event with the current timestamp and next sequence number.
    pub fn new(kind: EventKind, task: Task) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task,
            value: None,
            error: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Attaches a produced value.
    #[inline]
    pub fn with_value(mut self, v: Value) -> Self {
        self.value = Some(v);
        self
    }

    /// Attaches an error.
    #[inline]
    pub fn with_error(mut self, e: TaskError) -> Self {
        self.error = Some(e);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Replaces the task, keeping `seq` and everything else.
    #[inline]
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }
}
