//! # LogWriter: processor events as tracing lines
//!
//! A subscriber that turns every [`Event`] into one structured `tracing`
//! record. Restarts and permanent failures log at `warn`, the rest at `info`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  task started task=svc1/add#6f1c.. attempt=1
//! WARN  task restarted task=svc1/add#6f1c.. attempt=2 delay_ms=100 error=busy
//! INFO  task result task=svc1/add#6f1c.. attempt=2 value=3
//! INFO  task completed task=svc1/add#6f1c.. attempt=2
//! WARN  task failed task=svc1/div#a90e.. attempt=1 error=division by zero
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = &e.task;
        let attempt = e.attempt.unwrap_or(1);
        match e.kind {
            EventKind::TaskStarted => {
                info!(%task, attempt, "task started");
            }
            EventKind::TaskRestarted => {
                let error = e.error.as_ref().map(ToString::to_string).unwrap_or_default();
                warn!(%task, attempt, delay_ms = e.delay_ms.unwrap_or(0), %error, "task restarted");
            }
            EventKind::TaskResult => {
                let value = e.value.as_ref().map(ToString::to_string).unwrap_or_default();
                info!(%task, attempt, %value, "task result");
            }
            EventKind::TaskFailed => {
                let error = e.error.as_ref().map(ToString::to_string).unwrap_or_default();
                warn!(%task, attempt, %error, "task failed");
            }
            EventKind::TaskCompleted => {
                info!(%task, attempt, "task completed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
