//! Error types used by processors and the tasks they run.
//!
//! Everything that can go wrong with a task is a [`TaskError`]. Errors fall into
//! three groups:
//!
//! - **Transient**: retryable, absorbed by the retry loop while budget remains
//!   ([`TaskError::Transient`], [`TaskError::Timeout`] by default; the
//!   [`RetryPolicy`](crate::RetryPolicy) predicate may classify more).
//! - **Permanent**: any other runtime failure, or a transient one once the
//!   retry budget is exhausted.
//! - **Structural**: misuse of a processor (unknown kind, missing route,
//!   calling after `finish()`). Never retried, whatever the predicate says.
//!
//! The `Display` output of every variant is a stable code (`worker:finishing`,
//! `argument.invalid.task.kind`, ...) because it travels across the worker
//! boundary and ends up in logs.

use std::any::Any;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when an error carries nothing printable.
pub const UNKNOWN_ERROR: &str = "error.unknown";

/// # Errors produced by task execution and processor misuse.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum TaskError {
    /// Task failed; considered permanent unless the retry predicate says otherwise.
    #[error("{message}")]
    Failed {
        /// Normalised failure message.
        message: String,
    },

    /// Task failed but may succeed if retried.
    #[error("{message}")]
    Transient {
        /// Failure message.
        message: String,
    },

    /// One attempt exceeded the configured task timeout.
    #[error("task.timeout:{timeout_ms}ms")]
    Timeout {
        /// The timeout that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// No handler exists for the task kind.
    #[error("unknown.task:{kind}")]
    UnknownTask {
        /// The kind that was requested.
        kind: String,
    },

    /// The task kind has no route separator.
    #[error("argument.invalid.task.kind")]
    InvalidKind {
        /// The offending kind.
        kind: String,
    },

    /// The route prefix names no child processor.
    #[error("argument.invalid.task.prefix")]
    InvalidPrefix {
        /// The offending prefix.
        prefix: String,
    },

    /// The processor no longer accepts work.
    #[error("worker:finishing")]
    Finishing,

    /// A proxy was asked to finish the processor it forwards to.
    #[error("invalidop.proxy.finish")]
    ProxyFinish,

    /// The worker transport went away before the stream terminated.
    #[error("worker:disconnected")]
    Disconnected,
}

impl TaskError {
    /// Builds a permanent failure from anything printable.
    ///
    /// Empty messages become [`UNKNOWN_ERROR`].
    ///
    /// # Example
    /// ```
    /// use taskproc::TaskError;
    ///
    /// assert_eq!(TaskError::normalize("boom").to_string(), "boom");
    /// assert_eq!(TaskError::normalize("").to_string(), "error.unknown");
    /// ```
    pub fn normalize(msg: impl std::fmt::Display) -> Self {
        let message = msg.to_string();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        };
        TaskError::Failed { message }
    }

    /// Builds the transient marker error.
    pub fn transient(msg: impl Into<String>) -> Self {
        TaskError::Transient {
            message: msg.into(),
        }
    }

    /// Builds a timeout error for the given duration.
    pub fn timeout(d: Duration) -> Self {
        TaskError::Timeout {
            timeout_ms: d.as_millis().min(u128::from(u64::MAX)) as u64,
        }
    }

    /// Normalises a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(s) = payload.downcast_ref::<&'static str>() {
            return TaskError::normalize(s);
        }
        if let Some(s) = payload.downcast_ref::<String>() {
            return TaskError::normalize(s);
        }
        TaskError::normalize(UNKNOWN_ERROR)
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskproc::TaskError;
    ///
    /// assert_eq!(TaskError::Finishing.as_label(), "processor_finishing");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Failed { .. } => "task_failed",
            TaskError::Transient { .. } => "task_transient",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::UnknownTask { .. } => "task_unknown",
            TaskError::InvalidKind { .. } => "task_invalid_kind",
            TaskError::InvalidPrefix { .. } => "task_invalid_prefix",
            TaskError::Finishing => "processor_finishing",
            TaskError::ProxyFinish => "proxy_finish",
            TaskError::Disconnected => "worker_disconnected",
        }
    }

    /// Default transient classification: the marker type and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Transient { .. } | TaskError::Timeout { .. })
    }

    /// Misuse and lost-transport errors; surfaced immediately, never retried.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TaskError::UnknownTask { .. }
                | TaskError::InvalidKind { .. }
                | TaskError::InvalidPrefix { .. }
                | TaskError::Finishing
                | TaskError::ProxyFinish
                | TaskError::Disconnected
        )
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        TaskError::normalize(s)
    }
}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        TaskError::normalize(s)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::normalize(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_codes_are_stable() {
        assert_eq!(
            TaskError::UnknownTask { kind: "mul".into() }.to_string(),
            "unknown.task:mul"
        );
        assert_eq!(
            TaskError::InvalidKind { kind: "x".into() }.to_string(),
            "argument.invalid.task.kind"
        );
        assert_eq!(
            TaskError::InvalidPrefix { prefix: "x".into() }.to_string(),
            "argument.invalid.task.prefix"
        );
        assert_eq!(TaskError::Finishing.to_string(), "worker:finishing");
        assert_eq!(TaskError::ProxyFinish.to_string(), "invalidop.proxy.finish");
    }

    #[test]
    fn classification() {
        assert!(TaskError::transient("flaky").is_transient());
        assert!(TaskError::timeout(Duration::from_millis(5)).is_transient());
        assert!(!TaskError::normalize("boom").is_transient());
        assert!(TaskError::Finishing.is_structural());
        assert!(TaskError::Disconnected.is_structural());
        assert!(!TaskError::transient("flaky").is_structural());
    }

    #[test]
    fn panic_payloads_are_normalized() {
        let err = TaskError::from_panic(Box::new("kaput"));
        assert_eq!(err.to_string(), "kaput");
        let err = TaskError::from_panic(Box::new(42_u8));
        assert_eq!(err.to_string(), UNKNOWN_ERROR);
    }

    #[test]
    fn wire_shape_is_tagged() {
        let json = serde_json::to_value(TaskError::transient("later")).unwrap();
        assert_eq!(json["code"], "transient");
        assert_eq!(json["message"], "later");
        let back: TaskError = serde_json::from_value(json).unwrap();
        assert_eq!(back, TaskError::transient("later"));
    }
}
