//! # The task value.
//!
//! A [`Task`] names an operation through its `kind`, carries an optional JSON
//! `payload` and a correlation `uid`. Tasks are immutable: every `with_*`
//! method returns a new value and leaves the original untouched, so a router
//! can re-kind a task without the caller ever seeing the change.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Unit of work submitted to a [`Processor`](crate::Processor).
///
/// # Example
/// ```
/// use serde_json::json;
/// use taskproc::Task;
///
/// let t = Task::new("svc1/add").with_payload(json!([1, 2]));
/// let inner = t.with_kind("add");
///
/// assert_eq!(t.kind(), "svc1/add");
/// assert_eq!(inner.kind(), "add");
/// assert_eq!(inner.uid(), t.uid());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default = "new_uid")]
    uid: String,
}

impl Task {
    /// Creates a task with a freshly generated uid and no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            uid: new_uid(),
        }
    }

    /// Operation selector.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Optional argument.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Correlation id.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Returns a copy with the given payload.
    #[must_use]
    pub fn with_payload(&self, payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..self.clone()
        }
    }

    /// Returns a copy with the given uid.
    #[must_use]
    pub fn with_uid(&self, uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..self.clone()
        }
    }

    /// Returns a copy with a different kind (same payload and uid).
    #[must_use]
    pub fn with_kind(&self, kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..self.clone()
        }
    }

    /// Returns a copy whose kind is `prefix + separator + kind`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str, separator: &str) -> Self {
        self.with_kind(format!("{prefix}{separator}{}", self.kind))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uids_are_unique() {
        let a = Task::new("a");
        let b = Task::new("a");
        assert_ne!(a.uid(), b.uid());
        assert!(!a.uid().is_empty());
    }

    #[test]
    fn rewrites_do_not_mutate() {
        let t = Task::new("taskA").with_payload(json!(10));
        let routed = t.prefixed("svc1", "/");
        assert_eq!(t.kind(), "taskA");
        assert_eq!(routed.kind(), "svc1/taskA");
        assert_eq!(routed.payload(), Some(&json!(10)));
        assert_eq!(routed.uid(), t.uid());
    }

    #[test]
    fn missing_uid_is_generated_on_decode() {
        let t: Task = serde_json::from_value(json!({ "kind": "ping" })).unwrap();
        assert_eq!(t.kind(), "ping");
        assert!(t.payload().is_none());
        assert!(!t.uid().is_empty());
    }
}
