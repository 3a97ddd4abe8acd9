//! # Method tables dispatched by task kind.
//!
//! A [`Service`] maps method names to handlers. Used as a [`TaskRunner`], the
//! task `kind` selects the handler and the `payload` becomes its single
//! argument. Falsy payloads (`null`, `false`, `0`, `""`) are passed as `None`.
//! Unknown kinds fail with [`TaskError::UnknownTask`], which is never retried.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TaskError;
use crate::tasks::{Task, TaskOutput, TaskRunner};

/// A single service method.
pub type Handler = Arc<dyn Fn(Option<Value>) -> TaskOutput + Send + Sync>;

/// Named methods reachable through task kinds.
///
/// # Example
/// ```
/// use serde_json::json;
/// use taskproc::{Service, TaskOutput};
///
/// let svc = Service::new()
///     .method("ping", |_| TaskOutput::value("pong"))
///     .method("double", |p| {
///         let n = p.and_then(|v| v.as_i64()).unwrap_or(0);
///         TaskOutput::value(json!(n * 2))
///     });
/// assert_eq!(svc.names(), vec!["double", "ping"]);
/// ```
#[derive(Clone, Default)]
pub struct Service {
    methods: HashMap<String, Handler>,
}

impl Service {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a method.
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<Value>) -> TaskOutput + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Sorted method names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("methods", &self.names())
            .finish()
    }
}

fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

impl TaskRunner for Service {
    fn run(&self, task: &Task) -> TaskOutput {
        match self.methods.get(task.kind()) {
            Some(handler) => {
                let arg = task.payload().filter(|v| !is_falsy(v)).cloned();
                handler(arg)
            }
            None => TaskOutput::error(TaskError::UnknownTask {
                kind: task.kind().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn svc() -> Service {
        Service::new().method("echo", |p| TaskOutput::value(json!({ "arg": p })))
    }

    async fn first(out: TaskOutput) -> Result<Value, TaskError> {
        out.into_stream().next().await.unwrap()
    }

    #[tokio::test]
    async fn dispatches_by_kind_with_payload() {
        let task = Task::new("echo").with_payload(json!(7));
        assert_eq!(first(svc().run(&task)).await, Ok(json!({ "arg": 7 })));
    }

    #[tokio::test]
    async fn falsy_payload_is_omitted() {
        for falsy in [json!(null), json!(false), json!(0), json!("")] {
            let task = Task::new("echo").with_payload(falsy);
            assert_eq!(first(svc().run(&task)).await, Ok(json!({ "arg": null })));
        }
    }

    #[tokio::test]
    async fn unknown_kind_fails() {
        let err = first(svc().run(&Task::new("nope"))).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown.task:nope");
        assert!(err.is_structural());
    }
}
