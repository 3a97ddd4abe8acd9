//! # Wire messages exchanged across the worker boundary.
//!
//! Requests flow foreground → background as [`WorkerItem`], responses flow
//! back as [`WorkerItemResponse`]. Both are internally tagged on `kind`, so the
//! JSON shape is the contract:
//!
//! ```text
//! {"kind":"process","uid":"7c..","task":{"kind":"add","payload":[1,2],"uid":".."}}
//! {"kind":"unsubscribe","uid":"7c.."}
//! {"kind":"terminate","uid":"__terminate__"}
//!
//! {"kind":"N","uid":"7c..","valueOrError":3}
//! {"kind":"E","uid":"7c..","valueOrError":{"code":"failed","message":"boom"}}
//! {"kind":"C","uid":"7c.."}
//! ```
//!
//! Per uid the background emits `N* (E | C)` and nothing after the terminal
//! message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TaskError;
use crate::tasks::Task;

/// Reserved correlation id of the terminate handshake.
pub const TERMINATE_UID: &str = "__terminate__";

/// Request sent to the background half.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkerItem {
    /// Run `task`, streaming its results back under `uid`.
    Process { uid: String, task: Task },
    /// Finish the wrapped processor.
    Terminate { uid: String },
    /// Stop streaming results for `uid`; nothing is sent back.
    Unsubscribe { uid: String },
}

impl WorkerItem {
    pub fn uid(&self) -> &str {
        match self {
            WorkerItem::Process { uid, .. }
            | WorkerItem::Terminate { uid }
            | WorkerItem::Unsubscribe { uid } => uid,
        }
    }

    /// The terminate request, always under [`TERMINATE_UID`].
    pub fn terminate() -> Self {
        WorkerItem::Terminate {
            uid: TERMINATE_UID.to_string(),
        }
    }
}

/// Notification sent back to the foreground half.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkerItemResponse {
    /// One value.
    #[serde(rename = "N")]
    Next {
        uid: String,
        #[serde(rename = "valueOrError")]
        value: Value,
    },
    /// Terminal error.
    #[serde(rename = "E")]
    Error {
        uid: String,
        #[serde(rename = "valueOrError")]
        error: TaskError,
    },
    /// Terminal completion.
    #[serde(rename = "C")]
    Complete { uid: String },
}

impl WorkerItemResponse {
    pub fn uid(&self) -> &str {
        match self {
            WorkerItemResponse::Next { uid, .. }
            | WorkerItemResponse::Error { uid, .. }
            | WorkerItemResponse::Complete { uid } => uid,
        }
    }

    /// Whether this message ends the stream for its uid.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerItemResponse::Next { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_match_the_wire_shape() {
        let task = Task::new("add").with_payload(json!([1, 2])).with_uid("t1");
        let item = WorkerItem::Process {
            uid: "u1".into(),
            task,
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "kind": "process",
                "uid": "u1",
                "task": { "kind": "add", "payload": [1, 2], "uid": "t1" }
            })
        );
        assert_eq!(
            serde_json::to_value(WorkerItem::terminate()).unwrap(),
            json!({ "kind": "terminate", "uid": TERMINATE_UID })
        );
        let unsub: WorkerItem =
            serde_json::from_value(json!({ "kind": "unsubscribe", "uid": "u1" })).unwrap();
        assert_eq!(unsub.uid(), "u1");
    }

    #[test]
    fn responses_match_the_wire_shape() {
        let n = WorkerItemResponse::Next {
            uid: "u".into(),
            value: json!(1),
        };
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            json!({ "kind": "N", "uid": "u", "valueOrError": 1 })
        );
        let c = serde_json::to_value(WorkerItemResponse::Complete { uid: "u".into() }).unwrap();
        assert_eq!(c, json!({ "kind": "C", "uid": "u" }));

        let e: WorkerItemResponse = serde_json::from_value(json!({
            "kind": "E",
            "uid": "u",
            "valueOrError": { "code": "finishing" }
        }))
        .unwrap();
        assert_eq!(
            e,
            WorkerItemResponse::Error {
                uid: "u".into(),
                error: TaskError::Finishing
            }
        );
        assert!(e.is_terminal());
        assert!(!n.is_terminal());
    }
}
