use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use taskproc::{
    DirectProcessor, EventKind, Processor, ProcessorConfig, ProcessorExt, RetryPolicy,
    RouterConfig, RouterProcessor, RouterProxy, SequentialConfig, SequentialProcessor, Service,
    Task, TaskError, TaskOutput,
};

fn math() -> Service {
    Service::new()
        .method("add", |p| {
            let sum: i64 = p
                .as_ref()
                .and_then(|v| v.as_array())
                .map(|xs| xs.iter().filter_map(|x| x.as_i64()).sum())
                .unwrap_or(0);
            TaskOutput::value(json!(sum))
        })
        .method("div", |p| {
            let (a, b) = match p.as_ref().and_then(|v| v.as_array()) {
                Some(xs) if xs.len() == 2 => (xs[0].as_f64(), xs[1].as_f64()),
                _ => (None, None),
            };
            match (a, b) {
                (Some(_), Some(b)) if b == 0.0 => TaskOutput::error("division by zero"),
                (Some(a), Some(b)) => TaskOutput::value(json!(a / b)),
                _ => TaskOutput::error("bad operands"),
            }
        })
}

fn jobs() -> SequentialProcessor {
    let cfg = SequentialConfig::named("jobs").with_retry(RetryPolicy {
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        ..RetryPolicy::default()
    });
    SequentialProcessor::new(
        |t: &Task| {
            let ms = t.payload().and_then(|v| v.as_u64()).unwrap_or(0);
            let kind = t.kind().to_string();
            TaskOutput::future(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(kind))
            })
        },
        cfg,
    )
}

fn router() -> Arc<RouterProcessor> {
    Arc::new(
        RouterProcessor::builder(RouterConfig::default())
            .route(
                "math",
                DirectProcessor::from_service(math(), ProcessorConfig::named("math")),
            )
            .route("jobs", jobs())
            .build(),
    )
}

#[tokio::test]
async fn routes_to_each_child() {
    let r = router();
    assert_eq!(
        r.collect(Task::new("math/add").with_payload(json!([1, 2, 3])))
            .await
            .unwrap(),
        vec![json!(6)]
    );
    assert_eq!(
        r.collect(Task::new("jobs/resize").with_payload(json!(5)))
            .await
            .unwrap(),
        vec![json!("resize")]
    );
    assert_eq!(
        r.collect(Task::new("math/div").with_payload(json!([1, 0])))
            .await
            .unwrap_err()
            .to_string(),
        "division by zero"
    );
    assert_eq!(
        r.collect(Task::new("math/mul")).await.unwrap_err(),
        TaskError::UnknownTask { kind: "mul".into() }
    );
}

#[tokio::test]
async fn merged_events_report_fully_qualified_kinds() {
    let r = router();
    let mut events = r.subscribe();

    let a = Task::new("math/add").with_payload(json!([2, 2]));
    let b = Task::new("jobs/index").with_payload(json!(1));
    r.collect(a.clone()).await.unwrap();
    r.collect(b.clone()).await.unwrap();
    r.finish().await.unwrap();

    let mut seen = Vec::new();
    while let Some(ev) = events.next().await {
        seen.push((ev.kind, ev.task.kind().to_string(), ev.task.uid().to_string()));
    }
    for (kind, task) in [(EventKind::TaskStarted, &a), (EventKind::TaskCompleted, &b)] {
        assert!(
            seen.contains(&(kind, task.kind().to_string(), task.uid().to_string())),
            "missing {kind:?} for {task}"
        );
    }
    assert!(seen.iter().all(|(_, k, _)| k.starts_with("math/") || k.starts_with("jobs/")));
}

#[tokio::test]
async fn proxy_sees_only_its_route() {
    let r = router();
    let math = RouterProxy::of(&r, "math");
    let mut results = math.on_task_result();

    r.collect(Task::new("jobs/x")).await.unwrap();
    let out = math
        .collect(Task::new("add").with_payload(json!([40, 2])))
        .await
        .unwrap();
    assert_eq!(out, vec![json!(42)]);

    let ev = results.next().await.unwrap();
    assert_eq!(ev.task.kind(), "add");
    assert_eq!(ev.value, Some(json!(42)));

    assert_eq!(math.finish().await, Err(TaskError::ProxyFinish));
    assert!(r.is_alive());
    r.finish().await.unwrap();
    assert!(!math.is_alive());
}

#[tokio::test]
async fn finish_drains_every_route() {
    let r = router();
    let slow = r.process(Task::new("jobs/slow").with_payload(json!(20)));
    let fast = r.process(Task::new("math/add").with_payload(json!([1])));

    let finishing = r.finish();
    assert_eq!(
        r.collect(Task::new("math/add")).await.unwrap_err(),
        TaskError::Finishing
    );

    let (slow, fast) = tokio::join!(slow.collect::<Vec<_>>(), fast.collect::<Vec<_>>());
    assert_eq!(slow, vec![Ok(json!("slow"))]);
    assert_eq!(fast, vec![Ok(json!(1))]);
    finishing.await.unwrap();
    r.finished().await;
}
