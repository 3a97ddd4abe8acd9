//! # Example: routed_services
//!
//! Two services behind one router: a concurrent calculator and a sequential
//! job queue. Callers address them as `math/...` and `jobs/...`; a proxy
//! lets one component talk to `jobs` without knowing the prefix.
//!
//! ## Flow
//! ```text
//! router.process("math/add") ─► math: DirectProcessor(Service) ─► "add"
//! router.process("jobs/thumb") ─► jobs: SequentialProcessor ─► "thumb"
//! proxy("jobs").process("index") ─► router.process("jobs/index")
//! router.finish() ─► math.finish() + jobs.finish()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=taskproc=debug cargo run --example routed_services
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use taskproc::{
    DirectProcessor, LoggedProcessor, Processor, ProcessorConfig, ProcessorExt, RouterConfig,
    RouterProcessor, RouterProxy, SequentialConfig, SequentialProcessor, Service, Task,
    TaskOutput,
};
use tracing_subscriber::EnvFilter;

fn calculator() -> Service {
    Service::new()
        .method("add", |p| {
            let sum: f64 = p
                .as_ref()
                .and_then(|v| v.as_array())
                .map(|xs| xs.iter().filter_map(|x| x.as_f64()).sum())
                .unwrap_or(0.0);
            TaskOutput::value(json!(sum))
        })
        .method("countdown", |p| {
            let from = p.and_then(|v| v.as_u64()).unwrap_or(3);
            TaskOutput::values((0..=from).rev().map(|n| json!(n)).collect::<Vec<_>>())
        })
}

fn job_queue() -> SequentialProcessor {
    let cfg = SequentialConfig {
        inter_task_delay: Duration::from_millis(10),
        task_timeout: Duration::from_secs(1),
        ..SequentialConfig::named("jobs")
    };
    SequentialProcessor::new(
        |task: &Task| {
            let name = task.kind().to_string();
            TaskOutput::future(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!(format!("{name}: done")))
            })
        },
        cfg,
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let router = Arc::new(LoggedProcessor::new(
        RouterProcessor::builder(RouterConfig::default())
            .route(
                "math",
                DirectProcessor::from_service(calculator(), ProcessorConfig::named("math")),
            )
            .route("jobs", job_queue())
            .build(),
    ));

    let mut started = router.on_task_started();
    tokio::spawn(async move {
        while let Some(ev) = started.next().await {
            println!("  started {}", ev.task.kind());
        }
    });

    let sum = router
        .collect(Task::new("math/add").with_payload(json!([1.5, 2.5])))
        .await?;
    println!("math/add       -> {sum:?}");

    let mut countdown = router.process(Task::new("math/countdown").with_payload(json!(3)));
    while let Some(n) = countdown.next().await {
        println!("math/countdown -> {}", n?);
    }

    let jobs = RouterProxy::of(&router, "jobs");
    let (a, b) = tokio::join!(
        jobs.collect(Task::new("thumbnail")),
        jobs.collect(Task::new("index")),
    );
    println!("jobs           -> {:?} {:?}", a?, b?);

    match router.collect(Task::new("nowhere/x")).await {
        Ok(_) => println!("nowhere        -> routed?"),
        Err(e) => println!("nowhere        -> {e}"),
    }

    router.finish().await?;
    Ok(())
}
