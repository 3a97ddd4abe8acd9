//! # Example: worker_bridge
//!
//! Runs a sequential processor on its own thread and drives it from the
//! main runtime through the worker bridge. Requests and responses cross the
//! boundary as JSON; the main side sees an ordinary processor.
//!
//! ## Flow
//! ```text
//! main runtime                            worker thread
//! fg.process("square", 7) ─► {"kind":"process",...} ─► SequentialProcessor
//!                         ◄─ {"kind":"N","valueOrError":49}
//!                         ◄─ {"kind":"C"}
//! drop(stream)            ─► {"kind":"unsubscribe",...}
//! fg.finish()             ─► {"kind":"terminate",...} ─► finish(), drain
//!                         ◄─ {"kind":"C","uid":"__terminate__"}
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=taskproc=debug cargo run --example worker_bridge
//! ```

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use taskproc::bridge::{ForegroundOptions, ForegroundWorker, ThreadWorker};
use taskproc::{Processor, ProcessorExt, SequentialConfig, SequentialProcessor, Service, Task, TaskOutput};
use tracing_subscriber::EnvFilter;

fn numbers() -> Service {
    Service::new()
        .method("square", |p| {
            let n = p.and_then(|v| v.as_i64()).unwrap_or(0);
            TaskOutput::value(json!(n * n))
        })
        .method("ticks", |p| {
            let count = p.and_then(|v| v.as_u64()).unwrap_or(5);
            TaskOutput::stream(futures::stream::unfold(0u64, move |i| async move {
                if i >= count {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
                Some((Ok(json!(i)), i + 1))
            }))
        })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let create = ThreadWorker::spawn("numbers-worker", || {
        SequentialProcessor::new(numbers(), SequentialConfig::named("numbers"))
    });
    let fg = ForegroundWorker::new(ForegroundOptions::new(create).with_caption("numbers"))?;

    let squared = fg.collect(Task::new("square").with_payload(json!(7))).await?;
    println!("square(7) -> {squared:?}");

    let mut ticks = fg.process(Task::new("ticks").with_payload(json!(10)));
    for _ in 0..3 {
        if let Some(tick) = ticks.next().await {
            println!("tick      -> {}", tick?);
        }
    }
    drop(ticks);
    println!("ticks     -> unsubscribed after 3");

    fg.finish().await?;
    println!("worker finished, alive = {}", fg.is_alive());
    Ok(())
}
