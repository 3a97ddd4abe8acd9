//! # Example: retry_with_backoff
//!
//! A task fails transiently twice before succeeding. The direct processor
//! absorbs both failures, backing off between attempts, and the caller only
//! sees the final values. A second task never recovers and surfaces its last
//! error once the retry budget is spent.
//!
//! ## Flow
//! ```text
//! process("flaky")
//!   ├─► TaskStarted   attempt=1 ─► Err(transient "boom #1")
//!   ├─► sleep(100ms)
//!   ├─► TaskRestarted attempt=2 ─► Err(transient "boom #2")
//!   ├─► sleep(≈200ms, jittered)
//!   ├─► TaskRestarted attempt=3 ─► Ok("recovered")
//!   └─► TaskCompleted
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example retry_with_backoff
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use taskproc::{
    DirectProcessor, JitterPolicy, LogWriter, Processor, ProcessorConfig, ProcessorExt,
    RetryPolicy, Subscribe, SubscriberSet, Task, TaskError, TaskOutput,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let retry = RetryPolicy {
        max_retries: 3,
        min_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
        ..RetryPolicy::default()
    };
    let proc = DirectProcessor::new(
        move |task: &Task| {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            match task.kind() {
                "flaky" if n <= 2 => TaskOutput::error(TaskError::transient(format!("boom #{n}"))),
                "flaky" => TaskOutput::value(json!("recovered")),
                _ => TaskOutput::error(TaskError::transient("still down")),
            }
        },
        ProcessorConfig::named("retry-demo").with_retry(retry),
    );

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let logging = SubscriberSet::new(subs).attach(&proc);

    let out = proc.collect(Task::new("flaky")).await?;
    println!("flaky   -> {out:?} after {} calls", calls.load(Ordering::Relaxed));

    match proc.collect(Task::new("down")).await {
        Ok(v) => println!("down    -> unexpected success {v:?}"),
        Err(e) => println!("down    -> gave up: {e}"),
    }

    proc.finish().await?;
    logging.await?;
    Ok(())
}
