//! Retry policy shared by direct and sequential processors.
//!
//! ## Contents
//! - [`RetryPolicy`] how many attempts, how long to wait, which errors are transient
//! - [`JitterPolicy`] randomisation applied to computed delays
//!
//! ## Quick wiring
//! ```text
//! attempt fails with err (failures = n)
//!   └─► RetryPolicy::should_retry(err, n)
//!          ├─ false ─► error reaches the caller, TaskFailed published
//!          └─ true  ─► delay = RetryPolicy::delay_for(prev, n)   (clamped)
//!                      sleep(delay) ─► TaskRestarted ─► next attempt
//! ```
//!
//! ## Defaults
//! - `max_retries = 3` attempts, `min_delay = 100ms`, `max_delay = 30s`
//! - `factor = 2.0` (doubling), `JitterPolicy::None`
//! - transient errors: [`TaskError::Transient`](crate::TaskError::Transient)
//!   and [`TaskError::Timeout`](crate::TaskError::Timeout)

mod jitter;
mod retry;

pub use jitter::JitterPolicy;
pub use retry::{NextDelayFn, RetryPolicy, TransientFn};
