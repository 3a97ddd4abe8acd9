//! # Retry policy.
//!
//! [`RetryPolicy`] decides whether a failed attempt is retried and how long to
//! wait first. Delays come from a `next_delay(prev, retry)` function (doubling
//! by default, or any closure) and are then **always** clamped to
//! `[min_delay, max_delay]`, whatever that function returned.
//!
//! `max_retries` bounds the number of attempts: a task that keeps failing
//! transiently sees exactly `max_retries` attempts, and the error of the last
//! one is what reaches the caller.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskproc::{RetryPolicy, TaskError};
//!
//! let policy = RetryPolicy {
//!     max_retries: 4,
//!     min_delay: Duration::from_millis(10),
//!     max_delay: Duration::from_millis(50),
//!     ..RetryPolicy::default()
//! }
//! .with_next_delay(|_prev, _retry| Duration::from_secs(3600));
//!
//! // Whatever the function says, the delay stays within bounds.
//! assert_eq!(policy.delay_for(Duration::ZERO, 1), Duration::from_millis(50));
//!
//! let flaky = TaskError::transient("busy");
//! assert!(policy.should_retry(&flaky, 3));
//! assert!(!policy.should_retry(&flaky, 4));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TaskError;
use crate::policies::jitter::JitterPolicy;

/// Custom delay function: `(previous delay, retry count) -> next delay`.
pub type NextDelayFn = Arc<dyn Fn(Duration, u32) -> Duration + Send + Sync>;

/// Custom classifier: `(error, failures so far) -> retry?`.
pub type TransientFn = Arc<dyn Fn(&TaskError, u32) -> bool + Send + Sync>;

/// Retry and backoff configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts per task.
    pub max_retries: u32,
    /// Lower bound for every retry delay.
    pub min_delay: Duration,
    /// Upper bound for every retry delay.
    pub max_delay: Duration,
    /// Growth factor used by the default delay function.
    pub factor: f64,
    /// Randomisation applied by the default delay function.
    pub jitter: JitterPolicy,
    /// Custom delay function replacing the doubling one (`None` = default).
    pub next_delay: Option<NextDelayFn>,
    /// Custom classifier (`None` = [`TaskError::is_transient`]).
    pub is_transient: Option<TransientFn>,
}

impl Default for RetryPolicy {
    /// Returns a policy with:
    /// - `max_retries = 3`;
    /// - `min_delay = 100ms`, `max_delay = 30s`;
    /// - `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
            next_delay: None,
            is_transient: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("min_delay", &self.min_delay)
            .field("max_delay", &self.max_delay)
            .field("factor", &self.factor)
            .field("jitter", &self.jitter)
            .field("custom_next_delay", &self.next_delay.is_some())
            .field("custom_is_transient", &self.is_transient.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// Replaces the delay function.
    #[must_use]
    pub fn with_next_delay<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration, u32) -> Duration + Send + Sync + 'static,
    {
        self.next_delay = Some(Arc::new(f));
        self
    }

    /// Replaces the transient-error classifier.
    #[must_use]
    pub fn with_transient<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskError, u32) -> bool + Send + Sync + 'static,
    {
        self.is_transient = Some(Arc::new(f));
        self
    }

    /// Unclamped delay suggested by the delay function.
    pub fn next_delay(&self, prev: Duration, retry: u32) -> Duration {
        if let Some(f) = &self.next_delay {
            return f(prev, retry);
        }
        if self.jitter == JitterPolicy::Decorrelated {
            return self.jitter.decorrelated(self.min_delay, prev, self.max_delay);
        }
        if prev.is_zero() {
            return self.jitter.apply(self.min_delay);
        }
        let secs = prev.as_secs_f64() * self.factor;
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }

    /// Delay before retry number `retry`, clamped to `[min_delay, max_delay]`.
    pub fn delay_for(&self, prev: Duration, retry: u32) -> Duration {
        let max = self.max_delay.max(self.min_delay);
        self.next_delay(prev, retry).clamp(self.min_delay, max)
    }

    /// Whether `err` is classified transient after `failures` failed attempts.
    pub fn is_transient(&self, err: &TaskError, failures: u32) -> bool {
        match &self.is_transient {
            Some(f) => f(err, failures),
            None => err.is_transient(),
        }
    }

    /// Whether another attempt should follow `failures` failed ones.
    ///
    /// Structural errors are never retried.
    pub fn should_retry(&self, err: &TaskError, failures: u32) -> bool {
        !err.is_structural() && failures < self.max_retries && self.is_transient(err, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn doubling_from_min_until_max() {
        let p = policy();
        let mut prev = Duration::ZERO;
        let mut seen = Vec::new();
        for retry in 1..=6 {
            prev = p.delay_for(prev, retry);
            seen.push(prev.as_millis());
        }
        assert_eq!(seen, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn custom_delay_is_clamped_both_ways() {
        let low = policy().with_next_delay(|_, _| Duration::ZERO);
        assert_eq!(low.delay_for(Duration::ZERO, 1), Duration::from_millis(100));

        let high = policy().with_next_delay(|_, _| Duration::from_secs(60));
        assert_eq!(high.delay_for(Duration::ZERO, 1), Duration::from_secs(1));
    }

    #[test]
    fn inverted_bounds_do_not_panic() {
        let p = RetryPolicy {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for(Duration::ZERO, 1), Duration::from_secs(2));
    }

    #[test]
    fn budget_and_classification() {
        let p = policy();
        let flaky = TaskError::transient("busy");
        assert!(p.should_retry(&flaky, 1));
        assert!(p.should_retry(&flaky, 4));
        assert!(!p.should_retry(&flaky, 5));
        assert!(!p.should_retry(&TaskError::normalize("boom"), 1));
    }

    #[test]
    fn structural_errors_ignore_predicate() {
        let p = policy().with_transient(|_, _| true);
        assert!(p.should_retry(&TaskError::normalize("boom"), 1));
        assert!(!p.should_retry(&TaskError::Finishing, 1));
        assert!(!p.should_retry(&TaskError::Disconnected, 1));
        assert!(!p.should_retry(&TaskError::UnknownTask { kind: "x".into() }, 1));
    }

    #[test]
    fn closures_can_be_set_as_fields() {
        let p = RetryPolicy {
            next_delay: Some(Arc::new(|_, _| Duration::from_millis(300))),
            is_transient: Some(Arc::new(|_, failures| failures < 2)),
            ..policy()
        };
        assert_eq!(p.delay_for(Duration::ZERO, 1), Duration::from_millis(300));
        assert!(p.should_retry(&TaskError::normalize("boom"), 1));
        assert!(!p.should_retry(&TaskError::normalize("boom"), 2));
    }

    #[test]
    fn decorrelated_jitter_stays_in_bounds() {
        let p = RetryPolicy {
            jitter: JitterPolicy::Decorrelated,
            ..policy()
        };
        let mut prev = Duration::ZERO;
        for retry in 1..=10 {
            prev = p.delay_for(prev, retry);
            assert!(prev >= p.min_delay && prev <= p.max_delay);
        }
    }

    #[test]
    fn none_never_retries() {
        assert!(!RetryPolicy::none().should_retry(&TaskError::transient("busy"), 1));
    }
}
