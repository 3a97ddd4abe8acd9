//! # Processor configuration.
//!
//! Plain structs with public fields and documented defaults, one per
//! processor family:
//! - [`ProcessorConfig`] direct processors
//! - [`SequentialConfig`] sequential processors
//! - [`RouterConfig`] routers and proxies
//!
//! ## Sentinel values
//! - `inter_task_delay = 0s` → the loop only yields between tasks
//! - `task_timeout = 0s` → attempts are not timed out
//! - `bus_capacity`, `buffer_size` are clamped to a minimum of 1

use std::time::Duration;

use crate::policies::RetryPolicy;

/// Default capacity of the instrumentation bus.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Default route separator.
pub const DEFAULT_ROUTE_SEPARATOR: &str = "/";

/// Configuration for a [`DirectProcessor`](crate::DirectProcessor).
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Human-readable name used in logs.
    pub caption: String,
    /// Retry and backoff behaviour.
    pub retry: RetryPolicy,
    /// Capacity of the instrumentation bus ring buffer.
    ///
    /// Subscribers lagging further behind skip the oldest events.
    pub bus_capacity: usize,
}

impl Default for ProcessorConfig {
    /// `caption = "direct"`, default retry policy, `bus_capacity = 1024`.
    fn default() -> Self {
        Self {
            caption: "direct".to_string(),
            retry: RetryPolicy::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl ProcessorConfig {
    /// Default config with the given caption.
    pub fn named(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            ..Self::default()
        }
    }

    /// Returns the config with a different retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for a [`SequentialProcessor`](crate::SequentialProcessor).
#[derive(Clone, Debug)]
pub struct SequentialConfig {
    /// Human-readable name used in logs.
    pub caption: String,
    /// Retry and backoff behaviour.
    pub retry: RetryPolicy,
    /// Capacity of the instrumentation bus ring buffer.
    pub bus_capacity: usize,
    /// Unread results per task before the caller is reported as lagging.
    ///
    /// Delivery never waits for the caller, so a slow reader neither stalls
    /// the loop nor runs into `task_timeout`.
    pub buffer_size: usize,
    /// Pause between two picks of the loop (`0s` = yield only).
    pub inter_task_delay: Duration,
    /// Hard timeout per attempt (`0s` = none).
    pub task_timeout: Duration,
}

impl Default for SequentialConfig {
    /// - `caption = "sequential"`
    /// - default retry policy
    /// - `bus_capacity = 1024`, `buffer_size = 64`
    /// - `inter_task_delay = 0s`, `task_timeout = 30s`
    fn default() -> Self {
        Self {
            caption: "sequential".to_string(),
            retry: RetryPolicy::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
            buffer_size: 64,
            inter_task_delay: Duration::ZERO,
            task_timeout: Duration::from_secs(30),
        }
    }
}

impl SequentialConfig {
    /// Default config with the given caption.
    pub fn named(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            ..Self::default()
        }
    }

    /// Returns the config with a different retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-attempt timeout as an `Option`.
    #[inline]
    pub fn timeout_opt(&self) -> Option<Duration> {
        if self.task_timeout.is_zero() {
            None
        } else {
            Some(self.task_timeout)
        }
    }

    /// Result buffer size clamped to a minimum of 1.
    #[inline]
    pub fn buffer_size_clamped(&self) -> usize {
        self.buffer_size.max(1)
    }
}

/// Configuration for a [`RouterProcessor`](crate::RouterProcessor).
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Human-readable name used in logs.
    pub caption: String,
    /// Separator between route prefix and inner kind.
    pub route_separator: String,
}

impl Default for RouterConfig {
    /// `caption = "router"`, `route_separator = "/"`.
    fn default() -> Self {
        Self {
            caption: "router".to_string(),
            route_separator: DEFAULT_ROUTE_SEPARATOR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let mut cfg = SequentialConfig::default();
        assert_eq!(cfg.timeout_opt(), Some(Duration::from_secs(30)));
        cfg.task_timeout = Duration::ZERO;
        cfg.buffer_size = 0;
        assert_eq!(cfg.timeout_opt(), None);
        assert_eq!(cfg.buffer_size_clamped(), 1);
    }
}
