//! # Jitter for retry delays.
//!
//! Randomises backoff delays so tasks that failed together do not retry in
//! lockstep. Applied before the `[min_delay, max_delay]` clamp, so jitter can
//! never push a delay outside the configured bounds.

use std::time::Duration;

use rand::Rng;

/// Randomisation applied to a computed delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay / 2` plus uniform `[0, delay / 2]`.
    Equal,
    /// Uniform in `[base, prev * 3]`, capped at the maximum.
    ///
    /// Needs the previous delay, see [`JitterPolicy::decorrelated`];
    /// [`JitterPolicy::apply`] leaves the delay untouched.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies the policy to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rng.random_range(0..=half))
            }
        }
    }

    /// Next decorrelated delay from `prev`, within `[base, max]`.
    ///
    /// Other policies fall back to [`JitterPolicy::apply`] on `prev`.
    pub fn decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(prev);
        }
        let to_ms = |d: Duration| d.as_millis().min(u128::from(u64::MAX)) as u64;
        let base_ms = to_ms(base);
        let upper = to_ms(prev).saturating_mul(3).min(to_ms(max)).max(base_ms);
        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(250);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn bounds_hold() {
        let d = Duration::from_millis(1000);
        for _ in 0..50 {
            assert!(JitterPolicy::Full.apply(d) <= d);
            let eq = JitterPolicy::Equal.apply(d);
            assert!(eq >= Duration::from_millis(500) && eq <= d);
        }
    }

    #[test]
    fn decorrelated_grows_from_previous_delay() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(2);
        let j = JitterPolicy::Decorrelated;

        assert_eq!(j.decorrelated(base, Duration::ZERO, max), base);
        assert_eq!(j.apply(Duration::from_millis(700)), Duration::from_millis(700));
        for _ in 0..50 {
            let d = j.decorrelated(base, Duration::from_millis(400), max);
            assert!(d >= base && d <= Duration::from_millis(1200));
            let capped = j.decorrelated(base, Duration::from_secs(5), max);
            assert!(capped >= base && capped <= max);
        }
    }
}
