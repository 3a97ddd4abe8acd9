//! # Fresh and retry queues with alternating priority.
//!
//! The sequential processor keeps new work and pending retries apart. Each
//! pick prefers the queue that was *not* used last time, falling back to the
//! other when the preferred one is empty:
//!
//! ```text
//! last pick   preferred   fallback
//! ─────────   ─────────   ────────
//! fresh       retry       fresh
//! retry       fresh       retry
//! ```
//!
//! The rule looks only at the previous pick, never at queue lengths, so with
//! both queues non-empty the picks strictly alternate.

use std::collections::VecDeque;

/// Two FIFO queues plus the flag that alternates between them.
#[derive(Debug)]
pub(crate) struct DualQueue<T> {
    fresh: VecDeque<T>,
    retry: VecDeque<T>,
    picked_retry_last: bool,
}

impl<T> Default for DualQueue<T> {
    fn default() -> Self {
        Self {
            fresh: VecDeque::new(),
            retry: VecDeque::new(),
            picked_retry_last: false,
        }
    }
}

impl<T> DualQueue<T> {
    pub(crate) fn push_fresh(&mut self, item: T) {
        self.fresh.push_back(item);
    }

    pub(crate) fn push_retry(&mut self, item: T) {
        self.retry.push_back(item);
    }

    /// Takes the next item according to the alternation rule.
    pub(crate) fn pick(&mut self) -> Option<T> {
        let (first, second, first_is_retry) = if self.picked_retry_last {
            (&mut self.fresh, &mut self.retry, false)
        } else {
            (&mut self.retry, &mut self.fresh, true)
        };
        if let Some(item) = first.pop_front() {
            self.picked_retry_last = first_is_retry;
            return Some(item);
        }
        let item = second.pop_front()?;
        self.picked_retry_last = !first_is_retry;
        Some(item)
    }

    pub(crate) fn len(&self) -> usize {
        self.fresh.len() + self.retry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_order_is_fifo() {
        let mut q = DualQueue::default();
        q.push_fresh(1);
        q.push_fresh(2);
        q.push_fresh(3);
        assert_eq!(q.len(), 3);
        assert_eq!([q.pick(), q.pick(), q.pick(), q.pick()], [Some(1), Some(2), Some(3), None]);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn alternates_when_both_have_work() {
        let mut q = DualQueue::default();
        for f in ["f1", "f2", "f3"] {
            q.push_fresh(f);
        }
        for r in ["r1", "r2"] {
            q.push_retry(r);
        }
        // Nothing picked yet counts as "fresh last", so retry goes first.
        let order: Vec<_> = std::iter::from_fn(|| q.pick()).collect();
        assert_eq!(order, vec!["r1", "f1", "r2", "f2", "f3"]);
    }

    #[test]
    fn fallback_updates_the_flag() {
        let mut q = DualQueue::default();
        q.push_fresh("f1");
        assert_eq!(q.pick(), Some("f1"));
        // Last pick was fresh: retry is preferred next.
        q.push_fresh("f2");
        q.push_retry("r1");
        assert_eq!(q.pick(), Some("r1"));
        assert_eq!(q.pick(), Some("f2"));
    }

    #[test]
    fn lockstep_feeding_alternates_strictly() {
        let mut q = DualQueue::default();
        let mut picks = Vec::new();
        q.push_fresh(("fresh", 0));
        for i in 1..=4 {
            q.push_retry(("retry", i));
            q.push_fresh(("fresh", i));
            picks.push(q.pick().unwrap().0);
        }
        assert_eq!(picks, vec!["retry", "fresh", "retry", "fresh"]);
    }
}
