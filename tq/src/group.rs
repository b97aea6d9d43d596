//! Queue group bookkeeping: pending items, bound handler, timing statistics

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Handler invoked once per dequeued item
pub type Handler<T> = Box<dyn FnMut(T) -> eyre::Result<()> + Send>;

/// Running per-item latency statistics for one queue group
#[derive(Debug, Clone, Serialize)]
pub struct TimingStats {
    /// When the group was created
    pub created: DateTime<Utc>,

    /// Running average of per-item latency in milliseconds, weighted by the
    /// lifetime dequeue count
    pub avg_ms: f64,

    /// Lowest per-item average seen for any single burst
    pub min_ms: f64,

    /// Highest per-item average seen for any single burst
    pub max_ms: f64,
}

impl TimingStats {
    fn new() -> Self {
        Self {
            created: Utc::now(),
            avg_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        }
    }

    /// True once at least one burst has been recorded
    pub fn has_history(&self) -> bool {
        self.avg_ms > 0.0
    }
}

/// Read-only snapshot of a queue group for monitoring and tests
#[derive(Debug, Clone, Serialize)]
pub struct GroupState {
    pub key: String,
    pub index: usize,
    pub depth: usize,
    pub total_enqueued: u64,
    pub total_dequeued: u64,
    pub timing: TimingStats,
}

/// One named queue: its pending items, bound handler, and timing statistics.
///
/// A queue group holds no behavior beyond bookkeeping; the scheduler decides
/// when and how much of it runs. Items are appended at the tail and removed
/// from the tail, so processing order within a group is LIFO.
pub struct QueueGroup<T> {
    pub(crate) key: String,
    pub(crate) index: usize,
    pub(crate) handler: Option<Handler<T>>,
    pub(crate) items: Vec<T>,
    pub(crate) total_enqueued: u64,
    pub(crate) total_dequeued: u64,
    pub(crate) timing: TimingStats,
}

impl<T> QueueGroup<T> {
    /// Create a new queue group at the given registration position
    pub(crate) fn new(key: impl Into<String>, index: usize, handler: Option<Handler<T>>) -> Self {
        Self {
            key: key.into(),
            index,
            handler,
            items: Vec::new(),
            total_enqueued: 0,
            total_dequeued: 0,
            timing: TimingStats::new(),
        }
    }

    /// Append a batch at the tail. Counts once per non-empty call, not once
    /// per item; an empty batch is a no-op.
    pub(crate) fn enqueue(&mut self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        self.items.extend(batch);
        self.total_enqueued += 1;
    }

    /// Remove and return the tail item (LIFO), counting it
    pub(crate) fn dequeue_one(&mut self) -> Option<T> {
        let item = self.items.pop()?;
        self.total_dequeued += 1;
        Some(item)
    }

    /// Blend a finished burst of `ran` items taking `burst_ms` total into the
    /// running statistics.
    ///
    /// After the first burst, the average update weights the prior average by
    /// `total_dequeued - ran` and adds the burst's total elapsed time over the
    /// lifetime dequeue count (which already includes this burst's items).
    /// The min/max track extrema of per-burst per-item averages.
    pub(crate) fn record_burst(&mut self, ran: usize, burst_ms: f64) {
        debug_assert!(ran > 0, "record_burst requires at least one executed item");
        let per_item = burst_ms / ran as f64;
        if !self.timing.has_history() {
            self.timing.avg_ms = per_item;
            self.timing.min_ms = per_item;
            self.timing.max_ms = per_item;
        } else {
            let prior_weight = (self.total_dequeued - ran as u64) as f64;
            self.timing.avg_ms =
                (self.timing.avg_ms * prior_weight + burst_ms) / self.total_dequeued as f64;
            self.timing.min_ms = self.timing.min_ms.min(per_item);
            self.timing.max_ms = self.timing.max_ms.max(per_item);
        }
    }

    /// Snapshot the group for read-only introspection
    pub(crate) fn state(&self) -> GroupState {
        GroupState {
            key: self.key.clone(),
            index: self.index,
            depth: self.items.len(),
            total_enqueued: self.total_enqueued,
            total_dequeued: self.total_dequeued,
            timing: self.timing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn group() -> QueueGroup<u32> {
        QueueGroup::new("test", 0, None)
    }

    #[test]
    fn test_enqueue_counts_batches_not_items() {
        let mut g = group();
        g.enqueue(vec![1, 2, 3]);
        g.enqueue(vec![4]);
        assert_eq!(g.total_enqueued, 2);
        assert_eq!(g.items.len(), 4);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut g = group();
        g.enqueue(vec![]);
        assert_eq!(g.total_enqueued, 0);
        assert!(g.items.is_empty());
    }

    #[test]
    fn test_dequeue_is_lifo() {
        let mut g = group();
        g.enqueue(vec![1, 2, 3]);
        assert_eq!(g.dequeue_one(), Some(3));
        assert_eq!(g.dequeue_one(), Some(2));
        assert_eq!(g.dequeue_one(), Some(1));
        assert_eq!(g.dequeue_one(), None);
        assert_eq!(g.total_dequeued, 3);
    }

    #[test]
    fn test_first_burst_sets_all_stats() {
        let mut g = group();
        g.enqueue(vec![1, 2]);
        g.dequeue_one();
        g.record_burst(1, 10.0);
        assert_eq!(g.timing.avg_ms, 10.0);
        assert_eq!(g.timing.min_ms, 10.0);
        assert_eq!(g.timing.max_ms, 10.0);
        assert!(g.timing.has_history());
    }

    #[test]
    fn test_later_bursts_blend_by_lifetime_count() {
        let mut g = group();
        g.enqueue(vec![1, 2, 3, 4, 5]);

        g.dequeue_one();
        g.record_burst(1, 10.0);

        for _ in 0..4 {
            g.dequeue_one();
        }
        g.record_burst(4, 20.0);

        // avg = (10 * (5 - 4) + 20) / 5, min/max track the 5ms per-item burst
        assert_eq!(g.timing.avg_ms, 6.0);
        assert_eq!(g.timing.min_ms, 5.0);
        assert_eq!(g.timing.max_ms, 10.0);
    }

    #[test]
    fn test_state_snapshot_serializes() {
        let mut g = group();
        g.enqueue(vec![7]);
        let state = g.state();
        assert_eq!(state.key, "test");
        assert_eq!(state.depth, 1);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"depth\":1"));
    }

    proptest! {
        #[test]
        fn prop_drain_accounts_for_every_item(
            batches in proptest::collection::vec(
                proptest::collection::vec(any::<u32>(), 0..20),
                0..10,
            )
        ) {
            let mut g: QueueGroup<u32> = QueueGroup::new("prop", 0, None);
            let mut expected_items = 0u64;
            let mut expected_batches = 0u64;
            for batch in &batches {
                if !batch.is_empty() {
                    expected_batches += 1;
                }
                expected_items += batch.len() as u64;
                g.enqueue(batch.clone());
            }

            let mut drained = 0u64;
            while g.dequeue_one().is_some() {
                drained += 1;
            }

            prop_assert_eq!(drained, expected_items);
            prop_assert_eq!(g.total_dequeued, expected_items);
            prop_assert_eq!(g.total_enqueued, expected_batches);
            prop_assert!(g.items.is_empty());
        }
    }
}
