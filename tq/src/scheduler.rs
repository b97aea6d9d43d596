//! Scheduler implementation
//!
//! The Scheduler owns every queue group and time-slices their execution: each
//! tick is one pass over the groups in registration order, running a burst of
//! items per group sized from that group's observed per-item latency, until a
//! wall-clock budget is spent. A drive task reschedules the next tick after a
//! short delay while work remains, or a longer idle delay once all groups are
//! drained.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::group::{GroupState, Handler, QueueGroup};

/// Drive-loop state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No tick pending; `start` is required to resume
    Stopped,

    /// The drive task is sleeping until the next tick
    Scheduled,

    /// A tick is executing handlers right now
    Running,
}

/// Pending drive task plus its observable state
struct TimerHandle {
    state: TimerState,
    task: Option<JoinHandle<()>>,
}

/// Result of one tick
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    /// Items executed across all bursts this tick
    pub executed: usize,

    /// Items still pending in the groups this tick visited
    pub remaining: usize,

    /// Sum of recorded burst times in milliseconds
    pub elapsed_ms: f64,
}

/// Lifetime statistics for the scheduler
#[derive(Debug, Default, Clone, Serialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub total_items: u64,
    pub peak_groups: usize,
}

/// Internal state protected by mutex
struct SchedulerInner<T> {
    /// Lookup table from key to position in `groups`
    index: HashMap<String, usize>,

    /// Queue groups in registration order
    groups: Vec<QueueGroup<T>>,

    /// Statistics
    stats: SchedulerStats,
}

impl<T> SchedulerInner<T> {
    /// Look up the group for `key`, creating it on first sight. A handler is
    /// only bound at creation; later calls for the same key ignore it.
    fn resolve(&mut self, key: &str, handler: Option<Handler<T>>) -> usize {
        if let Some(&pos) = self.index.get(key) {
            return pos;
        }

        let pos = self.groups.len();
        debug!(%key, pos, "SchedulerInner::resolve: creating queue group");
        self.groups.push(QueueGroup::new(key, pos, handler));
        self.index.insert(key.to_string(), pos);
        self.stats.peak_groups = self.stats.peak_groups.max(self.groups.len());
        pos
    }
}

/// The Scheduler manages many independent work queues, interleaving their
/// execution across repeated budgeted ticks of one task.
pub struct Scheduler<T> {
    config: SchedulerConfig,
    inner: Mutex<SchedulerInner<T>>,
    timer: Mutex<TimerHandle>,
    /// Handed to the drive task so it never keeps a dropped scheduler alive
    self_ref: Weak<Scheduler<T>>,
}

impl<T> Scheduler<T> {
    /// Create a new scheduler with the given configuration. Ticking begins
    /// when `start` is called, not at construction.
    pub fn new(config: SchedulerConfig) -> Arc<Self> {
        debug!(?config, "Scheduler::new: called");
        Arc::new_cyclic(|weak| Self {
            config,
            inner: Mutex::new(SchedulerInner {
                index: HashMap::new(),
                groups: Vec::new(),
                stats: SchedulerStats::default(),
            }),
            timer: Mutex::new(TimerHandle {
                state: TimerState::Stopped,
                task: None,
            }),
            self_ref: weak.clone(),
        })
    }

    /// Append a batch of items to the queue group for `key`, creating the
    /// group if this is the first time the key is seen.
    ///
    /// An empty batch still creates the group, which allows pre-registering a
    /// handler before any data exists. Returns true: a group for `key` exists
    /// after this call.
    pub async fn enqueue(&self, key: &str, items: Vec<T>, handler: Option<Handler<T>>) -> bool {
        debug!(%key, count = items.len(), "Scheduler::enqueue: called");
        let mut inner = self.inner.lock().await;
        let pos = inner.resolve(key, handler);
        inner.groups[pos].enqueue(items);
        true
    }

    /// Convenience for enqueueing a single item
    pub async fn enqueue_one(&self, key: &str, item: T, handler: Option<Handler<T>>) -> bool {
        self.enqueue(key, vec![item], handler).await
    }

    /// Remove and return the tail item of the named group, or None if the
    /// group is absent or empty. Counts against the group's dequeue total,
    /// so manual draining shows up in its statistics denominator.
    pub async fn dequeue(&self, key: &str) -> Option<T> {
        debug!(%key, "Scheduler::dequeue: called");
        let mut inner = self.inner.lock().await;
        let pos = *inner.index.get(key)?;
        inner.groups[pos].dequeue_one()
    }

    /// Run one budgeted pass over all queue groups in registration order.
    ///
    /// Each non-empty group gets one burst: a single probe item when the
    /// group has no timing history, otherwise as many items as the remaining
    /// budget divided by the group's average per-item latency suggests will
    /// fit (never fewer than one, so every visited group makes progress).
    /// Iteration stops once the budget is spent; groups not reached wait for
    /// the next tick.
    pub async fn tick(&self) -> Result<TickOutcome, SchedulerError> {
        let budget_ms = self.config.budget_ms();
        let mut inner = self.inner.lock().await;
        inner.stats.ticks += 1;

        let mut elapsed_budget = 0.0_f64;
        let mut remaining = 0_usize;
        let mut executed = 0_usize;

        for pos in 0..inner.groups.len() {
            let group = &mut inner.groups[pos];
            if group.items.is_empty() {
                continue;
            }

            let burst_size = if group.timing.has_history() {
                let fit = ((budget_ms - elapsed_budget) / group.timing.avg_ms).floor() as usize;
                fit.max(1)
            } else {
                // Cold-start probe: measure one item before trusting estimates
                1
            };

            debug!(key = %group.key, burst_size, depth = group.items.len(), "Scheduler::tick: running burst");

            let start = Instant::now();
            let mut ran = 0_usize;
            while ran < burst_size {
                let Some(item) = group.dequeue_one() else {
                    break;
                };
                let handler = group.handler.as_mut().ok_or_else(|| SchedulerError::MissingHandler {
                    key: group.key.clone(),
                })?;
                handler(item).map_err(|source| SchedulerError::Handler {
                    key: group.key.clone(),
                    source,
                })?;
                ran += 1;
            }
            // Clocks coarser than 1ms can report zero for a real burst
            let burst_ms = (start.elapsed().as_secs_f64() * 1000.0).max(1.0);

            group.record_burst(ran, burst_ms);
            elapsed_budget += burst_ms;
            remaining += group.items.len();
            executed += ran;

            if elapsed_budget > budget_ms - 1.0 {
                break;
            }
        }

        inner.stats.total_items += executed as u64;
        if elapsed_budget > budget_ms {
            warn!(elapsed_ms = elapsed_budget, budget_ms, "Scheduler::tick: budget overrun");
        }
        debug!(executed, remaining, elapsed_ms = elapsed_budget, "Scheduler::tick: finished");

        Ok(TickOutcome {
            executed,
            remaining,
            elapsed_ms: elapsed_budget,
        })
    }

    /// Cancel the pending tick. Items already enqueued stay in place; a tick
    /// that is mid-burst runs to completion since bursts never yield.
    pub async fn stop(&self) {
        debug!("Scheduler::stop: called");
        let mut timer = self.timer.lock().await;
        if let Some(task) = timer.task.take() {
            task.abort();
        }
        timer.state = TimerState::Stopped;
    }

    /// Get the current drive-loop state
    pub async fn timer_state(&self) -> TimerState {
        self.timer.lock().await.state
    }

    /// Get a snapshot of the named queue group, if it exists
    pub async fn group_state(&self, key: &str) -> Option<GroupState> {
        let inner = self.inner.lock().await;
        let pos = *inner.index.get(key)?;
        Some(inner.groups[pos].state())
    }

    /// Get snapshots of every queue group in registration order
    pub async fn group_states(&self) -> Vec<GroupState> {
        let inner = self.inner.lock().await;
        inner.groups.iter().map(QueueGroup::state).collect()
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        let inner = self.inner.lock().await;
        inner.stats.clone()
    }

    async fn set_state(&self, state: TimerState) {
        self.timer.lock().await.state = state;
    }
}

impl<T: Send + 'static> Scheduler<T> {
    /// Cancel any pending tick, run one tick before returning, then resume
    /// the recurring schedule on a spawned drive task.
    ///
    /// A failed first tick propagates to the caller and leaves the scheduler
    /// stopped.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        debug!("Scheduler::start: called");
        self.stop().await;
        self.set_state(TimerState::Running).await;

        let outcome = match self.tick().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.set_state(TimerState::Stopped).await;
                return Err(e);
            }
        };

        let task = tokio::spawn(Self::drive(self.self_ref.clone(), outcome.remaining));

        let mut timer = self.timer.lock().await;
        timer.state = TimerState::Scheduled;
        timer.task = Some(task);
        Ok(())
    }

    /// Recurring schedule: sleep, tick, repeat. The delay is `min_delay`
    /// while items remain and `idle_delay` once everything is drained, so an
    /// idle scheduler never busy-polls.
    ///
    /// A tick error stops the schedule; the scheduler stays stopped until
    /// `start` is called again. Items the failed tick never reached stay
    /// enqueued.
    async fn drive(this: Weak<Self>, mut remaining: usize) {
        loop {
            let Some(sched) = this.upgrade() else { return };

            let delay = if remaining > 0 {
                sched.config.min_delay()
            } else {
                sched.config.idle_delay()
            };
            sched.set_state(TimerState::Scheduled).await;

            // No strong reference across the sleep: dropping the scheduler
            // must end the schedule too
            drop(sched);
            tokio::time::sleep(delay).await;

            let Some(sched) = this.upgrade() else { return };
            sched.set_state(TimerState::Running).await;

            match sched.tick().await {
                Ok(outcome) => remaining = outcome.remaining,
                Err(e) => {
                    error!(error = %e, key = e.key(), "Scheduler::drive: tick failed, stopping");
                    sched.set_state(TimerState::Stopped).await;
                    return;
                }
            }
        }
    }
}
