//! tickq - time-budgeted cooperative work queues
//!
//! tickq lets a caller enqueue large batches of deferred work (thousands of
//! parameter tuples) without blocking the host: execution is spread across
//! repeated short ticks, each bounded by a wall-clock budget, and every
//! queue's per-tick burst size is tuned from its observed handler latency.
//!
//! # Core Concepts
//!
//! - **Queue group**: one named queue of pending items bound to a handler,
//!   plus running timing statistics
//! - **Tick**: one budgeted pass over all queue groups in registration order
//! - **Burst**: the consecutive handler calls one group gets within a tick
//! - **Cold-start probe**: a fresh group always runs exactly one item first,
//!   so there is a measurement before any estimate-based sizing
//!
//! Concurrency is cooperative and time-sliced, not parallel: handlers run
//! synchronously inside the tick, groups are visited strictly in registration
//! order, and items within a group are processed LIFO (tail removal).
//!
//! # Modules
//!
//! - [`scheduler`] - Scheduler, tick loop, and adaptive burst sizing
//! - [`group`] - Per-key queue groups and their timing statistics
//! - [`config`] - Configuration types
//! - [`error`] - Error taxonomy

pub mod config;
pub mod error;
pub mod group;
pub mod scheduler;

// Re-export commonly used types
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use group::{GroupState, Handler, TimingStats};
pub use scheduler::{Scheduler, SchedulerStats, TickOutcome, TimerState};
