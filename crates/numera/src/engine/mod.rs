//! Durability engines wrapping the algorithm kernels.
//!
//! An [`Engine`] is the capability surface the registry works against:
//! `next`, `current`, `set_current`, `stats`, `shutdown`. Two concrete
//! implementations exist — [`DirectEngine`] (no segments; optionally an
//! immediate save per identifier) and [`SegmentEngine`] (pre-committed
//! segments, optionally checkpointed). The factory picks and wires one per
//! the configured durability strategy.

mod checkpoint;
mod direct;
mod segment;

pub use checkpoint::DEFAULT_CHECKPOINT_INTERVAL;
pub(crate) use checkpoint::spawn_checkpoint_timer;
pub use direct::DirectEngine;
pub use segment::{DEFAULT_REFILL_THRESHOLD, DEFAULT_SEGMENT_SIZE, SegmentEngine};

use crate::error::Result;

/// Counters reported by `info`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Identifiers handed out since this engine was created.
    pub generated: u64,
    /// Positions committed to the snapshot but not yet consumed; these are
    /// what a crash right now would burn.
    pub wasted: u64,
    /// `wasted / (generated + wasted)`, as a percentage.
    pub waste_rate: f64,
}

impl Stats {
    pub(crate) fn new(generated: u64, wasted: u64) -> Self {
        let total = generated + wasted;
        let waste_rate = if total > 0 {
            wasted as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            generated,
            wasted,
            waste_rate,
        }
    }
}

/// The dispenser capability set.
///
/// Calls are serialized internally by a per-engine lock; the registry only
/// resolves names and never holds its own lock across these methods.
pub trait Engine: Send + Sync {
    /// Produces the next identifier.
    fn next(&self) -> Result<String>;

    /// The next monotonic value to hand out (zero for kinds without
    /// resumable progress).
    fn current(&self) -> i64;

    /// Overrides the monotonic position. Recovery only.
    fn set_current(&self, position: i64);

    fn stats(&self) -> Stats;

    /// Strategy-specific graceful shutdown: stop background timers, then
    /// perform the final save if the strategy calls for one.
    fn shutdown(&self) -> Result<()>;
}
