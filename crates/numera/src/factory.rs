//! The durability strategy selector.
//!
//! Given a validated configuration, the factory wires an algorithm kernel
//! to zero or more of {segment allocator, checkpoint timer, per-request
//! immediate save, graceful-shutdown save}:
//!
//! | strategy         | segments | checkpoint | immediate save | close save |
//! |------------------|----------|------------|----------------|------------|
//! | `memory`         |          |            |                |            |
//! | `pre-base`       | yes      |            |                |            |
//! | `pre-checkpoint` | yes      | 2 s        |                |            |
//! | `elegant_close`  |          |            | yes            | yes        |
//! | `pre_close`      | yes      | 2 s        |                | `current`  |
//!
//! Segment, checkpoint, and immediate-save wiring only ever applies to the
//! numeric-monotonic kind; the other kinds have no resumable progress, so
//! they run the direct engine whatever their declared strategy.

use std::sync::Arc;

use crate::config::{Config, Durability, Kind};
use crate::engine::{
    DEFAULT_CHECKPOINT_INTERVAL, DirectEngine, Engine, SegmentEngine, spawn_checkpoint_timer,
};
use crate::error::Result;
use crate::store::SnapshotStore;

pub struct DispenserFactory {
    store: Arc<dyn SnapshotStore>,
}

impl DispenserFactory {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Builds the engine for `config`, starting its monotonic progress at
    /// `initial` — the `starting` value on first creation, the saved
    /// position on restore or durability change.
    ///
    /// Segment-backed strategies commit their first segment here, so a
    /// failing persistence hook fails creation.
    pub fn create(&self, name: &str, config: Config, initial: i64) -> Result<Arc<dyn Engine>> {
        let segmented = config.kind == Kind::NumericMonotonic && config.auto_disk.uses_segments();
        let engine: Arc<dyn Engine> = if segmented {
            let save_on_close = config.auto_disk == Durability::PreClose;
            let uses_checkpoint = config.auto_disk.uses_checkpoint();
            let engine = SegmentEngine::create(
                name,
                config,
                initial,
                save_on_close,
                Arc::clone(&self.store),
            )?;
            if uses_checkpoint {
                spawn_checkpoint_timer(&engine, DEFAULT_CHECKPOINT_INTERVAL);
            }
            engine
        } else {
            let store = match config.auto_disk {
                Durability::Memory => None,
                _ => Some(Arc::clone(&self.store)),
            };
            Arc::new(DirectEngine::new(name, config, initial, store))
        };
        Ok(engine)
    }
}
