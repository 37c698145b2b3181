//! The persistence hook: a snapshot of every dispenser's configuration and
//! saved position.
//!
//! `save`/`delete` only mutate the in-memory snapshot and mark it dirty;
//! `flush` rewrites the backing file atomically. The engine layer relies on
//! exactly one property: after a successful `save` followed by a `flush`, a
//! subsequent startup sees at least that position for that name.

mod file;
mod memory;

pub use file::{FileStore, SNAPSHOT_FILE};
pub use memory::MemoryStore;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One snapshot entry: the dispenser's configuration, its saved position,
/// and when it was last written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDispenser {
    pub config: Config,
    pub current: i64,
    pub updated: DateTime<Utc>,
}

/// The persistence hook consumed by engines and the registry.
pub trait SnapshotStore: Send + Sync {
    /// Records `position` (and the configuration) for `name` in the
    /// snapshot. Coalesced: durable only after the next [`flush`].
    ///
    /// [`flush`]: SnapshotStore::flush
    fn save(&self, name: &str, config: &Config, position: i64) -> StoreResult<()>;

    /// Drops `name` from the snapshot.
    fn delete(&self, name: &str) -> StoreResult<()>;

    /// A copy of every entry, for startup restore.
    fn list(&self) -> HashMap<String, SavedDispenser>;

    /// Forces the snapshot to stable storage if it changed.
    fn flush(&self) -> StoreResult<()>;
}
