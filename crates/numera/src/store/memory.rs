use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use crate::config::Config;
use crate::store::{SavedDispenser, SnapshotStore, StoreResult};

/// An in-memory snapshot store. `flush` is a no-op.
///
/// Used by tests to observe exactly which positions the engines commit, and
/// usable anywhere durability is explicitly not wanted.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SavedDispenser>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The saved position for `name`, if any.
    pub fn position(&self, name: &str) -> Option<i64> {
        self.entries.lock().get(name).map(|saved| saved.current)
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, name: &str, config: &Config, position: i64) -> StoreResult<()> {
        self.entries.lock().insert(
            name.to_string(),
            SavedDispenser {
                config: config.clone(),
                current: position,
                updated: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.entries.lock().remove(name);
        Ok(())
    }

    fn list(&self) -> HashMap<String, SavedDispenser> {
        self.entries.lock().clone()
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}
