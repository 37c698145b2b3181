use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;

use crate::config::Config;
use crate::store::{SavedDispenser, SnapshotStore, StoreResult};

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "dispensers.json";

struct FileState {
    entries: HashMap<String, SavedDispenser>,
    dirty: bool,
}

/// JSON snapshot on the local filesystem.
///
/// Writes go to the in-memory map; `flush` serializes the whole map to a
/// temporary file and renames it over the real one, so readers never see a
/// torn snapshot. Entries that fail to decode on load are logged and
/// skipped rather than taking the whole snapshot down.
pub struct FileStore {
    snapshot_path: PathBuf,
    tmp_path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Opens (creating the directory if needed) and loads the snapshot.
    /// A missing file is an empty snapshot.
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let tmp_path = data_dir.join(format!("{SNAPSHOT_FILE}.tmp"));

        let entries = match fs::read(&snapshot_path) {
            Ok(bytes) => decode_entries(&bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            snapshot_path,
            tmp_path,
            state: Mutex::new(FileState {
                entries,
                dirty: false,
            }),
        })
    }

    fn write_locked(&self, state: &mut FileState) -> StoreResult<()> {
        let encoded = serde_json::to_vec_pretty(&state.entries)?;
        fs::write(&self.tmp_path, &encoded)?;
        fs::rename(&self.tmp_path, &self.snapshot_path)?;
        state.dirty = false;
        Ok(())
    }
}

fn decode_entries(bytes: &[u8]) -> StoreResult<HashMap<String, SavedDispenser>> {
    let raw: HashMap<String, serde_json::Value> = serde_json::from_slice(bytes)?;
    Ok(raw
        .into_iter()
        .filter_map(
            |(name, value)| match serde_json::from_value::<SavedDispenser>(value) {
                Ok(saved) => Some((name, saved)),
                Err(err) => {
                    tracing::warn!(%name, error = %err, "skipping undecodable snapshot entry");
                    None
                }
            },
        )
        .collect())
}

impl SnapshotStore for FileStore {
    fn save(&self, name: &str, config: &Config, position: i64) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.entries.insert(
            name.to_string(),
            SavedDispenser {
                config: config.clone(),
                current: position,
                updated: Utc::now(),
            },
        );
        state.dirty = true;
        Ok(())
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.entries.remove(name).is_some() {
            state.dirty = true;
        }
        Ok(())
    }

    fn list(&self) -> HashMap<String, SavedDispenser> {
        self.state.lock().entries.clone()
    }

    fn flush(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }
        self.write_locked(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPatch, Kind};

    fn sample_config() -> Config {
        ConfigPatch {
            kind: Some(Kind::NumericMonotonic),
            starting: Some(100),
            ..Default::default()
        }
        .into_config()
        .unwrap()
    }

    #[test]
    fn flush_then_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save("orders", &sample_config(), 42).unwrap();
        store.flush().unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let entries = reopened.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["orders"].current, 42);
        assert_eq!(entries["orders"].config, sample_config());
    }

    #[test]
    fn unflushed_saves_are_not_durable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save("orders", &sample_config(), 42).unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert!(reopened.list().is_empty());
    }

    #[test]
    fn delete_removes_entry_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save("orders", &sample_config(), 42).unwrap();
        store.save("events", &sample_config(), 7).unwrap();
        store.flush().unwrap();
        store.delete("orders").unwrap();
        store.flush().unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let entries = reopened.list();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("events"));
    }

    #[test]
    fn bad_entries_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let good = serde_json::json!({
            "config": {"type": 2, "starting": 5, "step": 1, "incr_mode": "sequence",
                       "auto_disk": "elegant_close"},
            "current": 9,
            "updated": "2024-05-01T00:00:00Z",
        });
        let snapshot = serde_json::json!({
            "good": good,
            "bad": {"config": {"type": 99}, "current": 1},
        });
        fs::write(
            dir.path().join(SNAPSHOT_FILE),
            serde_json::to_vec(&snapshot).unwrap(),
        )
        .unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("good"));
    }

    #[test]
    fn flush_is_a_no_op_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.flush().unwrap();
        assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    }
}
