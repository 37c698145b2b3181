//! The dispenser registry: the one piece of process-wide state.
//!
//! A read-mostly map from name to live dispenser. `next()` paths take the
//! read side just long enough to resolve the name; creation,
//! reconfiguration, and deletion go through the write side. Startup loads
//! the registry from the snapshot before the listener accepts; shutdown
//! walks every dispenser's graceful sequence and then flushes the snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::config::{Config, ConfigPatch, Kind};
use crate::engine::{Engine, Stats};
use crate::error::{Error, Result};
use crate::factory::DispenserFactory;
use crate::store::SnapshotStore;

/// A named, live dispenser: its immutable configuration plus the engine
/// chosen by the durability strategy.
pub struct Dispenser {
    name: String,
    config: Config,
    engine: Arc<dyn Engine>,
}

impl Dispenser {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn next(&self) -> Result<String> {
        self.engine.next()
    }

    pub fn current(&self) -> i64 {
        self.engine.current()
    }

    pub fn stats(&self) -> Stats {
        self.engine.stats()
    }

    fn shutdown(&self) -> Result<()> {
        self.engine.shutdown()
    }
}

/// The outcome of a configuration command, for the wire layer's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    DurabilityChanged,
    Unchanged,
}

pub struct Registry {
    factory: DispenserFactory,
    store: Arc<dyn SnapshotStore>,
    dispensers: RwLock<HashMap<String, Arc<Dispenser>>>,
    shutting_down: AtomicBool,
}

impl Registry {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            factory: DispenserFactory::new(Arc::clone(&store)),
            store,
            dispensers: RwLock::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Restores every snapshot entry, resuming monotonic progress from the
    /// saved position. Entries that fail validation or creation are logged
    /// and skipped; they stay in the snapshot untouched until overwritten
    /// or deleted. Returns the number of restored dispensers.
    pub fn load(&self) -> usize {
        let mut restored = 0;
        for (name, saved) in self.store.list() {
            if let Err(err) = saved.config.validate() {
                tracing::warn!(dispenser = %name, error = %err, "skipping invalid snapshot entry");
                continue;
            }
            match self.factory.create(&name, saved.config.clone(), saved.current) {
                Ok(engine) => {
                    tracing::info!(
                        dispenser = %name,
                        strategy = %saved.config.auto_disk,
                        current = saved.current,
                        "restored dispenser"
                    );
                    self.dispensers.write().insert(
                        name.clone(),
                        Arc::new(Dispenser {
                            name,
                            config: saved.config,
                            engine,
                        }),
                    );
                    restored += 1;
                }
                Err(err) => {
                    tracing::warn!(dispenser = %name, error = %err, "failed to restore dispenser");
                }
            }
        }
        restored
    }

    /// Create-or-reconfigure for `name`.
    ///
    /// First configuration creates the dispenser and persists its initial
    /// position. On an existing dispenser every field except `auto_disk` is
    /// immutable: any attempted change fails with [`Error::ConfigImmutable`]
    /// naming the fields, a durability-only change swaps in a new engine
    /// inheriting `current`, and a verbatim re-send succeeds with no side
    /// effect.
    pub fn configure(&self, name: &str, patch: ConfigPatch) -> Result<Applied> {
        if self.shutting_down.load(Ordering::Relaxed) {
            return Err(Error::Shutdown);
        }

        let mut dispensers = self.dispensers.write();
        let Some(existing) = dispensers.get(name).cloned() else {
            let config = patch.into_config()?;
            let initial = config.starting;
            let engine = self.factory.create(name, config.clone(), initial)?;
            self.persist_initial(name, &config, initial)?;
            dispensers.insert(
                name.to_string(),
                Arc::new(Dispenser {
                    name: name.to_string(),
                    config,
                    engine,
                }),
            );
            return Ok(Applied::Created);
        };

        let rejected = patch.rejected_fields(existing.config());
        if !rejected.is_empty() {
            return Err(Error::ConfigImmutable { fields: rejected });
        }

        let durability = patch.auto_disk.unwrap_or(existing.config.auto_disk);
        if durability == existing.config.auto_disk {
            return Ok(Applied::Unchanged);
        }

        let mut config = existing.config.clone();
        config.auto_disk = durability;
        // Retire the old engine before the new one writes anything: its
        // close save must not land after (and thus shadow) the new
        // strategy's first segment commit.
        let current = existing.current();
        if let Err(err) = existing.shutdown() {
            tracing::warn!(dispenser = %name, error = %err, "shutdown of replaced dispenser failed");
        }
        let engine = self.factory.create(name, config.clone(), current)?;
        self.persist_initial(name, &config, current)?;
        dispensers.insert(
            name.to_string(),
            Arc::new(Dispenser {
                name: name.to_string(),
                config,
                engine,
            }),
        );
        Ok(Applied::DurabilityChanged)
    }

    /// Records a freshly created dispenser in the snapshot.
    ///
    /// Segment-backed engines already committed their first segment's end
    /// during creation; writing `position` over it here would shrink the
    /// committed range and let a crash replay issued values.
    fn persist_initial(&self, name: &str, config: &Config, position: i64) -> Result<()> {
        let segmented = config.kind == Kind::NumericMonotonic && config.auto_disk.uses_segments();
        if segmented {
            return Ok(());
        }
        self.store
            .save(name, config, position)
            .map_err(Error::persistence)
    }

    /// Produces the next identifier from the named dispenser.
    pub fn next(&self, name: &str) -> Result<String> {
        if self.shutting_down.load(Ordering::Relaxed) {
            return Err(Error::Shutdown);
        }
        let dispenser = self
            .dispensers
            .read()
            .get(name)
            .cloned()
            .ok_or(Error::UnknownDispenser)?;
        dispenser.next()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dispenser>> {
        self.dispensers.read().get(name).cloned()
    }

    /// Removes the dispenser and its snapshot entry. Returns whether it
    /// existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let Some(dispenser) = self.dispensers.write().remove(name) else {
            return Ok(false);
        };
        if let Err(err) = dispenser.shutdown() {
            tracing::warn!(dispenser = %name, error = %err, "shutdown of deleted dispenser failed");
        }
        self.store.delete(name).map_err(Error::persistence)?;
        Ok(true)
    }

    /// Graceful shutdown: refuse new work, run every dispenser's close
    /// sequence, flush the snapshot. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let dispensers: Vec<_> = self.dispensers.read().values().cloned().collect();
        for dispenser in dispensers {
            if let Err(err) = dispenser.shutdown() {
                tracing::warn!(
                    dispenser = dispenser.name(),
                    error = %err,
                    "graceful save failed"
                );
            }
        }
        if let Err(err) = self.store.flush() {
            tracing::error!(error = %err, "final snapshot flush failed");
        }
    }

    pub fn len(&self) -> usize {
        self.dispensers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispensers.read().is_empty()
    }
}
