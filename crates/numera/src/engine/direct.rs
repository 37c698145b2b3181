use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::{Config, Kind};
use crate::engine::{Engine, Stats};
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::store::SnapshotStore;

/// The non-segmented engine: a kernel behind a mutex.
///
/// Serves the `memory` strategy (no store) and `elegant_close` (store
/// present: every successful monotonic `next()` saves the new position, and
/// graceful shutdown saves once more). Kinds without resumable progress
/// never get a store here — there is nothing per-request to save for them.
pub struct DirectEngine {
    name: String,
    config: Config,
    kernel: Mutex<Kernel>,
    store: Option<Arc<dyn SnapshotStore>>,
    generated: AtomicU64,
}

impl DirectEngine {
    pub fn new(
        name: &str,
        config: Config,
        initial: i64,
        store: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        let kernel = Kernel::new(&config, initial);
        let store = if config.kind == Kind::NumericMonotonic {
            store
        } else {
            None
        };
        Self {
            name: name.to_string(),
            config,
            kernel: Mutex::new(kernel),
            store,
            generated: AtomicU64::new(0),
        }
    }
}

impl Engine for DirectEngine {
    fn next(&self) -> Result<String> {
        let mut kernel = self.kernel.lock();
        let value = kernel.next()?;
        self.generated.fetch_add(1, Ordering::Relaxed);
        if let Some(store) = &self.store {
            // Immediate save: the identifier is consumed either way, so a
            // hook failure is surfaced but never rolls the counter back.
            store
                .save(&self.name, &self.config, kernel.current())
                .map_err(Error::persistence)?;
        }
        Ok(value)
    }

    fn current(&self) -> i64 {
        self.kernel.lock().current()
    }

    fn set_current(&self, position: i64) {
        self.kernel.lock().set_current(position);
    }

    fn stats(&self) -> Stats {
        Stats::new(self.generated.load(Ordering::Relaxed), 0)
    }

    fn shutdown(&self) -> Result<()> {
        if let Some(store) = &self.store {
            let position = self.kernel.lock().current();
            store
                .save(&self.name, &self.config, position)
                .map_err(Error::persistence)?;
        }
        Ok(())
    }
}
