use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MonotonicMode};
use crate::engine::{Engine, Stats};
use crate::error::{Error, Result};
use crate::kernel::format_value;
use crate::store::SnapshotStore;

/// Monotonic values pre-committed per segment. Default 1000.
pub const DEFAULT_SEGMENT_SIZE: i64 = 1000;

/// Remaining fraction of the live segment at which the next one is
/// pre-fetched. Default 10%.
pub const DEFAULT_REFILL_THRESHOLD: f64 = 0.1;

struct SegmentState {
    /// Next value to hand out.
    current: i64,
    /// Exclusive end of the live segment.
    segment_end: i64,
    /// Pre-fetched `[start, end)`, already committed to the store.
    next_segment: Option<(i64, i64)>,
    /// At most one pre-fetch task may be in flight.
    prefetch_inflight: bool,
    /// The last position written through the persistence hook. Allocation
    /// and pre-fetch raise it to the committed end; checkpoints and the
    /// close save pull it back to `current`.
    last_persisted: i64,
}

/// The segmented monotonic engine.
///
/// Serves `pre-base`, `pre-checkpoint`, and `pre_close`. The contract that
/// makes restarts safe: a segment's end is committed to the snapshot
/// *before* any identifier in that segment is handed out, so replaying the
/// saved position can never repeat an issued value. Throughput comes from
/// the same contract — within a committed segment, `next()` is pure memory
/// work.
///
/// Pre-fetch runs as a background task once the live segment falls below
/// the refill threshold. It commits the follow-up segment without holding
/// the dispenser lock and publishes it only if the live segment is still
/// the one it extended; a failed or stale pre-fetch is dropped and the next
/// rollover allocates synchronously.
pub struct SegmentEngine {
    name: String,
    config: Config,
    mode: MonotonicMode,
    length: u32,
    step: i64,
    cap: Option<i64>,
    segment_size: i64,
    refill_threshold: f64,
    save_on_close: bool,
    store: Arc<dyn SnapshotStore>,
    state: Mutex<SegmentState>,
    checkpoint: Mutex<Option<CancellationToken>>,
    generated: AtomicU64,
    weak_self: Weak<SegmentEngine>,
}

impl SegmentEngine {
    /// Creates the engine and commits its first segment starting at
    /// `initial` (the `starting` value on creation, the saved position on
    /// restore).
    pub fn create(
        name: &str,
        config: Config,
        initial: i64,
        save_on_close: bool,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Arc<Self>> {
        let mode = config.mode();
        let cap = config.cap();
        let engine = Arc::new_cyclic(|weak| Self {
            name: name.to_string(),
            mode,
            length: config.length,
            step: config.step,
            cap,
            segment_size: DEFAULT_SEGMENT_SIZE,
            refill_threshold: DEFAULT_REFILL_THRESHOLD,
            save_on_close,
            store,
            state: Mutex::new(SegmentState {
                current: initial,
                segment_end: initial,
                next_segment: None,
                prefetch_inflight: false,
                last_persisted: initial,
            }),
            checkpoint: Mutex::new(None),
            generated: AtomicU64::new(0),
            weak_self: weak.clone(),
            config,
        });
        {
            let mut state = engine.state.lock();
            engine.allocate_locked(&mut state, initial)?;
        }
        Ok(engine)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_checkpoint_token(&self, token: CancellationToken) {
        *self.checkpoint.lock() = Some(token);
    }

    /// Commits a fresh segment `[start, end)` and makes it live. The store
    /// write happens under the dispenser lock: nothing from the new range
    /// may be observable before its end is durable. On failure the previous
    /// segment state is untouched and the dispenser stays usable.
    fn allocate_locked(&self, state: &mut MutexGuard<'_, SegmentState>, start: i64) -> Result<()> {
        let mut end = start + self.segment_size * self.step;
        if let Some(cap) = self.cap {
            if start > cap {
                return Err(Error::Exhausted);
            }
            if end > cap + 1 {
                end = cap + 1;
            }
        }
        self.store
            .save(&self.name, &self.config, end)
            .map_err(Error::persistence)?;
        state.current = start;
        state.segment_end = end;
        state.last_persisted = end;
        Ok(())
    }

    /// Background pre-fetch body. Commits the follow-up segment and
    /// publishes it unless a synchronous rollover got there first.
    fn prefetch(&self) {
        let start = self.state.lock().segment_end;
        let mut end = start + self.segment_size * self.step;
        if let Some(cap) = self.cap {
            if start > cap {
                self.state.lock().prefetch_inflight = false;
                return;
            }
            if end > cap + 1 {
                end = cap + 1;
            }
        }

        match self.store.save(&self.name, &self.config, end) {
            Ok(()) => {
                let mut state = self.state.lock();
                state.prefetch_inflight = false;
                if state.segment_end == start && state.next_segment.is_none() {
                    state.next_segment = Some((start, end));
                    state.last_persisted = state.last_persisted.max(end);
                }
            }
            Err(err) => {
                tracing::warn!(
                    dispenser = %self.name,
                    error = %err,
                    "segment prefetch failed; next rollover will allocate synchronously"
                );
                self.state.lock().prefetch_inflight = false;
            }
        }
    }

    /// Persists the consumed position if it moved since the last write.
    /// Called from the checkpoint timer; errors are the caller's to log.
    pub(crate) fn checkpoint(&self) -> Result<()> {
        let (current, last_persisted) = {
            let state = self.state.lock();
            (state.current, state.last_persisted)
        };
        if current == last_persisted {
            return Ok(());
        }
        self.store
            .save(&self.name, &self.config, current)
            .map_err(Error::persistence)?;
        self.state.lock().last_persisted = current;
        Ok(())
    }
}

impl Engine for SegmentEngine {
    fn next(&self) -> Result<String> {
        let mut state = self.state.lock();

        if state.current >= state.segment_end {
            if let Some((start, end)) = state.next_segment.take() {
                state.current = start;
                state.segment_end = end;
            } else {
                let from = state.segment_end;
                self.allocate_locked(&mut state, from)?;
            }
        }

        let value = state.current;
        state.current += self.step;

        let segment_span = (self.segment_size * self.step) as f64;
        let remaining = (state.segment_end - state.current) as f64 / segment_span;
        if remaining <= self.refill_threshold
            && state.next_segment.is_none()
            && !state.prefetch_inflight
        {
            // Pre-fetch needs a runtime to run on; without one the next
            // rollover simply allocates synchronously.
            if let (Ok(handle), Some(engine)) = (
                tokio::runtime::Handle::try_current(),
                self.weak_self.upgrade(),
            ) {
                state.prefetch_inflight = true;
                handle.spawn(async move { engine.prefetch() });
            }
        }
        drop(state);

        self.generated.fetch_add(1, Ordering::Relaxed);
        Ok(format_value(self.mode, self.length, value))
    }

    fn current(&self) -> i64 {
        self.state.lock().current
    }

    fn set_current(&self, position: i64) {
        self.state.lock().current = position;
    }

    fn stats(&self) -> Stats {
        let (current, last_persisted) = {
            let state = self.state.lock();
            (state.current, state.last_persisted)
        };
        let wasted = (last_persisted - current).max(0) as u64;
        Stats::new(self.generated.load(Ordering::Relaxed), wasted)
    }

    fn shutdown(&self) -> Result<()> {
        // Stop the checkpoint timer first so it cannot race the close save.
        if let Some(token) = self.checkpoint.lock().take() {
            token.cancel();
        }
        if self.save_on_close {
            let current = self.state.lock().current;
            self.store
                .save(&self.name, &self.config, current)
                .map_err(Error::persistence)?;
            self.state.lock().last_persisted = current;
        }
        Ok(())
    }
}
