use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::SegmentEngine;

/// Checkpoint period for the `pre-checkpoint` and `pre_close` strategies.
pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(2);

/// Starts the per-dispenser checkpoint task.
///
/// The task holds only a weak reference, so a deleted dispenser is not kept
/// alive by its timer; the token is cancelled by the engine's shutdown path
/// *before* any close save runs, so the two never race. Outside a tokio
/// runtime (unit tests driving the engine directly) the timer is simply not
/// started — checkpointing degrades, correctness does not.
pub(crate) fn spawn_checkpoint_timer(engine: &Arc<SegmentEngine>, period: Duration) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::debug!(
            dispenser = engine.name(),
            "no async runtime; checkpoint timer not started"
        );
        return;
    };

    let token = CancellationToken::new();
    engine.set_checkpoint_token(token.clone());
    let weak = Arc::downgrade(engine);

    handle.spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(engine) = weak.upgrade() else { break };
                    if let Err(err) = engine.checkpoint() {
                        // Background failures never fail user requests; the
                        // next tick retries.
                        tracing::warn!(
                            dispenser = engine.name(),
                            error = %err,
                            "checkpoint save failed"
                        );
                    }
                }
            }
        }
    });
}
