use crate::error::{Error, Result};
use crate::time::{TWITTER_EPOCH_MS, TimeSource};

const SEQUENCE_MASK: i64 = 0xFFF;
const TIMESTAMP_SHIFT: u32 = 22;
const DATACENTER_SHIFT: u32 = 17;
const MACHINE_SHIFT: u32 = 12;
const SHARD_MASK: i64 = 0x1F;

/// Classic 64-bit snowflake layout:
/// 41-bit millisecond delta | 5-bit datacenter | 5-bit machine | 12-bit
/// sequence, timestamped against the Twitter epoch.
///
/// When the 12-bit sequence wraps within one millisecond the kernel
/// busy-waits for the clock to advance. A clock observed moving *backwards*
/// is reported as [`Error::ClockRegression`] instead of silently reusing a
/// timestamp window; the caller decides whether to retry.
pub struct SnowflakeKernel {
    machine_id: i64,
    datacenter_id: i64,
    last_timestamp_ms: i64,
    sequence: i64,
    clock: Box<dyn TimeSource>,
}

impl SnowflakeKernel {
    pub fn new(machine_id: i64, datacenter_id: i64, clock: Box<dyn TimeSource>) -> Self {
        Self {
            machine_id,
            datacenter_id,
            last_timestamp_ms: 0,
            sequence: 0,
            clock,
        }
    }

    pub fn next(&mut self) -> Result<String> {
        let mut now = self.clock.current_millis() as i64;
        if now < self.last_timestamp_ms {
            return Err(Error::ClockRegression {
                behind_ms: (self.last_timestamp_ms - now) as u64,
            });
        }

        if now == self.last_timestamp_ms {
            self.sequence = (self.sequence + 1) & SEQUENCE_MASK;
            if self.sequence == 0 {
                // Sequence wrapped: 4096 identifiers in one millisecond.
                // Spin until the next tick.
                while now <= self.last_timestamp_ms {
                    core::hint::spin_loop();
                    now = self.clock.current_millis() as i64;
                }
            }
        } else {
            self.sequence = 0;
        }
        self.last_timestamp_ms = now;

        let delta = now - TWITTER_EPOCH_MS as i64;
        let id = (delta << TIMESTAMP_SHIFT)
            | ((self.datacenter_id & SHARD_MASK) << DATACENTER_SHIFT)
            | ((self.machine_id & SHARD_MASK) << MACHINE_SHIFT)
            | self.sequence;
        Ok(id.to_string())
    }
}
