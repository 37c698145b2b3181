use std::time::{SystemTime, UNIX_EPOCH};

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC.
///
/// Snowflake identifiers embed their timestamp as milliseconds elapsed since
/// this origin.
pub const TWITTER_EPOCH_MS: u64 = 1_288_834_974_657;

/// A source of wall-clock milliseconds since the Unix epoch.
///
/// This abstraction exists so the snowflake kernel can be driven by a mocked
/// clock in tests: sequence wrap-around and clock regression are both
/// functions of what the clock reports, not of real time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> u64;
}

/// The system wall clock.
///
/// Unlike a monotonic counter, this clock *can* go backwards (NTP steps,
/// manual adjustment); the snowflake kernel detects and reports that rather
/// than silently reusing timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_millis() as u64
    }
}
