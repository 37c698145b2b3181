use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use super::*;
use crate::config::MonotonicMode;
use crate::error::Error;
use crate::time::{TWITTER_EPOCH_MS, TimeSource, WallClock};

/// A clock that replays a fixed list of timestamps, then repeats the last
/// one forever. Drives sequence wrap and regression deterministically.
struct StepClock {
    values: Vec<u64>,
    index: AtomicUsize,
}

impl StepClock {
    fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            index: AtomicUsize::new(0),
        }
    }
}

impl TimeSource for StepClock {
    fn current_millis(&self) -> u64 {
        let index = self.index.fetch_add(1, Ordering::Relaxed);
        self.values[index.min(self.values.len() - 1)]
    }
}

fn snowflake_at(values: Vec<u64>) -> SnowflakeKernel {
    SnowflakeKernel::new(1, 0, Box::new(StepClock::new(values)))
}

fn decompose(id: &str) -> (i64, i64, i64, i64) {
    let id: i64 = id.parse().unwrap();
    (id >> 22, (id >> 17) & 0x1F, (id >> 12) & 0x1F, id & 0xFFF)
}

#[test]
fn monotonic_sequence_counts_from_starting() {
    let mut kernel = MonotonicKernel::new(MonotonicMode::Sequence, 0, 1, 0);
    assert_eq!(kernel.next().unwrap(), "0");
    assert_eq!(kernel.next().unwrap(), "1");
    assert_eq!(kernel.next().unwrap(), "2");
    assert_eq!(kernel.current(), 3);
}

#[test]
fn monotonic_sequence_honors_step() {
    let mut kernel = MonotonicKernel::new(MonotonicMode::Sequence, 0, 25, 100);
    assert_eq!(kernel.next().unwrap(), "100");
    assert_eq!(kernel.next().unwrap(), "125");
    assert_eq!(kernel.next().unwrap(), "150");
}

#[test]
fn monotonic_fixed_pads_to_length() {
    let mut kernel = MonotonicKernel::new(MonotonicMode::Fixed, 6, 1, 7);
    assert_eq!(kernel.next().unwrap(), "000007");
    assert_eq!(kernel.next().unwrap(), "000008");
}

#[test]
fn monotonic_fixed_exhausts_past_cap() {
    let mut kernel = MonotonicKernel::new(MonotonicMode::Fixed, 2, 1, 98);
    assert_eq!(kernel.next().unwrap(), "98");
    assert_eq!(kernel.next().unwrap(), "99");
    assert!(matches!(kernel.next(), Err(Error::Exhausted)));
    // Failure leaves the counter where it was.
    assert!(matches!(kernel.next(), Err(Error::Exhausted)));
}

#[test]
fn numeric_random_is_unique_until_threshold() {
    // Space 10..=99 holds 90 values; 80% of it is 72.
    let mut kernel = NumericRandomKernel::new(2);
    let mut seen = HashSet::new();
    for _ in 0..72 {
        let value = kernel.next().unwrap();
        assert_eq!(value.len(), 2);
        let parsed: i64 = value.parse().unwrap();
        assert!((10..=99).contains(&parsed));
        assert!(seen.insert(value), "duplicate identifier issued");
    }
    assert_eq!(kernel.issued_len(), 72);
    assert!(matches!(kernel.next(), Err(Error::Exhausted)));
}

#[test]
fn numeric_random_pads_short_draws() {
    let mut kernel = NumericRandomKernel::new(3);
    for _ in 0..50 {
        let value = kernel.next().unwrap();
        assert_eq!(value.len(), 3);
    }
}

#[test]
fn alphanumeric_hex_truncates_odd_lengths() {
    let mut kernel = AlphanumericKernel::new(5, Charset::Hex);
    for _ in 0..20 {
        let value = kernel.next().unwrap();
        assert_eq!(value.len(), 5);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

#[test]
fn alphanumeric_base62_stays_in_alphabet() {
    let mut kernel = AlphanumericKernel::new(64, Charset::Base62);
    for _ in 0..20 {
        let value = kernel.next().unwrap();
        assert_eq!(value.len(), 64);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

#[test]
fn snowflake_increments_sequence_within_one_millisecond() {
    let ts = TWITTER_EPOCH_MS + 42;
    let mut kernel = snowflake_at(vec![ts; 16]);
    let (t1, dc, machine, s1) = decompose(&kernel.next().unwrap());
    let (t2, _, _, s2) = decompose(&kernel.next().unwrap());
    let (t3, _, _, s3) = decompose(&kernel.next().unwrap());
    assert_eq!((t1, t2, t3), (42, 42, 42));
    assert_eq!((s1, s2, s3), (0, 1, 2));
    assert_eq!(dc, 0);
    assert_eq!(machine, 1);
}

#[test]
fn snowflake_resets_sequence_on_new_millisecond() {
    let ts = TWITTER_EPOCH_MS + 42;
    let mut kernel = snowflake_at(vec![ts, ts, ts + 1]);
    let (_, _, _, s1) = decompose(&kernel.next().unwrap());
    let (_, _, _, s2) = decompose(&kernel.next().unwrap());
    let (t3, _, _, s3) = decompose(&kernel.next().unwrap());
    assert_eq!((s1, s2), (0, 1));
    assert_eq!((t3, s3), (43, 0));
}

#[test]
fn snowflake_spins_past_sequence_wrap() {
    let ts = TWITTER_EPOCH_MS + 42;
    // Enough stuck reads to wrap the 12-bit sequence, then the clock moves.
    let mut values = vec![ts; 4097];
    values.push(ts + 1);
    let mut kernel = snowflake_at(values);

    for i in 0..4096 {
        let (t, _, _, s) = decompose(&kernel.next().unwrap());
        assert_eq!(t, 42);
        assert_eq!(s, i);
    }
    // The 4097th call wraps and must wait out the millisecond.
    let (t, _, _, s) = decompose(&kernel.next().unwrap());
    assert_eq!(t, 43);
    assert_eq!(s, 0);
}

#[test]
fn snowflake_reports_clock_regression() {
    let ts = TWITTER_EPOCH_MS + 50;
    let mut kernel = snowflake_at(vec![ts, ts - 10]);
    kernel.next().unwrap();
    match kernel.next() {
        Err(Error::ClockRegression { behind_ms }) => assert_eq!(behind_ms, 10),
        other => panic!("expected clock regression, got {other:?}"),
    }
}

#[test]
fn snowflake_is_unique_under_contention() {
    let kernel = Mutex::new(SnowflakeKernel::new(1, 0, Box::new(WallClock)));
    let mut all = HashSet::new();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                scope.spawn(|| {
                    let mut ids = Vec::with_capacity(625);
                    for _ in 0..625 {
                        ids.push(kernel.lock().unwrap().next().unwrap());
                    }
                    ids
                })
            })
            .collect();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate snowflake identifier");
            }
        }
    });
    assert_eq!(all.len(), 10_000);
}

#[test]
fn uuid_standard_is_valid_v4() {
    let mut kernel = UuidKernel::new(UuidFormat::Standard);
    for _ in 0..20 {
        let value = kernel.next().unwrap();
        assert_eq!(value.len(), 36);
        let parsed = ::uuid::Uuid::parse_str(&value).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        // Variant bits: byte 8 top two bits are 0b10.
        assert_eq!(parsed.as_bytes()[8] >> 6, 0b10);
        assert_eq!(value, value.to_lowercase());
    }
}

#[test]
fn uuid_compact_drops_dashes() {
    let mut kernel = UuidKernel::new(UuidFormat::Compact);
    let value = kernel.next().unwrap();
    assert_eq!(value.len(), 32);
    assert!(!value.contains('-'));
    assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn kernel_dispatch_matches_kind() {
    let config = crate::ConfigPatch {
        kind: Some(Kind::NumericMonotonic),
        starting: Some(5),
        ..Default::default()
    }
    .into_config()
    .unwrap();
    let mut kernel = Kernel::new(&config, config.starting);
    assert_eq!(kernel.next().unwrap(), "5");
    assert_eq!(kernel.current(), 6);
    kernel.set_current(100);
    assert_eq!(kernel.next().unwrap(), "100");
}
