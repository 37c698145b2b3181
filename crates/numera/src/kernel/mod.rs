//! The five generation algorithms.
//!
//! A kernel is a pure function of its own state producing the next
//! identifier string. Kernels know nothing about durability or concurrency;
//! the engine layer serializes calls under the per-dispenser lock and
//! decides what (if anything) gets persisted.

mod alphanumeric;
mod monotonic;
mod numeric_random;
mod snowflake;
mod uuid;

pub use alphanumeric::AlphanumericKernel;
pub use monotonic::MonotonicKernel;
pub(crate) use monotonic::format_value;
pub use numeric_random::NumericRandomKernel;
pub use snowflake::SnowflakeKernel;
pub use uuid::UuidKernel;

use crate::config::{Charset, Config, Kind, UuidFormat};
use crate::error::Result;
use crate::time::WallClock;

/// A dispenser's algorithm state, dispatched by kind.
pub enum Kernel {
    NumericRandom(NumericRandomKernel),
    Monotonic(MonotonicKernel),
    Alphanumeric(AlphanumericKernel),
    Snowflake(SnowflakeKernel),
    Uuid(UuidKernel),
}

impl Kernel {
    /// Builds the kernel for a validated configuration.
    ///
    /// `initial` seeds the monotonic counter (the `starting` value on
    /// creation, the saved position on restore); the other kinds carry no
    /// resumable progress and ignore it.
    pub fn new(config: &Config, initial: i64) -> Self {
        match config.kind {
            Kind::NumericRandom => Self::NumericRandom(NumericRandomKernel::new(config.length)),
            Kind::NumericMonotonic => Self::Monotonic(MonotonicKernel::new(
                config.mode(),
                config.length,
                config.step,
                initial,
            )),
            Kind::AlphanumericRandom => Self::Alphanumeric(AlphanumericKernel::new(
                config.length,
                config.charset.unwrap_or(Charset::Hex),
            )),
            Kind::Snowflake => Self::Snowflake(SnowflakeKernel::new(
                config.machine_id,
                config.datacenter_id,
                Box::new(WallClock),
            )),
            Kind::Uuid => Self::Uuid(UuidKernel::new(
                config.uuid_format.unwrap_or(UuidFormat::Standard),
            )),
        }
    }

    pub fn next(&mut self) -> Result<String> {
        match self {
            Self::NumericRandom(kernel) => kernel.next(),
            Self::Monotonic(kernel) => kernel.next(),
            Self::Alphanumeric(kernel) => kernel.next(),
            Self::Snowflake(kernel) => kernel.next(),
            Self::Uuid(kernel) => kernel.next(),
        }
    }

    /// The next monotonic value to hand out; zero for kinds without one.
    pub fn current(&self) -> i64 {
        match self {
            Self::Monotonic(kernel) => kernel.current(),
            _ => 0,
        }
    }

    pub fn set_current(&mut self, position: i64) {
        if let Self::Monotonic(kernel) = self {
            kernel.set_current(position);
        }
    }
}

#[cfg(test)]
mod tests;
