use crate::config::{MonotonicMode, pow10};
use crate::error::{Error, Result};

/// Renders a monotonic value: zero-padded to `length` in fixed mode, plain
/// decimal in sequence mode.
pub(crate) fn format_value(mode: MonotonicMode, length: u32, value: i64) -> String {
    match mode {
        MonotonicMode::Fixed => format!("{value:0width$}", width = length as usize),
        MonotonicMode::Sequence => value.to_string(),
    }
}

/// A counter advancing by `step`, emit-then-increment.
///
/// This is the direct (non-segmented) monotonic path; the segment engine
/// reimplements the advance inside its allocator and shares only the
/// formatting and cap rules.
pub struct MonotonicKernel {
    mode: MonotonicMode,
    length: u32,
    step: i64,
    current: i64,
}

impl MonotonicKernel {
    pub fn new(mode: MonotonicMode, length: u32, step: i64, starting: i64) -> Self {
        Self {
            mode,
            length,
            step,
            current: starting,
        }
    }

    pub fn next(&mut self) -> Result<String> {
        if self.mode == MonotonicMode::Fixed && self.current > pow10(self.length) - 1 {
            return Err(Error::Exhausted);
        }
        let value = self.current;
        self.current += self.step;
        Ok(format_value(self.mode, self.length, value))
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn set_current(&mut self, position: i64) {
        self.current = position;
    }
}
