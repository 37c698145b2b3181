use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::pow10;
use crate::error::{Error, Result};

/// Retry budget for collision re-draws before giving up on a call.
const MAX_RETRIES: u32 = 100;

/// Fixed-width random decimal identifiers with lifetime de-duplication.
///
/// The space is the closed interval `[10^(length-1), 10^length - 1]`. Every
/// issued value is remembered; once 80% of the space has been handed out the
/// kernel refuses further requests, which keeps the expected re-draw count
/// low and bounds the set's memory.
pub struct NumericRandomKernel {
    length: u32,
    lo: i64,
    hi: i64,
    issued: HashSet<i64>,
    rng: StdRng,
}

impl NumericRandomKernel {
    pub fn new(length: u32) -> Self {
        Self {
            length,
            lo: pow10(length - 1),
            hi: pow10(length) - 1,
            issued: HashSet::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn next(&mut self) -> Result<String> {
        // Integer form of `issued / space >= 0.8`; float arithmetic would
        // misjudge the boundary on exactly divisible spaces.
        let space = self.hi - self.lo + 1;
        if self.issued.len() as i64 * 10 >= space * 8 {
            return Err(Error::Exhausted);
        }

        for _ in 0..MAX_RETRIES {
            let candidate = self.rng.random_range(self.lo..=self.hi);
            if self.issued.insert(candidate) {
                return Ok(format!(
                    "{candidate:0width$}",
                    width = self.length as usize
                ));
            }
        }
        Err(Error::Exhausted)
    }

    #[cfg(test)]
    pub(crate) fn issued_len(&self) -> usize {
        self.issued.len()
    }
}
