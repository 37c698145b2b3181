use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::Charset;
use crate::error::Result;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Random hex or base62 strings of a fixed length.
///
/// Draws come from a per-dispenser ChaCha-based generator seeded from the
/// OS; `random_range` rejection-samples, so base62 output carries no modulo
/// bias.
pub struct AlphanumericKernel {
    length: u32,
    charset: Charset,
    rng: StdRng,
}

impl AlphanumericKernel {
    pub fn new(length: u32, charset: Charset) -> Self {
        Self {
            length,
            charset,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn next(&mut self) -> Result<String> {
        let length = self.length as usize;
        match self.charset {
            Charset::Hex => {
                let mut bytes = vec![0u8; length.div_ceil(2)];
                self.rng.fill_bytes(&mut bytes);
                let mut encoded = hex::encode(bytes);
                encoded.truncate(length);
                Ok(encoded)
            }
            Charset::Base62 => Ok((0..length)
                .map(|_| BASE62_ALPHABET[self.rng.random_range(0..BASE62_ALPHABET.len())] as char)
                .collect()),
        }
    }
}
