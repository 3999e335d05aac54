//! Shared pseudo-random source for noise samples and random failures.

use std::fmt;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// ChaCha8 generator behind a lock, so `&self` methods can draw from it.
///
/// A fixed seed makes noise samples and random failures replayable.
pub struct MockRng {
    inner: Mutex<ChaCha8Rng>,
}

impl MockRng {
    /// Seeded from `seed`, or from the OS when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// `true` with probability `rate`. Rates outside `0.0..=1.0` saturate.
    pub fn should_fail(&self, rate: f64) -> bool {
        match rate {
            r if r.is_nan() || r <= 0.0 => false,
            r if r >= 1.0 => true,
            r => self.inner.lock().gen_bool(r),
        }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&self) -> u64 {
        self.inner.lock().gen()
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for MockRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MockRng(ChaCha8)")
    }
}
