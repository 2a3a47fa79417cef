//! See [`SeededRandom`].

use std::sync::Mutex;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use waylink_runtime::Random;

/// A [`Random`] backed by a seeded [`ChaCha8Rng`], for reproducible tests.
///
/// Production code must never use this: deterministic IVs and packet-id
/// seeds defeat the security guarantees they exist for.
pub struct SeededRandom {
    rng: Mutex<ChaCha8Rng>,
}

impl SeededRandom {
    /// Builds a random source seeded deterministically from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl Random for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .fill_bytes(dest);
    }
}
