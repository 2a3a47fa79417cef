//! See [`Random`].

use rand::RngCore;

/// A cryptographically-secure random byte source.
///
/// Used to seed the ack overlay's `packet_id` counter and, via
/// `waylink-security`, to generate AES-CTR IVs. Injected so tests can swap in
/// a seeded, reproducible source; production code should only ever hand this
/// a CSPRNG.
pub trait Random: Send + Sync {
    /// Fills `dest` with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);

    /// A single random byte, e.g. to seed an 8-bit counter.
    fn next_byte(&self) -> u8 {
        let mut byte = [0u8; 1];
        self.fill_bytes(&mut byte);
        byte[0]
    }
}

/// A [`Random`] backed by the thread-local CSPRNG from the `rand` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl Random for ThreadRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }
}
