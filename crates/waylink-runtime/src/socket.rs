//! See [`Socket`].

/// The radio/MAC driver interface the scheduler drives.
///
/// `waylink-runtime` never assumes anything about the transport beyond this:
/// a real implementation wraps a LoRa modem or similar low-bandwidth link,
/// and `waylink-sim` supplies an in-memory loopback pair for tests.
pub trait Socket: Send + Sync {
    /// Switches the socket between blocking and non-blocking mode.
    ///
    /// `send` is always issued under `setblocking(true)`; `recv` is always
    /// issued under `setblocking(false)`.
    fn set_blocking(&self, blocking: bool);

    /// Transmits `data` as a single packet.
    fn send(&self, data: &[u8]);

    /// Reads up to `buffer_size` bytes without blocking.
    ///
    /// Returns an empty vector when no data is currently available.
    fn recv(&self, buffer_size: usize) -> Vec<u8>;
}
