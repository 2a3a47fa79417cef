//! See [`LoopbackSocket`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use waylink_runtime::Socket;

/// One end of an in-memory, message-oriented loopback link.
///
/// Each `send` enqueues one whole packet; each `recv` dequeues at most one,
/// truncated to `buffer_size` if it somehow exceeds it. This mirrors how a
/// real packet radio's `recv` call hands back one frame at a time rather
/// than a raw byte stream.
pub struct LoopbackSocket {
    tx: Sender<Vec<u8>>,
    rx: Mutex<Receiver<Vec<u8>>>,
    blocking: AtomicBool,
}

/// Builds a connected pair of [`LoopbackSocket`]s: whatever one side sends,
/// the other receives.
#[must_use]
pub fn loopback_pair() -> (Arc<LoopbackSocket>, Arc<LoopbackSocket>) {
    let (tx_a, rx_b) = mpsc::channel();
    let (tx_b, rx_a) = mpsc::channel();
    (
        Arc::new(LoopbackSocket {
            tx: tx_a,
            rx: Mutex::new(rx_a),
            blocking: AtomicBool::new(false),
        }),
        Arc::new(LoopbackSocket {
            tx: tx_b,
            rx: Mutex::new(rx_b),
            blocking: AtomicBool::new(false),
        }),
    )
}

impl Socket for LoopbackSocket {
    fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::SeqCst);
    }

    fn send(&self, data: &[u8]) {
        // The peer may have been dropped in a test; a loopback send with no
        // reader is simply discarded, same as a radio transmitting into the
        // void.
        let _ = self.tx.send(data.to_vec());
    }

    fn recv(&self, buffer_size: usize) -> Vec<u8> {
        let rx = self.rx.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let packet = if self.blocking.load(Ordering::SeqCst) {
            rx.recv().ok()
        } else {
            rx.try_recv().ok()
        };
        let mut bytes = packet.unwrap_or_default();
        bytes.truncate(buffer_size);
        bytes
    }
}
