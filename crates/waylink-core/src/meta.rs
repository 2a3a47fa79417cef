//! See [`Meta`].

use std::collections::HashMap;
use std::time::SystemTime;

/// Out-of-band, per-packet bookkeeping carried alongside a frame.
///
/// Every overlay and the orchestrator read and write a few well-known
/// fields directly; anything an individual overlay needs beyond that goes
/// into `extra`, keyed by that overlay's own attribute name so unrelated
/// overlays never collide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// Address of the peer the packet was received from or is destined to.
    pub sender_address: Option<Vec<u8>>,
    /// The ack-request bitfield (`NEEDS_ACK` / `IS_ACK`) carried by the ack overlay.
    pub ack_type: Option<u8>,
    /// The ack overlay's outbound packet id, or the id an inbound `IS_ACK` referenced.
    pub packet_id: Option<u8>,
    /// The id a queued ack request should be answered with.
    pub ack_req_id: Option<u8>,
    /// The address that originated a multi-hop frame.
    pub origin_address: Option<Vec<u8>>,
    /// Timestamp the orchestrator stamped on receipt from the socket.
    pub time_recv: Option<SystemTime>,
    /// Timestamp the worker stamped after `channel.process` returned a frame.
    pub time_processed: Option<SystemTime>,
    /// Bytes left over once every scheme layer was decoded.
    pub redundant_bytes: Vec<u8>,
    /// Overlay-specific fields not promoted to a named slot above.
    pub extra: HashMap<String, Vec<u8>>,
}

impl Meta {
    /// An empty `Meta`, as returned for a non-blocking `retrieve` underflow.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
