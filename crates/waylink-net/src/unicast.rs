//! See [`Unicast`].

use std::collections::HashMap;
use std::sync::Mutex;

use waylink_core::attr::bytes_attr;
use waylink_core::ring_buffer::RingBuffer;
use waylink_core::{AttrValue, Frame, Meta, PreEncodeFrame, Scheme};

use crate::base::{Network, SendOptions, IS_ACK};
use crate::error::NetError;

const ACK_REQUEST_BUFFER_CAPACITY: usize = 16;

/// Point-to-point addressing on top of [`Network`].
///
/// Adds a trailing `address` (destination) attribute, drops anything not
/// addressed to the local node or the broadcast address, and opportunistically
/// attaches `IS_ACK` to outbound packets toward a peer that has a pending ack
/// request queued against it.
pub struct Unicast {
    base: Network,
    address_layer: Option<usize>,
    ack_requests: Mutex<HashMap<Vec<u8>, RingBuffer<u8>>>,
}

impl Unicast {
    /// Builds a unicast overlay for a node at `local_address`.
    #[must_use]
    pub fn new(local_address: Vec<u8>, counter: bool, ack: bool) -> Self {
        Self {
            base: Network::new(local_address, counter, ack),
            address_layer: None,
            ack_requests: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying base overlay, for callback/seed configuration.
    pub fn base_mut(&mut self) -> &mut Network {
        &mut self.base
    }

    /// # Errors
    ///
    /// See [`waylink_core::SchemeError`].
    pub fn init_connection(&mut self, scheme: &mut Scheme) -> Result<(), NetError> {
        self.base.init_connection(scheme)?;
        let size = self.base.address_size() as i64;
        self.address_layer = Some(scheme.add_layer(vec![bytes_attr("address", size)?], vec![])?);
        Ok(())
    }

    /// Appends the base overlay's layers, then the destination address,
    /// opportunistically clearing `IS_ACK` if no ack request is queued for
    /// this destination.
    ///
    /// # Errors
    ///
    /// See [`Network::process_send`].
    pub fn process_send(
        &self,
        frame: &mut PreEncodeFrame,
        meta: &mut Meta,
        mut opts: SendOptions,
    ) -> Result<(), NetError> {
        let dest = opts.dest_address.clone().unwrap_or_else(|| self.base.broadcast_address());

        if opts.ack_type & IS_ACK != 0 {
            let mut requests = self.ack_requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(buf) = requests.get(&dest) {
                if let Ok(id) = buf.pop() {
                    opts.ack_req_id = Some(id);
                } else {
                    opts.ack_type &= 0b01;
                }
            } else {
                opts.ack_type &= 0b01;
            }
        }

        self.base.process_send(frame, meta, &opts)?;
        frame.push(self.address_layer.expect("init_connection ran"), AttrValue::Bytes(dest));
        Ok(())
    }

    /// Validates the base overlay, then drops anything not addressed to this
    /// node or the broadcast address, and queues ack requests for later send.
    ///
    /// Returns `false` when the frame must be dropped.
    #[must_use]
    pub fn process_recv(&self, frame: &Frame, meta: &mut Meta) -> bool {
        if !self.base.process_recv(frame, meta) {
            return false;
        }

        let Some(address) = frame.get("address").and_then(AttrValue::as_bytes) else {
            return true;
        };
        if address != self.base.local_address() && address != self.base.broadcast_address() {
            return false;
        }

        if meta.ack_type.unwrap_or(0) & crate::base::NEEDS_ACK != 0 {
            if let (Some(sender), Some(packet_id)) = (&meta.sender_address, meta.packet_id) {
                let mut requests = self.ack_requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let buf = requests
                    .entry(sender.clone())
                    .or_insert_with(|| RingBuffer::new(ACK_REQUEST_BUFFER_CAPACITY));
                let _ = buf.push(packet_id);
            }
        }

        true
    }
}
