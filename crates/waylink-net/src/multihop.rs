//! See [`MultiHopUnicast`].

use std::collections::HashMap;
use std::sync::Mutex;

use waylink_core::attr::bytes_attr;
use waylink_core::ring_buffer::RingBuffer;
use waylink_core::{AttrValue, Frame, Meta, PreEncodeFrame, Scheme};

use crate::base::{Network, SendOptions, IS_ACK, NEEDS_ACK};
use crate::error::NetError;

const ACK_REQUEST_BUFFER_CAPACITY: usize = 16;

/// What a node should do with an inbound multi-hop frame.
///
/// Forwarding and rebroadcasting are reported back to the caller rather than
/// performed inline, since re-sending requires the channel's full send path
/// (security pipeline, serializer, scheduler) which this overlay does not
/// own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvAction {
    /// This node is `dest_address`; deliver the frame up the stack.
    Deliver,
    /// Forward toward `dest_address` via `next_hop`, preserving `origin_address`.
    Forward {
        /// Final destination, unchanged from the inbound frame.
        dest_address: Vec<u8>,
        /// Next hop looked up from the routing table.
        next_hop: Vec<u8>,
    },
    /// Re-broadcast with no ack, since the intermediate hop is itself a broadcast point.
    Rebroadcast,
    /// Neither this node, the intermediate hop, nor a broadcast; drop.
    Drop,
}

/// Store-and-forward addressing on top of [`Network`].
///
/// Adds a trailing `(intermediate_address, dest_address, origin_address)`
/// layer. The intermediate hop for a destination is looked up in a supplied
/// routing table; routing-protocol discovery that populates the table is out
/// of scope.
pub struct MultiHopUnicast {
    base: Network,
    routing_layer: Option<usize>,
    routing_table: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    ack_requests: Mutex<HashMap<Vec<u8>, RingBuffer<u8>>>,
}

impl MultiHopUnicast {
    /// Builds a multi-hop unicast overlay for a node at `local_address`.
    #[must_use]
    pub fn new(local_address: Vec<u8>, counter: bool, ack: bool) -> Self {
        Self {
            base: Network::new(local_address, counter, ack),
            routing_layer: None,
            routing_table: Mutex::new(HashMap::new()),
            ack_requests: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying base overlay, for callback/seed configuration.
    pub fn base_mut(&mut self) -> &mut Network {
        &mut self.base
    }

    /// Installs or replaces the next hop for `dest_address`.
    pub fn set_route(&self, dest_address: Vec<u8>, next_hop: Vec<u8>) {
        self.routing_table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(dest_address, next_hop);
    }

    /// # Errors
    ///
    /// See [`waylink_core::SchemeError`].
    pub fn init_connection(&mut self, scheme: &mut Scheme) -> Result<(), NetError> {
        self.base.init_connection(scheme)?;
        let size = self.base.address_size() as i64;
        self.routing_layer = Some(scheme.add_layer(
            vec![
                bytes_attr("intermediate_address", size)?,
                bytes_attr("dest_address", size)?,
                bytes_attr("origin_address", size)?,
            ],
            vec![],
        )?);
        Ok(())
    }

    /// Looks up the next hop for `dest_address`, appends the routing layer,
    /// and forwards to the base overlay.
    ///
    /// Opportunistically clears `IS_ACK` if no ack request is queued for
    /// `dest_address`, mirroring [`crate::Unicast::process_send`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NoRoute`] if no route to `dest_address` is known.
    pub fn process_send(
        &self,
        frame: &mut PreEncodeFrame,
        meta: &mut Meta,
        mut opts: SendOptions,
    ) -> Result<(), NetError> {
        let dest = opts.dest_address.clone().ok_or(NetError::NoRoute)?;
        let next_hop = self
            .routing_table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&dest)
            .cloned()
            .ok_or(NetError::NoRoute)?;
        let origin = meta
            .origin_address
            .clone()
            .unwrap_or_else(|| self.base.local_address().to_vec());

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
        let layer = self.routing_layer.expect("init_connection ran");
        frame.push(layer, AttrValue::Bytes(next_hop));
        frame.push(layer, AttrValue::Bytes(dest));
        frame.push(layer, AttrValue::Bytes(origin));
        Ok(())
    }

    /// Decides whether to deliver, forward, rebroadcast, or drop an inbound frame.
    #[must_use]
    pub fn process_recv(&self, frame: &Frame, meta: &mut Meta) -> RecvAction {
        if !self.base.process_recv(frame, meta) {
            return RecvAction::Drop;
        }

        let (Some(intermediate), Some(dest), Some(origin)) = (
            frame.get("intermediate_address").and_then(AttrValue::as_bytes),
            frame.get("dest_address").and_then(AttrValue::as_bytes),
            frame.get("origin_address").and_then(AttrValue::as_bytes),
        ) else {
            return RecvAction::Drop;
        };
        meta.origin_address = Some(origin.to_vec());

        let local = self.base.local_address();
        let broadcast = self.base.broadcast_address();

        if dest == local {
            if meta.ack_type.unwrap_or(0) & NEEDS_ACK != 0 {
                meta.sender_address = Some(origin.to_vec());
                if let Some(packet_id) = meta.packet_id {
                    let mut requests = self.ack_requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    let buf = requests
                        .entry(origin.to_vec())
                        .or_insert_with(|| RingBuffer::new(ACK_REQUEST_BUFFER_CAPACITY));
                    let _ = buf.push(packet_id);
                }
            }
            RecvAction::Deliver
        } else if intermediate == local {
            RecvAction::Forward {
                dest_address: dest.to_vec(),
                next_hop: self
                    .routing_table
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .get(dest)
                    .cloned()
                    .unwrap_or_else(|| broadcast.clone()),
            }
        } else if intermediate == broadcast.as_slice() {
            RecvAction::Rebroadcast
        } else {
            RecvAction::Drop
        }
    }
}
