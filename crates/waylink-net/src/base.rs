//! See [`Network`].

use std::collections::HashMap;
use std::sync::Mutex;

use waylink_core::attr::{bytes_attr, int_attr};
use waylink_core::{AttrValue, Frame, Meta, PreEncodeFrame, Scheme};

use crate::error::NetError;

/// Bit set on `ack_type` when the sender wants the receiver to acknowledge the packet.
pub const NEEDS_ACK: u8 = 0b01;
/// Bit set on `ack_type` when this packet itself is an acknowledgment.
pub const IS_ACK: u8 = 0b10;

/// Parameters the application supplies for one outbound packet.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// `NEEDS_ACK` / `IS_ACK` bits requested by the caller.
    pub ack_type: u8,
    /// Destination address, for addressed overlays.
    pub dest_address: Option<Vec<u8>>,
    /// Id of a previously-queued ack request this packet should answer.
    pub ack_req_id: Option<u8>,
    /// Explicit packet id; `None` lets the ack feature allocate one.
    pub packet_id: Option<u8>,
}

/// An all-zero address of `size` bytes: the promiscuous/broadcast address.
#[must_use]
pub fn broadcast_address(size: usize) -> Vec<u8> {
    vec![0; size]
}

#[derive(Debug, Default)]
struct AckState {
    packet_id: u8,
    await_index: std::collections::HashSet<u8>,
}

/// The base network overlay: counter, ack, and identified-sender features,
/// shared by every concrete overlay (unicast, multi-hop, broadcast, flooding).
///
/// Features are selected independently at construction; `identified` is
/// forced on whenever `counter` or `ack` is, since both need to key their
/// per-sender state off an address.
pub struct Network {
    address_size: usize,
    local_address: Vec<u8>,
    counter: bool,
    ack: bool,
    identified: bool,

    counter_layer: Option<usize>,
    ack_layer: Option<usize>,
    identified_layer: Option<usize>,

    send_counters: Mutex<HashMap<Vec<u8>, u32>>,
    recv_counters: Mutex<HashMap<Vec<u8>, u32>>,
    ack_state: Mutex<AckState>,
    ack_callback: Option<std::sync::Arc<dyn Fn(u8) + Send + Sync>>,
}

impl Network {
    /// Builds a base overlay for a node at `local_address`.
    #[must_use]
    pub fn new(local_address: Vec<u8>, counter: bool, ack: bool) -> Self {
        let address_size = local_address.len();
        Self {
            address_size,
            local_address,
            counter,
            ack,
            identified: counter || ack,
            counter_layer: None,
            ack_layer: None,
            identified_layer: None,
            send_counters: Mutex::new(HashMap::new()),
            recv_counters: Mutex::new(HashMap::new()),
            ack_state: Mutex::new(AckState::default()),
            ack_callback: None,
        }
    }

    /// Registers the callback invoked exactly once per matched inbound ack.
    pub fn set_ack_callback(&mut self, callback: std::sync::Arc<dyn Fn(u8) + Send + Sync>) {
        self.ack_callback = Some(callback);
    }

    /// Configured address length in bytes.
    #[must_use]
    pub fn address_size(&self) -> usize {
        self.address_size
    }

    /// This node's own address.
    #[must_use]
    pub fn local_address(&self) -> &[u8] {
        &self.local_address
    }

    /// The all-zero broadcast address for this overlay's address size.
    #[must_use]
    pub fn broadcast_address(&self) -> Vec<u8> {
        broadcast_address(self.address_size)
    }

    /// Registers this overlay's layers on `scheme`, in the fixed
    /// counter → ack → identified order required for interop.
    ///
    /// # Errors
    ///
    /// See [`waylink_core::SchemeError`].
    pub fn init_connection(&mut self, scheme: &mut Scheme) -> Result<(), NetError> {
        if self.counter {
            self.counter_layer = Some(scheme.add_layer(vec![int_attr("counter", 3)?], vec![])?);
        }
        if self.ack {
            self.ack_layer = Some(scheme.add_layer(
                vec![
                    int_attr("packet_id", 1)?,
                    int_attr("ack_type", 1)?,
                    int_attr("ack_await_id", 1)?,
                ],
                vec![],
            )?);
        }
        if self.identified {
            self.identified_layer = Some(
                scheme.add_layer(vec![bytes_attr("sender_address", self.address_size as i64)?], vec![])?,
            );
        }
        Ok(())
    }

    fn next_packet_id(&self) -> u8 {
        let mut state = self.ack_state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = state.packet_id;
        state.packet_id = state.packet_id.wrapping_add(1);
        id
    }

    /// Seeds the packet-id counter from a byte drawn from a cryptographic RNG.
    pub fn seed_packet_id(&self, seed: u8) {
        let mut state = self.ack_state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.packet_id = seed;
    }

    /// Appends this overlay's layer values to an outbound frame.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` for symmetry with the rest of
    /// the overlay contract and to leave room for future validation.
    pub fn process_send(
        &self,
        frame: &mut PreEncodeFrame,
        meta: &mut Meta,
        opts: &SendOptions,
    ) -> Result<(), NetError> {
        if let Some(layer) = self.counter_layer {
            let key = opts.dest_address.clone().unwrap_or_default();
            let mut counters = self.send_counters.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let counter = counters.entry(key).or_insert(0);
            frame.push(layer, AttrValue::Int(u64::from(*counter)));
            *counter += 1;
        }

        if let Some(layer) = self.ack_layer {
            let packet_id = opts.packet_id.unwrap_or_else(|| self.next_packet_id());
            if opts.ack_type & NEEDS_ACK != 0 {
                let mut state = self.ack_state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                state.await_index.insert(packet_id);
            }
            frame.push(layer, AttrValue::Int(u64::from(packet_id)));
            frame.push(layer, AttrValue::Int(u64::from(opts.ack_type)));
            frame.push(layer, AttrValue::Int(u64::from(opts.ack_req_id.unwrap_or(0))));
            meta.packet_id = Some(packet_id);
            meta.ack_type = Some(opts.ack_type);
        }

        if let Some(layer) = self.identified_layer {
            frame.push(layer, AttrValue::Bytes(self.local_address.clone()));
        }

        Ok(())
    }

    /// Validates and strips this overlay's values from an inbound frame.
    ///
    /// Returns `false` when the frame must be dropped (a replayed or
    /// out-of-order counter value).
    pub fn process_recv(&self, frame: &Frame, meta: &mut Meta) -> bool {
        if self.identified_layer.is_some() {
            if let Some(addr) = frame.get("sender_address").and_then(AttrValue::as_bytes) {
                meta.sender_address = Some(addr.to_vec());
            }
        }

        if self.counter_layer.is_some() {
            let Some(recv_counter) = frame.get("counter").and_then(AttrValue::as_int) else {
                return true;
            };
            #[allow(clippy::cast_possible_truncation)]
            let recv_counter = recv_counter as u32;
            let key = meta.sender_address.clone().unwrap_or_default();
            let mut counters = self.recv_counters.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let last = counters.entry(key).or_insert(0);
            if recv_counter < *last {
                return false;
            }
            *last = recv_counter + 1;
        }

        if self.ack_layer.is_some() {
            let ack_type = frame.get("ack_type").and_then(AttrValue::as_int).unwrap_or(0) as u8;
            let packet_id = frame.get("packet_id").and_then(AttrValue::as_int).unwrap_or(0) as u8;
            let ack_await_id = frame.get("ack_await_id").and_then(AttrValue::as_int).unwrap_or(0) as u8;
            meta.ack_type = Some(ack_type);
            meta.packet_id = Some(packet_id);
            meta.ack_req_id = Some(ack_await_id);

            if ack_type & IS_ACK != 0 {
                let mut state = self.ack_state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if state.await_index.remove(&ack_await_id) {
                    drop(state);
                    if let Some(cb) = &self.ack_callback {
                        cb(ack_await_id);
                    }
                }
            }
        }

        true
    }

    /// Whether `id` is still registered as awaiting acknowledgment.
    #[must_use]
    pub fn is_awaiting_ack(&self, id: u8) -> bool {
        self.ack_state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .await_index
            .contains(&id)
    }
}
