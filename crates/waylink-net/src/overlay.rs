//! See [`Overlay`].

use waylink_core::{Frame, Meta, PreEncodeFrame, Scheme};

use crate::base::SendOptions;
use crate::error::NetError;
use crate::multihop::{MultiHopUnicast, RecvAction};
use crate::{Broadcast, Unicast};

/// What a channel should do with an inbound frame, normalized across the
/// three addressed overlays so a single façade can drive any of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayOutcome {
    /// Deliver the frame up the stack to the application.
    Deliver,
    /// Forward toward `dest_address` via `next_hop` (multi-hop only).
    Forward {
        /// Final destination, unchanged from the inbound frame.
        dest_address: Vec<u8>,
        /// Next hop looked up from the routing table.
        next_hop: Vec<u8>,
    },
    /// Re-broadcast with no ack (multi-hop only).
    Rebroadcast,
    /// Drop the frame silently.
    Drop,
}

/// One of the addressed network overlays a [`crate::Overlay`]-driven channel
/// can be built on.
///
/// A channel owns exactly one of these; which variant it is chosen once at
/// construction and does not change for the channel's lifetime. Flooding is
/// deliberately not a variant here: it is driven by its own Trickle timer
/// rather than the regular send/receive path this enum models, so a
/// flooding channel holds a [`crate::Flooding`] directly instead.
pub enum Overlay {
    /// Point-to-point addressing.
    Unicast(Unicast),
    /// Promiscuous-address broadcast.
    Broadcast(Broadcast),
    /// Store-and-forward multi-hop addressing.
    MultiHop(MultiHopUnicast),
}

impl Overlay {
    /// Registers this overlay's layers on `scheme`.
    ///
    /// # Errors
    ///
    /// See [`waylink_core::SchemeError`].
    pub fn init_connection(&mut self, scheme: &mut Scheme) -> Result<(), NetError> {
        match self {
            Overlay::Unicast(o) => o.init_connection(scheme),
            Overlay::Broadcast(o) => o.init_connection(scheme),
            Overlay::MultiHop(o) => o.init_connection(scheme),
        }
    }

    /// The underlying base overlay, for callback/seed configuration.
    pub fn base_mut(&mut self) -> &mut crate::base::Network {
        match self {
            Overlay::Unicast(o) => o.base_mut(),
            Overlay::Broadcast(o) => o.base_mut(),
            Overlay::MultiHop(o) => o.base_mut(),
        }
    }

    /// Appends this overlay's layer values to an outbound frame.
    ///
    /// # Errors
    ///
    /// See the concrete overlay's `process_send`.
    pub fn process_send(
        &self,
        frame: &mut PreEncodeFrame,
        meta: &mut Meta,
        opts: SendOptions,
    ) -> Result<(), NetError> {
        match self {
            Overlay::Unicast(o) => o.process_send(frame, meta, opts),
            Overlay::Broadcast(o) => o.process_send(frame, meta, opts),
            Overlay::MultiHop(o) => o.process_send(frame, meta, opts),
        }
    }

    /// Validates and classifies an inbound frame.
    #[must_use]
    pub fn process_recv(&self, frame: &Frame, meta: &mut Meta) -> OverlayOutcome {
        match self {
            Overlay::Unicast(o) => {
                if o.process_recv(frame, meta) {
                    OverlayOutcome::Deliver
                } else {
                    OverlayOutcome::Drop
                }
            }
            Overlay::Broadcast(o) => {
                if o.process_recv(frame, meta) {
                    OverlayOutcome::Deliver
                } else {
                    OverlayOutcome::Drop
                }
            }
            Overlay::MultiHop(o) => match o.process_recv(frame, meta) {
                RecvAction::Deliver => OverlayOutcome::Deliver,
                RecvAction::Forward { dest_address, next_hop } => {
                    OverlayOutcome::Forward { dest_address, next_hop }
                }
                RecvAction::Rebroadcast => OverlayOutcome::Rebroadcast,
                RecvAction::Drop => OverlayOutcome::Drop,
            },
        }
    }
}
