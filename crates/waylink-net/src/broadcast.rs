//! See [`Broadcast`].

use waylink_core::{Frame, Meta, PreEncodeFrame, Scheme};

use crate::base::{Network, SendOptions};
use crate::error::NetError;

/// The promiscuous-address overlay: transports every packet via the
/// broadcast address, adding no layer of its own beyond [`Network`]'s.
pub struct Broadcast {
    base: Network,
}

impl Broadcast {
    /// Builds a broadcast overlay for a node at `local_address`.
    #[must_use]
    pub fn new(local_address: Vec<u8>, counter: bool, ack: bool) -> Self {
        Self {
            base: Network::new(local_address, counter, ack),
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
        self.base.init_connection(scheme)
    }

    /// Forwards straight to the base overlay; destination is always broadcast.
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
        opts.dest_address = Some(self.base.broadcast_address());
        self.base.process_send(frame, meta, &opts)
    }

    /// Forwards straight to the base overlay; every address is accepted.
    #[must_use]
    pub fn process_recv(&self, frame: &Frame, meta: &mut Meta) -> bool {
        self.base.process_recv(frame, meta)
    }
}
