//! See [`Channel`].

use std::sync::{Arc, Mutex};

use waylink_core::{Frame, Meta, PreEncodeFrame, Scheme, Serializer};
use waylink_net::{Overlay, OverlayOutcome, SendOptions};
use waylink_security::Security;

use crate::error::ChannelError;
use crate::orchestrator::{ChannelWorker, Orchestrator};
use crate::random::Random;
use crate::scheduler::{ConnectionParams, ScheduleMode, Scheduler};
use crate::socket::Socket;

/// Glues one [`Scheme`] + one [`Overlay`] + one [`Security`] pipeline + one
/// scheduler slot into a single application-facing surface.
///
/// `send` runs the overlay's `process_send`, then the security send
/// pipeline, then serialization, then hands the bytes to the orchestrator's
/// send queue. [`Channel::process`] (invoked by the orchestrator worker, via
/// the [`ChannelWorker`] impl) is the mirror image for one received packet:
/// decode, the security receive pipeline, then the overlay's `process_recv`.
pub struct Channel {
    id: u8,
    base_layer_count: usize,
    overlay: Mutex<Overlay>,
    security: Security,
    serializer: Serializer,
    orchestrator: Arc<Orchestrator>,
    scheduler: Arc<Scheduler>,
    mode: ScheduleMode,
}

impl Channel {
    /// Builds a channel from an already-initialized overlay and scheme.
    ///
    /// `scheme` is the application's own layer stack, before any overlay or
    /// security layers are appended; `overlay.init_connection` and
    /// `security.apply` are run here, in that order, matching the
    /// counter → ack → identified → subclass → measures append order
    /// required for interop.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the overlay or security pipeline rejects
    /// its own scheme registration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u8,
        mut scheme: Scheme,
        mut overlay: Overlay,
        security: Security,
        random: &dyn Random,
        orchestrator: Arc<Orchestrator>,
        scheduler: Arc<Scheduler>,
        mode: ScheduleMode,
    ) -> Result<Self, ChannelError> {
        let base_layer_count = scheme.len();
        overlay.init_connection(&mut scheme)?;
        overlay.base_mut().seed_packet_id(random.next_byte());

        let mut serializer = Serializer::new(scheme);
        security.apply(&mut serializer)?;

        Ok(Self {
            id,
            base_layer_count,
            overlay: Mutex::new(overlay),
            security,
            serializer,
            orchestrator,
            scheduler,
            mode,
        })
    }

    /// This channel's id, as carried in the leading byte of every packet on
    /// the wire.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Builds an empty frame sized to this channel's full scheme (base
    /// layers plus every overlay and security layer), ready for the caller
    /// to fill in the base layers' values before calling [`Channel::send`].
    #[must_use]
    pub fn new_frame(&self) -> PreEncodeFrame {
        PreEncodeFrame::new(self.serializer.encoding_scheme().len())
    }

    /// Registers this channel's socket and schedule with the scheduler.
    pub fn init_connection(&self, socket: Arc<dyn Socket>, params: ConnectionParams) {
        self.scheduler.set_connection_parameters(self.id, socket, params);
    }

    /// Sends one frame: overlay layers, then security pipeline, then
    /// serialization, then queues the bytes for the scheduler's uplink.
    ///
    /// For [`ScheduleMode::Synchronous`] and
    /// [`ScheduleMode::ImplicitSynchronousGateway`] this also triggers an
    /// immediate uplink; for [`ScheduleMode::ImplicitSynchronous`] it drives
    /// the full transmit-then-receive-window sequence. Asynchronous and
    /// flooding-driven channels rely on their own timers instead.
    pub fn send(&self, frame: &mut PreEncodeFrame, opts: SendOptions) -> Result<Meta, ChannelError> {
        self.send_with_meta(frame, opts, Meta::new())
    }

    /// Same as [`Channel::send`], but seeded with a caller-supplied `Meta`
    /// instead of an empty one. Used by [`Channel::forward_or_rebroadcast`]
    /// so a multi-hop forward can carry the inbound packet's
    /// `origin_address` through to the overlay's `process_send`, rather than
    /// having it default to this node's own address.
    fn send_with_meta(
        &self,
        frame: &mut PreEncodeFrame,
        opts: SendOptions,
        mut meta: Meta,
    ) -> Result<Meta, ChannelError> {
        if !self.scheduler.has_socket(self.id) {
            return Err(ChannelError::NotConnected);
        }
        {
            let overlay = self.overlay.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            overlay.process_send(frame, &mut meta, opts)?;
        }
        self.security.process_send(frame, &meta);
        let bytes = self.serializer.encode(frame)?;
        self.orchestrator.send_packet(self.id, bytes);

        match self.mode {
            ScheduleMode::Synchronous | ScheduleMode::ImplicitSynchronousGateway => {
                self.scheduler.uplink(self.id);
            }
            ScheduleMode::ImplicitSynchronous { receive_delay, rx1, rx2 } => {
                self.scheduler.implicit_synchronous_send(self.id, receive_delay, rx1, rx2);
            }
            ScheduleMode::Asynchronous { .. } | ScheduleMode::FloodingDriven => {}
        }

        Ok(meta)
    }

    /// Pulls in any bytes currently waiting on the socket (for synchronous
    /// modes, which have no downlink alarm) and returns the next processed
    /// frame, non-blocking.
    #[must_use]
    pub fn receive(&self) -> (Option<Frame>, Meta) {
        if matches!(self.mode, ScheduleMode::Synchronous | ScheduleMode::ImplicitSynchronousGateway) {
            self.scheduler.downlink(self.id);
        }
        self.orchestrator.retrieve(self.id)
    }

    /// Stops this channel's scheduling and drops its queued work.
    pub fn disconnect(&self) {
        self.orchestrator.disconnect(self.id);
    }

    /// Re-sends a frame this node is forwarding or rebroadcasting, carrying
    /// over `origin_address` and the ack bookkeeping (`ack_type`,
    /// `ack_req_id`, `packet_id`) from the inbound `meta` instead of starting
    /// from a blank slate.
    fn forward_or_rebroadcast(&self, frame: &Frame, meta: Meta, dest_address: Option<Vec<u8>>) {
        let mut out = PreEncodeFrame::new(self.serializer.encoding_scheme().len());
        for (layer_idx, layer) in frame.layers().iter().take(self.base_layer_count).enumerate() {
            for value in layer.values() {
                out.push(layer_idx, value.clone());
            }
        }

        let opts = SendOptions {
            dest_address,
            ack_type: meta.ack_type.unwrap_or(0),
            ack_req_id: meta.ack_req_id,
            packet_id: meta.packet_id,
        };
        let seed_meta = Meta { origin_address: meta.origin_address.clone(), ..Meta::new() };
        let _ = self.send_with_meta(&mut out, opts, seed_meta);
    }
}

impl ChannelWorker for Channel {
    fn process(&self, bytes: Vec<u8>, mut meta: Meta) -> Option<(Frame, Meta)> {
        let (frame, decode_meta) = self.serializer.decode(&bytes).ok()?;
        meta.redundant_bytes = decode_meta.redundant_bytes;
        self.security.process_recv(&frame, &mut meta);

        let outcome = {
            let overlay = self.overlay.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            overlay.process_recv(&frame, &mut meta)
        };

        match outcome {
            OverlayOutcome::Deliver => Some((frame, meta)),
            OverlayOutcome::Drop => None,
            OverlayOutcome::Forward { dest_address, .. } => {
                self.forward_or_rebroadcast(&frame, meta, Some(dest_address));
                None
            }
            OverlayOutcome::Rebroadcast => {
                self.forward_or_rebroadcast(&frame, meta, None);
                None
            }
        }
    }
}
