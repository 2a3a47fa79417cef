//! See [`FloodingChannel`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use waylink_core::{attr::bytes_attr, AttrValue, Frame, Meta, PreEncodeFrame, Scheme, Serializer};
use waylink_net::{Flooding, FloodingParams};
use waylink_security::Security;

use crate::error::ChannelError;
use crate::orchestrator::{ChannelWorker, Orchestrator};
use crate::random::Random;
use crate::scheduler::{ConnectionParams, ScheduleMode, Scheduler};
use crate::socket::Socket;

const FLOODING_POLL_QUANTUM: Duration = Duration::from_millis(10);

/// The name the single base-layer attribute carrying the flooded payload
/// must use. A [`FloodingChannel`]'s scheme is exactly one layer with one
/// `BYTES` attribute under this name; flooding's unit of dissemination is
/// one opaque payload rather than an arbitrary multi-attribute frame.
pub const DATA_ATTR: &str = "data";

/// Builds the one-attribute scheme every [`FloodingChannel`] is defined
/// over: a single `BYTES` layer named [`DATA_ATTR`], sized to `max_len`.
///
/// # Errors
///
/// See [`waylink_core::SchemeError`].
pub fn flooding_scheme(max_len: usize) -> Result<Scheme, waylink_core::SchemeError> {
    let mut scheme = Scheme::new();
    scheme.add_layer(vec![bytes_attr(DATA_ATTR, i64::try_from(max_len).unwrap_or(i64::MAX))?], vec![])?;
    Ok(scheme)
}

/// A channel driven entirely by the flooding overlay's own Trickle timer
/// rather than the scheduler's uplink/downlink alarms, per the "Flooding"
/// schedule mode: this type does not go through [`crate::channel::Channel`]
/// or the unified `Overlay` enum at all, since flooding's transmit/receive
/// rhythm is self-scheduled instead of driven by `send`/`receive` calls or
/// a periodic alarm.
///
/// The Trickle alarms themselves (`transmit_time`, interval boundary) are
/// modeled as a single polling thread rather than one-shot OS threads per
/// alarm, since a reset triggered by an inbound packet must be able to
/// pre-empt a pending alarm immediately; polling a short quantum against a
/// deadline that `restart_schedule` can move achieves that without needing
/// to cancel and respawn threads.
pub struct FloodingChannel {
    id: u8,
    flooding: Arc<Flooding>,
    security: Security,
    serializer: Serializer,
    orchestrator: Arc<Orchestrator>,
    scheduler: Arc<Scheduler>,
    rng: Mutex<StdRng>,
    transmit_deadline: Mutex<Instant>,
    interval_deadline: Mutex<Instant>,
    transmitted_this_interval: AtomicBool,
    cancel: Arc<AtomicBool>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl FloodingChannel {
    /// Builds a flooding channel over a one-attribute [`flooding_scheme`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the overlay or security pipeline rejects
    /// its own scheme registration.
    pub fn new(
        id: u8,
        mut scheme: Scheme,
        local_address: Vec<u8>,
        params: FloodingParams,
        initial_version: u32,
        initial_data: Vec<u8>,
        security: Security,
        random: &dyn Random,
        orchestrator: Arc<Orchestrator>,
        scheduler: Arc<Scheduler>,
    ) -> Result<Arc<Self>, ChannelError> {
        let mut flooding = Flooding::new(local_address, params, initial_version, initial_data);
        flooding.init_connection(&mut scheme)?;

        let mut serializer = Serializer::new(scheme);
        security.apply(&mut serializer)?;

        let mut seed = [0u8; 8];
        random.fill_bytes(&mut seed);
        let rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

        let now = Instant::now();
        Ok(Arc::new(Self {
            id,
            flooding: Arc::new(flooding),
            security,
            serializer,
            orchestrator,
            scheduler,
            rng: Mutex::new(rng),
            transmit_deadline: Mutex::new(now + params.i_min / 2),
            interval_deadline: Mutex::new(now + params.i_min),
            transmitted_this_interval: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            timers: Mutex::new(Vec::new()),
        }))
    }

    /// This channel's id, as carried in the leading byte of every packet on
    /// the wire.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// This node's current flooded payload.
    #[must_use]
    pub fn default_data(&self) -> Vec<u8> {
        self.flooding.default_data()
    }

    /// This node's current version id.
    #[must_use]
    pub fn version_id(&self) -> u32 {
        self.flooding.version_id()
    }

    /// The current Trickle interval length.
    #[must_use]
    pub fn interval_length(&self) -> Duration {
        self.flooding.interval_length()
    }

    /// Registers the socket and spawns the transmit-poll and downlink-listen
    /// threads.
    pub fn init_connection(self: &Arc<Self>, socket: Arc<dyn Socket>) {
        self.scheduler.set_connection_parameters(
            self.id,
            socket,
            ConnectionParams {
                mode: ScheduleMode::FloodingDriven,
                ..ConnectionParams::default()
            },
        );

        let listener = Arc::clone(self);
        let listen_cancel = Arc::clone(&self.cancel);
        self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(std::thread::spawn(move || {
            while !listen_cancel.load(Ordering::SeqCst) {
                listener.scheduler.downlink(listener.id);
                std::thread::sleep(FLOODING_POLL_QUANTUM);
            }
        }));

        let driver = Arc::clone(self);
        let drive_cancel = Arc::clone(&self.cancel);
        self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(std::thread::spawn(move || {
            while !drive_cancel.load(Ordering::SeqCst) {
                driver.drive_once();
                std::thread::sleep(FLOODING_POLL_QUANTUM);
            }
        }));
    }

    /// Stops the transmit-poll and listen threads and disconnects from the orchestrator.
    pub fn disconnect(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let mut timers = self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for handle in timers.drain(..) {
            let _ = handle.join();
        }
        self.orchestrator.disconnect(self.id);
    }

    fn drive_once(&self) {
        let now = Instant::now();

        if now >= *self.transmit_deadline.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
            && !self.transmitted_this_interval.swap(true, Ordering::SeqCst)
            && self.flooding.should_transmit()
        {
            self.transmit_default_data();
        }

        if now >= *self.interval_deadline.lock().unwrap_or_else(std::sync::PoisonError::into_inner) {
            let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            self.flooding.on_interval_end(&mut *rng);
            drop(rng);
            self.restart_schedule();
        }
    }

    /// Re-derives the transmit and interval deadlines from the flooding
    /// overlay's freshly-reset state. Called both after an interval
    /// boundary and after an inconsistent receive resets the interval.
    fn restart_schedule(&self) {
        let now = Instant::now();
        *self.transmit_deadline.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            now + self.flooding.transmit_time();
        *self.interval_deadline.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            now + self.flooding.interval_length();
        self.transmitted_this_interval.store(false, Ordering::SeqCst);
    }

    fn transmit_default_data(&self) {
        let mut frame = PreEncodeFrame::new(self.serializer.encoding_scheme().len());
        frame.push(0, AttrValue::Bytes(self.flooding.default_data()));

        let mut meta = Meta::new();
        if let Ok(()) = self.flooding.process_send(&mut frame, &mut meta) {
            self.security.process_send(&mut frame, &meta);
            if let Ok(bytes) = self.serializer.encode(&frame) {
                self.orchestrator.send_packet(self.id, bytes);
                self.scheduler.uplink(self.id);
            }
        }
    }
}

impl ChannelWorker for FloodingChannel {
    fn process(&self, bytes: Vec<u8>, mut meta: Meta) -> Option<(Frame, Meta)> {
        let (frame, decode_meta) = self.serializer.decode(&bytes).ok()?;
        meta.redundant_bytes = decode_meta.redundant_bytes;
        self.security.process_recv(&frame, &mut meta);

        let new_data = frame.get(DATA_ATTR).and_then(AttrValue::as_bytes).unwrap_or(&[]).to_vec();
        let updated = {
            let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            self.flooding.process_recv(&frame, &mut meta, new_data, &mut *rng)
        };
        if updated {
            self.restart_schedule();
        }

        Some((frame, meta))
    }
}
