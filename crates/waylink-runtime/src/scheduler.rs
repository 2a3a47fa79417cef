//! See [`Scheduler`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use waylink_core::Meta;

use crate::clock::Clock;
use crate::orchestrator::Orchestrator;
use crate::socket::Socket;

/// Default chunk size `downlink` reads from the socket per `recv` call.
pub const DEFAULT_BUFFER_SIZE: usize = 32;
const IMPLICIT_SYNC_POLL_QUANTUM: Duration = Duration::from_millis(1);

/// The timing regime a channel's packets are sent and received under.
#[derive(Clone)]
pub enum ScheduleMode {
    /// Two periodic alarms: uplink every `uplink_interval`, downlink every
    /// `downlink_interval`, staggered by `uplink_downlink_interval`.
    Asynchronous {
        /// Period between uplink attempts.
        uplink_interval: Duration,
        /// Period between downlink polls.
        downlink_interval: Duration,
        /// Delay between starting the uplink and downlink alarms.
        uplink_downlink_interval: Duration,
    },
    /// No alarm; the application drives uplink/downlink directly from
    /// `Channel::send` / `Channel::receive`.
    Synchronous,
    /// LoRaWAN-style: on send, transmit, wait `receive_delay`, then open a
    /// receive window of `rx1`, falling back to `rx2` if nothing arrived.
    ImplicitSynchronous {
        /// Delay after transmission before the first receive window opens.
        receive_delay: Duration,
        /// Length of the first receive window.
        rx1: Duration,
        /// Length of the second receive window, opened only if `rx1` was silent.
        rx2: Duration,
    },
    /// The gateway side of implicit-synchronous: independent uplink/downlink
    /// triggers with no forced windowing, driven the same way as
    /// [`ScheduleMode::Synchronous`].
    ImplicitSynchronousGateway,
    /// Schedule is driven entirely by the flooding overlay's own Trickle
    /// timer; `start` is a no-op for channels in this mode.
    FloodingDriven,
}

/// Per-channel scheduling configuration.
#[derive(Clone)]
pub struct ConnectionParams {
    /// The transmission schedule for this channel.
    pub mode: ScheduleMode,
    /// Chunk size `downlink` reads per `recv` call.
    pub buffer_size: usize,
    /// Invoked after every successful `uplink` transmission.
    pub sent_callback: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Synchronous,
            buffer_size: DEFAULT_BUFFER_SIZE,
            sent_callback: None,
        }
    }
}

struct ChannelEntry {
    socket: Arc<dyn Socket>,
    params: ConnectionParams,
    cancel: Arc<AtomicBool>,
}

/// Owns the radio socket(s) and the timing regime for every registered channel.
///
/// `uplink`/`downlink` are the built-in schedule actions described in the
/// component design; both are plain methods here rather than "overridable
/// function slots" holding a raw dispatch table, since a caller who wants a
/// custom schedule can simply drive a channel synchronously and call its own
/// logic around `uplink`/`downlink` — idiomatic composition in place of
/// runtime slot overriding.
///
/// [`Scheduler::start`] and [`Scheduler::stop`] take `self` behind an `Arc`
/// since the asynchronous alarm threads they spawn need their own owned
/// handle back into the scheduler.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    clock: Arc<dyn Clock>,
    channels: Mutex<HashMap<u8, ChannelEntry>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Builds a scheduler driving channels through `orchestrator`.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            orchestrator,
            clock,
            channels: Mutex::new(HashMap::new()),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Whether `channel_id` has a socket registered via
    /// [`Scheduler::set_connection_parameters`].
    #[must_use]
    pub fn has_socket(&self, channel_id: u8) -> bool {
        let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.contains_key(&channel_id)
    }

    /// Records the socket and schedule for `channel_id`.
    pub fn set_connection_parameters(&self, channel_id: u8, socket: Arc<dyn Socket>, params: ConnectionParams) {
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.insert(
            channel_id,
            ChannelEntry {
                socket,
                params,
                cancel: Arc::new(AtomicBool::new(false)),
            },
        );
    }

    /// Launches the asynchronous alarms for every channel configured with
    /// [`ScheduleMode::Asynchronous`]. Synchronous and implicit-synchronous
    /// modes are driven by explicit `send`/`receive` calls instead.
    pub fn start(self: &Arc<Self>) {
        let channel_ids: Vec<(u8, Duration, Duration, Duration, Arc<AtomicBool>)> = {
            let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            channels
                .iter()
                .filter_map(|(&channel_id, entry)| match entry.params.mode {
                    ScheduleMode::Asynchronous {
                        uplink_interval,
                        downlink_interval,
                        uplink_downlink_interval,
                    } => Some((
                        channel_id,
                        uplink_interval,
                        downlink_interval,
                        uplink_downlink_interval,
                        Arc::clone(&entry.cancel),
                    )),
                    _ => None,
                })
                .collect()
        };

        let mut timers = self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (channel_id, uplink_interval, downlink_interval, uplink_downlink_interval, cancel) in channel_ids {
            let scheduler = Arc::clone(self);
            let uplink_cancel = Arc::clone(&cancel);
            timers.push(std::thread::spawn(move || {
                alarm_loop(uplink_interval, &uplink_cancel, || {
                    scheduler.uplink(channel_id);
                });
            }));

            let scheduler = Arc::clone(self);
            timers.push(std::thread::spawn(move || {
                std::thread::sleep(uplink_downlink_interval);
                alarm_loop(downlink_interval, &cancel, || {
                    scheduler.downlink(channel_id);
                });
            }));
        }
    }

    /// Sets every asynchronous channel's cancel flag so its alarm threads exit.
    pub fn stop(self: &Arc<Self>) {
        let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for entry in channels.values() {
            entry.cancel.store(true, Ordering::SeqCst);
        }
        drop(channels);
        let mut timers = self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for handle in timers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Pops one packet from the channel's send queue and transmits it.
    ///
    /// Returns `true` if a packet was sent, `false` if the send queue was empty.
    pub fn uplink(&self, channel_id: u8) -> bool {
        let Some(bytes) = self.orchestrator.pop_send(channel_id) else {
            return false;
        };
        let (socket, sent_callback) = {
            let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(entry) = channels.get(&channel_id) else {
                return false;
            };
            (Arc::clone(&entry.socket), entry.params.sent_callback.clone())
        };
        socket.set_blocking(true);
        socket.send(&bytes);
        socket.set_blocking(false);
        if let Some(callback) = sent_callback {
            callback();
        }
        true
    }

    /// Reads every available chunk off the channel's socket, routing each by
    /// its own leading channel-id byte rather than assuming it matches
    /// `channel_id` — a socket may be shared by several logical channels, so
    /// the id carried on the wire is the only thing that can say which
    /// channel a given packet actually belongs to.
    ///
    /// Returns `true` only if at least one chunk was addressed to
    /// `channel_id` itself; implicit-synchronous receive windows use this to
    /// close early.
    pub fn downlink(&self, channel_id: u8) -> bool {
        let (socket, buffer_size) = {
            let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(entry) = channels.get(&channel_id) else {
                return false;
            };
            (Arc::clone(&entry.socket), entry.params.buffer_size)
        };
        socket.set_blocking(false);

        let mut matched = false;
        loop {
            let chunk = socket.recv(buffer_size);
            if chunk.is_empty() {
                break;
            }
            let Some((&received_channel_id, bytes_tail)) = chunk.split_first() else {
                break;
            };
            let mut meta = Meta::new();
            meta.time_recv = Some(self.clock.now());
            self.orchestrator
                .submit_received(received_channel_id, bytes_tail.to_vec(), meta);
            matched |= received_channel_id == channel_id;
        }
        matched
    }

    /// Drives an implicit-synchronous send: transmit, then poll a `rx1`
    /// receive window, falling back to `rx2` if nothing arrived.
    pub fn implicit_synchronous_send(&self, channel_id: u8, receive_delay: Duration, rx1: Duration, rx2: Duration) -> bool {
        self.uplink(channel_id);
        std::thread::sleep(receive_delay);
        if self.poll_window(channel_id, rx1) {
            return true;
        }
        self.poll_window(channel_id, rx2)
    }

    fn poll_window(&self, channel_id: u8, window: Duration) -> bool {
        let deadline = std::time::Instant::now() + window;
        while std::time::Instant::now() < deadline {
            if self.downlink(channel_id) {
                return true;
            }
            std::thread::sleep(IMPLICIT_SYNC_POLL_QUANTUM);
        }
        false
    }
}

fn alarm_loop(interval: Duration, cancel: &AtomicBool, mut tick: impl FnMut()) {
    while !cancel.load(Ordering::SeqCst) {
        std::thread::sleep(interval);
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        tick();
    }
}
