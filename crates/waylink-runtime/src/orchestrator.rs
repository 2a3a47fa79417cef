//! See [`Orchestrator`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use waylink_core::{Frame, Meta, RingBuffer};

use crate::clock::Clock;

const TASK_QUEUE_CAPACITY: usize = 256;
const WORKER_POLL_QUANTUM: Duration = Duration::from_millis(50);

/// One unit of work the orchestrator worker picks up.
///
/// Modeled as a closed enum rather than a tagged `(channel_id, assignment:
/// u8, payload)` triple: the worker's match is exhaustive, so the "unknown
/// assignment" fatal error a numeric tag would need is unreachable by
/// construction instead of a runtime check.
enum Assignment {
    /// Raw bytes just pulled off the socket by the scheduler's downlink.
    Received { bytes: Vec<u8>, meta: Meta },
    /// A frame the channel finished decoding, ready for delivery.
    Processed { frame: Frame, meta: Meta },
}

struct Task {
    channel_id: u8,
    assignment: Assignment,
}

/// Decodes raw bytes into a frame for one channel.
///
/// Implemented by [`crate::channel::Channel`]; kept as a trait here so the
/// orchestrator does not need to know about schemes, overlays or security.
pub trait ChannelWorker: Send + Sync {
    /// Attempts to decode `bytes` against this channel's scheme and security
    /// pipeline. Returns `None` if the packet was rejected (a codec error, a
    /// dropped overlay frame, or a failed security measure) rather than
    /// propagating an error: the worker must survive any single malformed
    /// packet.
    fn process(&self, bytes: Vec<u8>, meta: Meta) -> Option<(Frame, Meta)>;
}

struct ChannelSlot {
    worker: Arc<dyn ChannelWorker>,
    send_queue: RingBuffer<Vec<u8>>,
    processed_queue: RingBuffer<(Frame, Meta)>,
    processed_callback: Option<Arc<dyn Fn(&Frame, &Meta) + Send + Sync>>,
    running: bool,
}

/// Serializes receive-path processing across every channel through one
/// task queue and one worker thread.
///
/// Owns per-channel send and processed ring buffers so `send_packet` and
/// `retrieve` never need to reach into the worker thread; the worker only
/// ever contends on the coarse channel-table lock, and never performs
/// blocking I/O, so a stalled socket can never stall the worker.
pub struct Orchestrator {
    clock: Arc<dyn Clock>,
    task_queue: Arc<RingBuffer<Task>>,
    channels: Arc<Mutex<HashMap<u8, ChannelSlot>>>,
    cancel: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Builds an orchestrator with its own task queue; call [`Orchestrator::start`]
    /// to spawn the worker thread.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            task_queue: Arc::new(RingBuffer::new(TASK_QUEUE_CAPACITY)),
            channels: Arc::new(Mutex::new(HashMap::new())),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the worker thread. Idempotent: a second call is a no-op.
    pub fn start(&self) {
        let mut worker_slot = self.worker.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if worker_slot.is_some() {
            return;
        }
        let clock = Arc::clone(&self.clock);
        let task_queue = Arc::clone(&self.task_queue);
        let channels = Arc::clone(&self.channels);
        let cancel = Arc::clone(&self.cancel);
        *worker_slot = Some(std::thread::spawn(move || worker_loop(&clock, &task_queue, &channels, &cancel)));
    }

    /// Signals the worker to stop and waits for it to exit.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let handle = self.worker.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Registers a channel so the worker will deliver tasks addressed to it.
    pub fn register_channel(
        &self,
        channel_id: u8,
        worker: Arc<dyn ChannelWorker>,
        buffer_size: usize,
        processed_callback: Option<Arc<dyn Fn(&Frame, &Meta) + Send + Sync>>,
    ) {
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.insert(
            channel_id,
            ChannelSlot {
                worker,
                send_queue: RingBuffer::new(buffer_size),
                processed_queue: RingBuffer::new(buffer_size),
                processed_callback,
                running: true,
            },
        );
    }

    /// Marks a channel as disconnected and drops its queued work.
    ///
    /// In-flight tasks already popped off the task queue for this channel are
    /// discarded by the worker once it observes `running == false`.
    pub fn disconnect(&self, channel_id: u8) {
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(slot) = channels.get_mut(&channel_id) {
            slot.running = false;
            slot.send_queue.clear();
            slot.processed_queue.clear();
        }
    }

    /// Prepends the channel id byte and queues `bytes` for the scheduler's
    /// uplink to pick up.
    ///
    /// Returns `1` on success, `0` if the channel's send queue is full (a
    /// drop, not an error) or the channel isn't registered.
    pub fn send_packet(&self, channel_id: u8, bytes: Vec<u8>) -> u8 {
        let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(slot) = channels.get(&channel_id) else {
            return 0;
        };
        let mut framed = Vec::with_capacity(bytes.len() + 1);
        framed.push(channel_id);
        framed.extend_from_slice(&bytes);
        u8::from(slot.send_queue.push(framed).is_ok())
    }

    /// Non-blocking pop from the channel's send queue, for the scheduler's
    /// uplink. The returned bytes already carry the leading channel id byte.
    #[must_use]
    pub fn pop_send(&self, channel_id: u8) -> Option<Vec<u8>> {
        let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.get(&channel_id).and_then(|slot| slot.send_queue.pop().ok())
    }

    /// Submits bytes the scheduler's downlink just read off the socket as a
    /// `RECEIVED` task. Drops silently (backpressure) if the task queue is full.
    pub fn submit_received(&self, channel_id: u8, bytes: Vec<u8>, meta: Meta) {
        let _ = self.task_queue.push(Task {
            channel_id,
            assignment: Assignment::Received { bytes, meta },
        });
    }

    /// Non-blocking pop from the channel's processed queue.
    ///
    /// Returns `(None, Meta::default())` on underflow, mirroring the
    /// original's empty-sentinel convention instead of an error the caller
    /// would have to handle every poll.
    #[must_use]
    pub fn retrieve(&self, channel_id: u8) -> (Option<Frame>, Meta) {
        let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(slot) = channels.get(&channel_id) else {
            return (None, Meta::new());
        };
        match slot.processed_queue.pop() {
            Ok((frame, meta)) => (Some(frame), meta),
            Err(_) => (None, Meta::new()),
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    clock: &Arc<dyn Clock>,
    task_queue: &RingBuffer<Task>,
    channels: &Mutex<HashMap<u8, ChannelSlot>>,
    cancel: &AtomicBool,
) {
    while !cancel.load(Ordering::SeqCst) {
        let Some(task) = task_queue.pop_wait(WORKER_POLL_QUANTUM) else {
            continue;
        };

        let is_running = {
            let channels = channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            channels.get(&task.channel_id).is_some_and(|slot| slot.running)
        };
        if !is_running {
            continue;
        }

        match task.assignment {
            Assignment::Received { bytes, meta } => {
                let worker = {
                    let channels = channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    channels.get(&task.channel_id).map(|slot| Arc::clone(&slot.worker))
                };
                let Some(worker) = worker else { continue };
                if let Some((frame, mut meta)) = worker.process(bytes, meta) {
                    meta.time_processed = Some(clock.now());
                    let _ = task_queue.push(Task {
                        channel_id: task.channel_id,
                        assignment: Assignment::Processed { frame, meta },
                    });
                }
            }
            Assignment::Processed { frame, meta } => {
                let mut channels = channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(slot) = channels.get_mut(&task.channel_id) {
                    let callback = slot.processed_callback.clone();
                    let _ = slot.processed_queue.push((frame.clone(), meta.clone()));
                    if let Some(callback) = callback {
                        callback(&frame, &meta);
                    }
                }
            }
        }
    }
}
