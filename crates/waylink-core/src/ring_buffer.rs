//! See [`RingBuffer`].

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex},
};

use crate::error::RingBufferError;

/// A fixed-capacity FIFO queue with its own internal mutual exclusion.
///
/// `RingBuffer` is deliberately safe to use from multiple producers and
/// multiple consumers at once: every operation takes the internal lock for
/// the duration of the O(1) work it does, then releases it. Callers that
/// hold an *outer* lock (for example the orchestrator's task lock) may still
/// call into a `RingBuffer` without risking a stall, since `push`/`pop` never
/// block on anything but this inner lock.
///
/// `push` fails with [`RingBufferError::Overflow`] once `len() == capacity()`
/// rather than overwriting the oldest entry; callers are expected to treat
/// this as a drop, not a fatal error.
#[derive(Debug)]
pub struct RingBuffer<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`; a buffer that can hold nothing is never
    /// useful and almost always indicates a configuration mistake.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ring buffer capacity must be at least 1");
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
        }
    }

    /// Pushes a single value onto the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`RingBufferError::Overflow`] if the buffer is already full;
    /// the value is returned to the caller unchanged (dropped by them, not
    /// by us) via `Err`, with the pushed value discarded from the buffer's
    /// perspective.
    pub fn push(&self, value: T) -> Result<(), RingBufferError> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= self.capacity {
            return Err(RingBufferError::Overflow);
        }
        guard.push_back(value);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pops the oldest value off the front of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`RingBufferError::Underflow`] if the buffer is empty.
    pub fn pop(&self) -> Result<T, RingBufferError> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.pop_front().ok_or(RingBufferError::Underflow)
    }

    /// Blocks the calling thread until a value is available, then pops it.
    ///
    /// Used by the orchestrator worker to avoid a busy-spin on an empty task
    /// queue; `wait_timeout` bounds how long we block so the worker can still
    /// observe a cancellation flag between wakeups.
    pub fn pop_wait(&self, timeout: std::time::Duration) -> Option<T> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (mut guard, _) = self
            .not_empty
            .wait_timeout_while(guard, timeout, VecDeque::is_empty)
            .unwrap_or_else(|e| e.into_inner());
        guard.pop_front()
    }

    /// Removes every queued value.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.clear();
    }

    /// Number of values currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the queue currently holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of values this buffer can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
