//! See [`Flooding`].

use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;

use waylink_core::attr::int_attr;
use waylink_core::{AttrValue, Frame, Meta, PreEncodeFrame, Scheme};

use crate::base::{Network, SendOptions};
use crate::error::NetError;

/// Trickle interval parameters for a [`Flooding`] overlay.
#[derive(Debug, Clone, Copy)]
pub struct FloodingParams {
    /// Shortest interval length.
    pub i_min: Duration,
    /// Longest interval length; intervals double toward this ceiling.
    pub i_max: Duration,
    /// Redundancy constant: suppress the scheduled transmission once this
    /// many consistent receptions have been observed this interval.
    pub k: u32,
    /// Whether a 2-byte `version_id` layer is attached and compared.
    pub versioning: bool,
}

/// Epidemic flood-fill dissemination on top of [`Network`], driven by a
/// Trickle-style adaptive interval.
///
/// The timer that actually fires at `transmit_time` and at interval
/// boundaries lives in the scheduler (see `waylink-runtime`); this type only
/// holds and advances the Trickle state machine so it can be driven
/// deterministically in tests.
pub struct Flooding {
    base: Network,
    version_layer: Option<usize>,
    params: FloodingParams,
    version_id: Mutex<u32>,
    default_data: Mutex<Vec<u8>>,
    interval_length: Mutex<Duration>,
    counter_c: Mutex<u32>,
    transmit_time: Mutex<Duration>,
}

impl Flooding {
    /// Builds a flooding overlay seeded with an initial version and payload.
    #[must_use]
    pub fn new(
        local_address: Vec<u8>,
        params: FloodingParams,
        initial_version: u32,
        initial_data: Vec<u8>,
    ) -> Self {
        Self {
            base: Network::new(local_address, false, false),
            version_layer: None,
            interval_length: Mutex::new(params.i_min),
            transmit_time: Mutex::new(params.i_min / 2),
            params,
            version_id: Mutex::new(initial_version),
            default_data: Mutex::new(initial_data),
            counter_c: Mutex::new(0),
        }
    }

    /// # Errors
    ///
    /// See [`waylink_core::SchemeError`].
    pub fn init_connection(&mut self, scheme: &mut Scheme) -> Result<(), NetError> {
        self.base.init_connection(scheme)?;
        if self.params.versioning {
            self.version_layer = Some(scheme.add_layer(vec![int_attr("version_id", 2)?], vec![])?);
        }
        Ok(())
    }

    /// Current interval length.
    #[must_use]
    pub fn interval_length(&self) -> Duration {
        *self.interval_length.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current consistent-reception counter `c`.
    #[must_use]
    pub fn counter(&self) -> u32 {
        *self.counter_c.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// This node's current version id.
    #[must_use]
    pub fn version_id(&self) -> u32 {
        *self.version_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// This node's current payload.
    #[must_use]
    pub fn default_data(&self) -> Vec<u8> {
        self.default_data.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Offset into the current interval at which the node should transmit,
    /// if `counter() < k` when that moment arrives.
    #[must_use]
    pub fn transmit_time(&self) -> Duration {
        *self.transmit_time.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether the node should actually send `default_data` at `transmit_time`.
    #[must_use]
    pub fn should_transmit(&self) -> bool {
        self.counter() < self.params.k
    }

    /// Resets to `i_min`, zeroes `c`, and re-samples `transmit_time` in `[I/2, I]`.
    pub fn reset_interval(&self, rng: &mut impl Rng) {
        let i = self.params.i_min;
        *self.interval_length.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = i;
        *self.counter_c.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = 0;
        *self.transmit_time.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            sample_transmit_time(i, rng);
    }

    /// Doubles the interval toward `i_max`, re-samples `transmit_time`, and zeroes `c`.
    pub fn on_interval_end(&self, rng: &mut impl Rng) {
        let mut interval = self.interval_length.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *interval = (*interval * 2).min(self.params.i_max);
        let i = *interval;
        drop(interval);
        *self.transmit_time.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            sample_transmit_time(i, rng);
        *self.counter_c.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = 0;
    }

    /// Records a receive that matched local state: `c += 1`.
    pub fn on_consistent_receive(&self) {
        *self.counter_c.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
    }

    /// Records a receive that disagreed with local state.
    ///
    /// Adopts `new_version`/`new_data` and resets the interval whenever
    /// versioning is disabled, or the incoming version is strictly newer;
    /// returns whether an update was applied.
    pub fn on_inconsistent_receive(
        &self,
        new_version: u32,
        new_data: Vec<u8>,
        rng: &mut impl Rng,
    ) -> bool {
        let should_update = !self.params.versioning || new_version > self.version_id();
        if should_update {
            *self.version_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = new_version;
            *self.default_data.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = new_data;
            self.reset_interval(rng);
        }
        should_update
    }

    /// Appends the base overlay's layers, then `version_id` when enabled.
    ///
    /// # Errors
    ///
    /// See [`Network::process_send`].
    pub fn process_send(&self, frame: &mut PreEncodeFrame, meta: &mut Meta) -> Result<(), NetError> {
        let opts = SendOptions {
            dest_address: Some(self.base.broadcast_address()),
            ..SendOptions::default()
        };
        self.base.process_send(frame, meta, &opts)?;
        if let Some(layer) = self.version_layer {
            frame.push(layer, AttrValue::Int(u64::from(self.version_id())));
        }
        Ok(())
    }

    /// Classifies an inbound frame as consistent or inconsistent against
    /// local state and updates the Trickle counters accordingly.
    ///
    /// With versioning enabled, consistency is a bare `version_id` match.
    /// With versioning disabled there is no version to compare, so
    /// consistency falls back to comparing `new_data` against the current
    /// `default_data` directly — an identical payload must still suppress
    /// retransmission and must not force an interval reset.
    pub fn process_recv(
        &self,
        frame: &Frame,
        meta: &mut Meta,
        new_data: Vec<u8>,
        rng: &mut impl Rng,
    ) -> bool {
        self.base.process_recv(frame, meta);

        let incoming_version = frame
            .get("version_id")
            .and_then(AttrValue::as_int)
            .map_or(0, |v| v as u32);

        let is_consistent = if self.params.versioning {
            incoming_version == self.version_id()
        } else {
            new_data == self.default_data()
        };

        if is_consistent {
            self.on_consistent_receive();
            false
        } else {
            self.on_inconsistent_receive(incoming_version, new_data, rng)
        }
    }
}

fn sample_transmit_time(interval: Duration, rng: &mut impl Rng) -> Duration {
    let half = interval / 2;
    let span = interval - half;
    if span.is_zero() {
        half
    } else {
        half + rng.gen_range(Duration::ZERO..=span)
    }
}
