//! See [`Measure`].

use std::sync::Arc;

use waylink_core::serializer::{DecodeCallback, EncodeCallback, RawLayer};
use waylink_core::{CodecError, Frame, Meta, PreEncodeFrame, Serializer};

/// One pluggable transform in a [`crate::Security`] pipeline.
///
/// A measure registers whatever layer or attribute it needs during `apply`,
/// shapes the frame being built in `process_send`, and rewrites the packet's
/// on-wire bytes via the closures returned from `encode_callback`/
/// `decode_callback` (run by the serializer itself, before and after
/// framing). [`crate::Security`] registers `apply` for every measure first
/// (forward order, since a later measure's target may reference an earlier
/// one's attribute), then wires `encode_callback`s forward and
/// `decode_callback`s in reverse — the byte transforms must unwind in the
/// opposite order they were applied.
pub trait Measure: Send + Sync {
    /// Short identifier used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Registers this measure's layer/attribute on `serializer`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecurityError`] if the scheme rejects the registration.
    fn apply(self: Arc<Self>, serializer: &mut Serializer) -> Result<(), crate::SecurityError>;

    /// Builds the closure [`crate::Security`] registers as an encode callback.
    fn encode_callback(self: Arc<Self>) -> EncodeCallback;

    /// Builds the closure [`crate::Security`] registers as a decode callback.
    fn decode_callback(self: Arc<Self>) -> DecodeCallback;

    /// Appends placeholder values for this measure's own attributes to an
    /// outbound frame, before `encode` fills them in.
    fn process_send(&self, frame: &mut PreEncodeFrame, meta: &Meta);

    /// Gives the measure a chance to act on a freshly decoded inbound frame.
    fn process_recv(&self, frame: &Frame, meta: &mut Meta);
}

pub(crate) fn reject(measure: &'static str) -> CodecError {
    CodecError::MeasureRejected { measure: measure.to_string() }
}

pub(crate) type EncodedLayers = Vec<Vec<Vec<u8>>>;
pub(crate) type DecodedLayers = Vec<RawLayer>;
