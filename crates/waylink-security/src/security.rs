//! See [`Security`].

use std::sync::Arc;

use waylink_core::{Frame, Meta, PreEncodeFrame, Serializer};

use crate::measure::Measure;
use crate::SecurityError;

/// Composes a list of [`Measure`]s into a channel's security pipeline.
///
/// `process_send` runs measures in registration order, each appending its own
/// placeholder values to the frame being built; `process_recv` runs them in
/// the reverse order, mirroring how `encode`/`decode` byte transforms are
/// unwound in reverse by the serializer's own callback chain (registered
/// during [`Security::apply`]).
pub struct Security {
    measures: Vec<Arc<dyn Measure>>,
}

impl Security {
    /// Builds a security pipeline from an ordered list of measures.
    #[must_use]
    pub fn new(measures: Vec<Arc<dyn Measure>>) -> Self {
        Self { measures }
    }

    /// Registers every measure's layer/attribute and encode/decode callbacks
    /// on `serializer`, in pipeline order.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError`] if any measure's scheme registration fails.
    pub fn apply(&self, serializer: &mut Serializer) -> Result<(), SecurityError> {
        for measure in &self.measures {
            Arc::clone(measure).apply(serializer)?;
        }
        for measure in &self.measures {
            serializer.push_encode_callback(Arc::clone(measure).encode_callback());
        }
        for measure in self.measures.iter().rev() {
            serializer.push_decode_callback(Arc::clone(measure).decode_callback());
        }
        Ok(())
    }

    /// Runs every measure's `process_send` in registration order.
    pub fn process_send(&self, frame: &mut PreEncodeFrame, meta: &Meta) {
        for measure in &self.measures {
            measure.process_send(frame, meta);
        }
    }

    /// Runs every measure's `process_recv` in reverse registration order.
    pub fn process_recv(&self, frame: &Frame, meta: &mut Meta) {
        for measure in self.measures.iter().rev() {
            measure.process_recv(frame, meta);
        }
    }
}
