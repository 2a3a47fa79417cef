//! Decoded and pre-encode frame representations.

use indexmap::IndexMap;

use crate::value::AttrValue;

/// One layer's worth of decoded attribute values, in the order they were
/// read off the wire (headers first, then trailers).
pub type FrameLayer = IndexMap<String, AttrValue>;

/// The fully decoded form of a packet: one [`FrameLayer`] per scheme layer,
/// in scheme (innermost-first) order.
///
/// This is what [`crate::serializer::Serializer::decode`] returns and what
/// application code reads attribute values out of; it is never re-encoded
/// directly; use [`PreEncodeFrame`] to build a packet to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    layers: Vec<FrameLayer>,
}

impl Frame {
    /// Wraps an already-decoded, per-layer attribute map sequence.
    #[must_use]
    pub fn new(layers: Vec<FrameLayer>) -> Self {
        Self { layers }
    }

    /// Decoded layers, in scheme (innermost-first) order.
    #[must_use]
    pub fn layers(&self) -> &[FrameLayer] {
        &self.layers
    }

    /// Looks up an attribute by name across every layer.
    ///
    /// Attribute names are unique across a whole scheme, so at most one
    /// layer can hold a match.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }
}

/// The positional, not-yet-encoded form of a packet being built for send.
///
/// One entry per scheme layer, each holding the values to fill that layer's
/// attributes in declared order (headers, then trailers); this is the shape
/// application code and overlays build up before handing a packet to
/// [`crate::serializer::Serializer::encode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreEncodeFrame {
    layers: Vec<Vec<AttrValue>>,
}

impl PreEncodeFrame {
    /// Creates an empty pre-encode frame with `layer_count` empty layers.
    #[must_use]
    pub fn new(layer_count: usize) -> Self {
        Self {
            layers: vec![Vec::new(); layer_count],
        }
    }

    /// Appends `value` to the given layer's positional value list.
    pub fn push(&mut self, layer_index: usize, value: AttrValue) {
        self.layers[layer_index].push(value);
    }

    /// Positional values, in scheme (innermost-first) order.
    #[must_use]
    pub fn layers(&self) -> &[Vec<AttrValue>] {
        &self.layers
    }
}
