//! Error taxonomy for scheme definition, the codec, and the ring buffer.

use thiserror::Error;

/// Errors raised while building a [`crate::scheme::Scheme`] or while registering
/// attributes and layers on one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemeError {
    /// An attribute was declared with a negative size.
    #[error("attribute `{name}` declared with a negative size")]
    NegativeSize {
        /// Name of the offending attribute.
        name: String,
    },

    /// A variable-size (`size == 0`) attribute did not carry a `parsing_callback`.
    #[error("variable-size attribute `{name}` has no parsing callback")]
    MissingParsingCallback {
        /// Name of the offending attribute.
        name: String,
    },

    /// A [`crate::attr::AttrKind::Custom`] attribute is missing its encode or decode callback.
    #[error("custom attribute `{name}` is missing its encode or decode callback")]
    MissingCustomCallback {
        /// Name of the offending attribute.
        name: String,
    },

    /// An attribute name was registered twice; all attribute names in a scheme
    /// must be globally distinct so the dependency table can address them by
    /// bare name.
    #[error("attribute name `{name}` is already registered in this scheme")]
    DuplicateAttrName {
        /// The name that collided.
        name: String,
    },

    /// [`crate::scheme::Scheme::add_layer`] was called with neither headers nor
    /// trailers.
    #[error("a layer must have at least one header or trailer attribute")]
    EmptyLayer,

    /// A layer index referenced by `add_attr` does not exist.
    #[error("layer index {index} is out of bounds (scheme has {len} layers)")]
    LayerOutOfBounds {
        /// The index that was requested.
        index: usize,
        /// The number of layers actually present.
        len: usize,
    },
}

/// Errors raised while encoding or decoding a frame against a [`crate::scheme::Scheme`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// An attribute's encoded or decoded size did not match its declared size.
    #[error("attribute `{name}` expected {expected} bytes but got {actual}")]
    UnexpectedInputSize {
        /// Name of the offending attribute.
        name: String,
        /// Size declared by the scheme.
        expected: usize,
        /// Size actually available.
        actual: usize,
    },

    /// Input bytes ran out while decoding an attribute.
    #[error("ran out of input while decoding attribute `{name}` (needed {needed} more bytes)")]
    InputExhausted {
        /// Name of the offending attribute.
        name: String,
        /// Number of bytes still required.
        needed: usize,
    },

    /// A dependency referenced an attribute name that has not been decoded yet.
    #[error("dependency resolution for `{attr}` could not find attribute `{missing}`")]
    MissingDependency {
        /// The variable-size attribute being resolved.
        attr: String,
        /// The dependency that could not be found.
        missing: String,
    },

    /// A `CUSTOM` or built-in type callback rejected the value it was given.
    #[error("type codec failed for attribute `{name}`: {reason}")]
    TypeCodec {
        /// Name of the offending attribute.
        name: String,
        /// Human-readable reason supplied by the callback.
        reason: String,
    },

    /// A decode callback (e.g. a security measure) rejected the packet.
    #[error("packet rejected by `{measure}`")]
    MeasureRejected {
        /// Name of the measure that rejected the packet.
        measure: String,
    },
}

/// Errors raised by [`crate::ring_buffer::RingBuffer`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RingBufferError {
    /// The buffer is at capacity; the caller should drop the value being pushed.
    #[error("ring buffer overflow")]
    Overflow,

    /// The buffer is empty.
    #[error("ring buffer underflow")]
    Underflow,
}
