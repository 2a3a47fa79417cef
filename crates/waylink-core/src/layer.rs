//! See [`Layer`].

use crate::{attr::AttrDescriptor, error::SchemeError};

/// An ordered group of attributes within a [`crate::scheme::Scheme`], split
/// into a header half (emitted before inner layers on the wire) and a
/// trailer half (emitted after inner layers).
///
/// A layer with no trailers is all-headers; one with no headers is all
/// trailers. At least one of the two must be non-empty.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    headers: Vec<AttrDescriptor>,
    trailers: Vec<AttrDescriptor>,
}

impl Layer {
    /// Builds a layer from its header and trailer attribute lists.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::EmptyLayer`] if both `headers` and `trailers`
    /// are empty.
    pub fn new(
        headers: Vec<AttrDescriptor>,
        trailers: Vec<AttrDescriptor>,
    ) -> Result<Self, SchemeError> {
        if headers.is_empty() && trailers.is_empty() {
            return Err(SchemeError::EmptyLayer);
        }
        Ok(Self { headers, trailers })
    }

    /// Header attributes, in declaration order.
    #[must_use]
    pub fn headers(&self) -> &[AttrDescriptor] {
        &self.headers
    }

    /// Trailer attributes, in declaration order.
    #[must_use]
    pub fn trailers(&self) -> &[AttrDescriptor] {
        &self.trailers
    }

    /// Mutable access to the header list, used by `Scheme::add_attr`.
    pub(crate) fn headers_mut(&mut self) -> &mut Vec<AttrDescriptor> {
        &mut self.headers
    }

    /// Mutable access to the trailer list, used by `Scheme::add_attr`.
    pub(crate) fn trailers_mut(&mut self) -> &mut Vec<AttrDescriptor> {
        &mut self.trailers
    }

    /// Iterates headers then trailers, in the order attribute values appear
    /// in a pre-encode frame layer.
    pub fn attrs(&self) -> impl Iterator<Item = &AttrDescriptor> {
        self.headers.iter().chain(self.trailers.iter())
    }

    /// Total attribute count (headers + trailers).
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len() + self.trailers.len()
    }

    /// Whether this layer declares no attributes at all (never true for a
    /// layer constructed through [`Layer::new`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
