//! See [`Scheme`].

use std::collections::{BTreeMap, HashSet};

use crate::{attr::AttrDescriptor, error::SchemeError, layer::Layer};

/// For one variable-size attribute, the set of other attributes its length
/// depends on, keyed by the absolute (scheme-order) index of the layer each
/// dependency lives in.
///
/// A dependency entry referencing the attribute's own layer index addresses
/// attributes decoded earlier within that same layer; an entry referencing a
/// smaller index addresses an already fully-decoded, more-outer layer (since
/// decoding proceeds outer-to-inner). An entry can never reference a larger
/// index: that layer would not have been decoded yet.
pub type DependencyEntry = BTreeMap<usize, Vec<String>>;

/// The ordered sequence of layers plus the dependency table that describes a
/// packet shape.
///
/// Overlays grow a scheme monotonically over its lifetime by calling
/// [`Scheme::add_layer`] and [`Scheme::add_attr`] during `init_connection`;
/// all attribute names across every layer must stay globally distinct so the
/// dependency table can address them by bare name.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    layers: Vec<Layer>,
    dependencies: std::collections::HashMap<String, DependencyEntry>,
    names: HashSet<String>,
}

impl Scheme {
    /// Creates an empty scheme.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheme from an initial set of layers and dependency table.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::DuplicateAttrName`] if any two attributes
    /// across `layers` share a name.
    pub fn with_layers(
        layers: Vec<Layer>,
        dependencies: std::collections::HashMap<String, DependencyEntry>,
    ) -> Result<Self, SchemeError> {
        let mut scheme = Self::new();
        for layer in layers {
            scheme.push_layer(layer)?;
        }
        scheme.dependencies = dependencies;
        Ok(scheme)
    }

    /// All layers, in scheme (registration) order: index `0` is the
    /// innermost/first-registered layer, the last index is the
    /// outermost/most-recently-appended layer.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of layers currently in the scheme.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the scheme has no layers yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The dependency table.
    #[must_use]
    pub fn dependencies(&self) -> &std::collections::HashMap<String, DependencyEntry> {
        &self.dependencies
    }

    fn push_layer(&mut self, layer: Layer) -> Result<(), SchemeError> {
        for attr in layer.attrs() {
            if !self.names.insert(attr.name().to_string()) {
                return Err(SchemeError::DuplicateAttrName {
                    name: attr.name().to_string(),
                });
            }
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Appends a new layer built from `headers` and `trailers` to the tail of
    /// the scheme (the new outermost layer).
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::EmptyLayer`] if both lists are empty, or
    /// [`SchemeError::DuplicateAttrName`] if an attribute name collides with
    /// one already registered.
    /// Returns the index of the newly appended layer.
    pub fn add_layer(
        &mut self,
        headers: Vec<AttrDescriptor>,
        trailers: Vec<AttrDescriptor>,
    ) -> Result<usize, SchemeError> {
        let layer = Layer::new(headers, trailers)?;
        self.push_layer(layer)?;
        Ok(self.layers.len() - 1)
    }

    /// Inserts a single attribute into an existing layer's header list at
    /// `index` (appending if `index` is `None`).
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::LayerOutOfBounds`] if `layer_index` does not
    /// name an existing layer, or [`SchemeError::DuplicateAttrName`] if the
    /// name collides.
    pub fn add_attr(
        &mut self,
        attr: AttrDescriptor,
        layer_index: usize,
        index: Option<usize>,
    ) -> Result<(), SchemeError> {
        if layer_index >= self.layers.len() {
            return Err(SchemeError::LayerOutOfBounds {
                index: layer_index,
                len: self.layers.len(),
            });
        }
        if !self.names.insert(attr.name().to_string()) {
            return Err(SchemeError::DuplicateAttrName {
                name: attr.name().to_string(),
            });
        }
        let layer = &mut self.layers[layer_index];
        let headers = layer.headers_mut();
        let at = index.unwrap_or(headers.len());
        headers.insert(at, attr);
        Ok(())
    }

    /// Registers (or extends) the dependency entry for `attr_name`.
    pub fn add_dependency(
        &mut self,
        attr_name: impl Into<String>,
        layer_index: usize,
        referenced: Vec<String>,
    ) {
        self.dependencies
            .entry(attr_name.into())
            .or_default()
            .insert(layer_index, referenced);
    }
}
