//! Attribute descriptors: the declarative unit a [`crate::layer::Layer`] is built from.

use std::sync::Arc;

use crate::{error::SchemeError, value::AttrValue};

/// Byte order used when encoding/decoding an [`AttrKind::Int`] attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Most significant byte first. The default for every `INT` attribute.
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Resolves the byte length of a variable-size attribute from its dependencies.
///
/// Receives the raw, not-yet-type-decoded bytes of each attribute named in
/// the dependency entry, in the order they were listed, and returns the
/// number of bytes the attribute occupies on the wire. Dependencies are
/// always resolved from raw bytes rather than a typed value, since a
/// variable-size attribute's length must be known before type decoding of
/// anything in its layer can happen.
pub type ParsingCallback = Arc<dyn Fn(&[&[u8]]) -> usize + Send + Sync>;

/// Encodes a decoded [`AttrValue`] into its on-wire byte representation.
pub type EncodeTypeCallback =
    Arc<dyn Fn(&AttrValue) -> Result<Vec<u8>, String> + Send + Sync>;

/// Decodes an on-wire byte slice into an [`AttrValue`].
pub type DecodeTypeCallback =
    Arc<dyn Fn(&[u8]) -> Result<AttrValue, String> + Send + Sync>;

/// The built-in type dispatch for an attribute, or an escape hatch to caller
/// supplied callbacks.
#[derive(Clone)]
pub enum AttrKind {
    /// Opaque bytes, encoded/decoded as-is.
    Bytes,
    /// A big- or little-endian unsigned integer, width `size` bytes.
    Int(Endianness),
    /// A UTF-8 string.
    Str,
    /// Fully caller-defined encoding; requires both type callbacks.
    Custom,
}

impl std::fmt::Debug for AttrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes => write!(f, "Bytes"),
            Self::Int(e) => write!(f, "Int({e:?})"),
            Self::Str => write!(f, "Str"),
            Self::Custom => write!(f, "Custom"),
        }
    }
}

/// A single named, typed field within a [`crate::layer::Layer`].
///
/// `size == 0` marks a variable-length attribute whose byte length is
/// resolved at decode time via the scheme's dependency table (see
/// [`crate::scheme::Scheme`]); such an attribute requires a
/// [`ParsingCallback`] to be supplied on encode, used as the default decode
/// resolver when the scheme defines no dependency-driven override.
#[derive(Clone)]
pub struct AttrDescriptor {
    pub(crate) name: Arc<str>,
    pub(crate) size: usize,
    pub(crate) kind: AttrKind,
    pub(crate) parsing_callback: Option<ParsingCallback>,
    pub(crate) encode_type_callback: Option<EncodeTypeCallback>,
    pub(crate) decode_type_callback: Option<DecodeTypeCallback>,
}

impl std::fmt::Debug for AttrDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttrDescriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl AttrDescriptor {
    /// Attribute name. Must be unique across the whole scheme.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared size in bytes; `0` means variable-length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this attribute's length is resolved at decode time rather
    /// than fixed by the scheme.
    #[must_use]
    pub fn is_variable_size(&self) -> bool {
        self.size == 0
    }
}

/// Builder options for [`attr`], kept out of the main signature since most
/// attributes only need a name, size and kind.
#[derive(Default)]
pub struct AttrOptions {
    /// Resolver for a variable-size attribute's byte length.
    pub parsing_callback: Option<ParsingCallback>,
    /// Caller-supplied type encoder; overrides the built-in for `kind`.
    pub encode_type_callback: Option<EncodeTypeCallback>,
    /// Caller-supplied type decoder; overrides the built-in for `kind`.
    pub decode_type_callback: Option<DecodeTypeCallback>,
}

/// Constructs an [`AttrDescriptor`], validating the invariants from the data
/// model: a negative size is never allowed, a variable-size attribute must
/// carry a `parsing_callback`, and a `CUSTOM` attribute must carry both type
/// callbacks.
///
/// # Errors
///
/// See [`SchemeError::NegativeSize`], [`SchemeError::MissingParsingCallback`],
/// and [`SchemeError::MissingCustomCallback`].
pub fn attr(
    name: impl Into<Arc<str>>,
    size: i64,
    kind: AttrKind,
    options: AttrOptions,
) -> Result<AttrDescriptor, SchemeError> {
    let name = name.into();
    if size < 0 {
        return Err(SchemeError::NegativeSize {
            name: name.to_string(),
        });
    }
    if size == 0 && options.parsing_callback.is_none() {
        return Err(SchemeError::MissingParsingCallback {
            name: name.to_string(),
        });
    }
    if matches!(kind, AttrKind::Custom)
        && (options.encode_type_callback.is_none() || options.decode_type_callback.is_none())
    {
        return Err(SchemeError::MissingCustomCallback {
            name: name.to_string(),
        });
    }

    Ok(AttrDescriptor {
        name,
        // size is non-negative here, checked above.
        #[allow(clippy::cast_sign_loss)]
        size: size as usize,
        kind,
        parsing_callback: options.parsing_callback,
        encode_type_callback: options.encode_type_callback,
        decode_type_callback: options.decode_type_callback,
    })
}

/// Shorthand for a fixed-size [`AttrKind::Bytes`] attribute.
///
/// # Errors
///
/// Returns [`SchemeError::NegativeSize`] if `size < 0`.
pub fn bytes_attr(name: impl Into<Arc<str>>, size: i64) -> Result<AttrDescriptor, SchemeError> {
    attr(name, size, AttrKind::Bytes, AttrOptions::default())
}

/// Shorthand for a fixed-size big-endian [`AttrKind::Int`] attribute.
///
/// # Errors
///
/// Returns [`SchemeError::NegativeSize`] if `size < 0`.
pub fn int_attr(name: impl Into<Arc<str>>, size: i64) -> Result<AttrDescriptor, SchemeError> {
    attr(
        name,
        size,
        AttrKind::Int(Endianness::Big),
        AttrOptions::default(),
    )
}

/// Shorthand for a variable-size [`AttrKind::Bytes`] attribute resolved via
/// `parsing_callback`, defaulting to the big-endian-integer interpretation of
/// its first dependency if none is given explicitly at the call site.
///
/// # Errors
///
/// Returns [`SchemeError::MissingParsingCallback`] if `parsing_callback` is `None`.
pub fn variable_bytes_attr(
    name: impl Into<Arc<str>>,
    parsing_callback: ParsingCallback,
) -> Result<AttrDescriptor, SchemeError> {
    attr(
        name,
        0,
        AttrKind::Bytes,
        AttrOptions {
            parsing_callback: Some(parsing_callback),
            ..AttrOptions::default()
        },
    )
}

/// The default `parsing_callback`: interprets the first referenced
/// dependency's raw bytes as a big-endian integer byte-count.
#[must_use]
pub fn default_parsing_callback() -> ParsingCallback {
    Arc::new(|deps: &[&[u8]]| deps.first().map_or(0, |b| big_endian_to_usize(b)))
}

/// Interprets up to 8 bytes as a big-endian unsigned integer; longer slices
/// are truncated to their trailing 8 bytes.
#[must_use]
pub fn big_endian_to_usize(bytes: &[u8]) -> usize {
    let mut buf = [0u8; 8];
    let take = bytes.len().min(8);
    let start = bytes.len() - take;
    buf[8 - take..].copy_from_slice(&bytes[start..]);
    u64::from_be_bytes(buf) as usize
}
