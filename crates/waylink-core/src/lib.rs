#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod attr;
pub mod error;
pub mod frame;
pub mod layer;
pub mod meta;
pub mod ring_buffer;
pub mod scheme;
pub mod serializer;
pub mod value;

pub use attr::{attr, bytes_attr, int_attr, variable_bytes_attr, AttrDescriptor, AttrKind, Endianness};
pub use error::{CodecError, RingBufferError, SchemeError};
pub use frame::{Frame, FrameLayer, PreEncodeFrame};
pub use layer::Layer;
pub use meta::Meta;
pub use ring_buffer::RingBuffer;
pub use scheme::Scheme;
pub use serializer::{DecodeMeta, Serializer};
pub use value::AttrValue;
