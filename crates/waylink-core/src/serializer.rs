//! See [`Serializer`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    attr::{AttrDescriptor, AttrKind, Endianness},
    error::CodecError,
    frame::{Frame, FrameLayer, PreEncodeFrame},
    scheme::Scheme,
    value::AttrValue,
};

/// One layer's attributes, decoded off the wire but not yet type-decoded:
/// every value is still the raw bytes it occupied on the wire.
///
/// Dependency resolution for variable-size attributes always works from this
/// representation, never from a [`FrameLayer`]'s typed values, since a
/// variable-size attribute's length must be known before anything in its
/// layer can be type-decoded.
pub type RawLayer = IndexMap<String, Vec<u8>>;

/// Runs after [`Serializer::encode_type`], given the chance to transform the
/// per-layer, per-attribute encoded byte buffers before they are framed onto
/// the wire.
pub type EncodeCallback = Arc<dyn Fn(&mut Vec<Vec<Vec<u8>>>) + Send + Sync>;

/// Runs after [`Serializer::decode_layers`], given the chance to inspect or
/// rewrite raw decoded attribute bytes before type decoding, or reject the
/// packet outright (e.g. an authentication tag mismatch).
pub type DecodeCallback = Arc<dyn Fn(&mut Vec<RawLayer>) -> Result<(), CodecError> + Send + Sync>;

/// Bytes left over after a [`Serializer::decode`] call consumed everything
/// its scheme accounted for; a non-empty value usually means the scheme
/// under-describes what's actually on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeMeta {
    /// Bytes that remained in the input after every layer was decoded.
    pub redundant_bytes: Vec<u8>,
}

/// Encodes [`PreEncodeFrame`]s into wire bytes and decodes wire bytes back
/// into [`Frame`]s, against one or two [`Scheme`]s.
///
/// Encoding writes headers outer-layer-first, then trailers
/// innermost-layer-first, so that on the wire the outermost layer's header
/// comes first and its trailer comes last. Decoding mirrors this exactly:
/// headers are read outer-to-inner from the front of the buffer, and
/// trailers are read outer-to-inner from the back.
pub struct Serializer {
    encoding_scheme: Scheme,
    decoding_scheme: Scheme,
    symmetric: bool,
    encode_callbacks: Vec<EncodeCallback>,
    decode_callbacks: Vec<DecodeCallback>,
}

impl Serializer {
    /// Builds a serializer that uses the same scheme for both directions.
    #[must_use]
    pub fn new(scheme: Scheme) -> Self {
        Self {
            decoding_scheme: scheme.clone(),
            encoding_scheme: scheme,
            symmetric: true,
            encode_callbacks: Vec::new(),
            decode_callbacks: Vec::new(),
        }
    }

    /// Builds a serializer with independent encoding and decoding schemes.
    #[must_use]
    pub fn with_decoding_scheme(encoding_scheme: Scheme, decoding_scheme: Scheme) -> Self {
        Self {
            encoding_scheme,
            decoding_scheme,
            symmetric: false,
            encode_callbacks: Vec::new(),
            decode_callbacks: Vec::new(),
        }
    }

    /// The scheme driving [`Serializer::encode`].
    #[must_use]
    pub fn encoding_scheme(&self) -> &Scheme {
        &self.encoding_scheme
    }

    /// The scheme driving [`Serializer::decode`].
    #[must_use]
    pub fn decoding_scheme(&self) -> &Scheme {
        &self.decoding_scheme
    }

    /// Appends a callback to run on every future [`Serializer::encode`] call.
    pub fn push_encode_callback(&mut self, callback: EncodeCallback) {
        self.encode_callbacks.push(callback);
    }

    /// Appends a callback to run on every future [`Serializer::decode`] call.
    pub fn push_decode_callback(&mut self, callback: DecodeCallback) {
        self.decode_callbacks.push(callback);
    }

    /// Appends a new outermost layer to the encoding scheme, and to the
    /// decoding scheme too when the two are not shared.
    ///
    /// # Errors
    ///
    /// See [`Scheme::add_layer`].
    pub fn add_layer(
        &mut self,
        headers: Vec<AttrDescriptor>,
        trailers: Vec<AttrDescriptor>,
    ) -> Result<usize, crate::error::SchemeError> {
        if self.symmetric {
            let idx = self.encoding_scheme.add_layer(headers, trailers)?;
            self.decoding_scheme = self.encoding_scheme.clone();
            Ok(idx)
        } else {
            let idx = self
                .encoding_scheme
                .add_layer(headers.clone(), trailers.clone())?;
            self.decoding_scheme.add_layer(headers, trailers)?;
            Ok(idx)
        }
    }

    /// Inserts an attribute into an existing layer of both schemes (unless
    /// they were built independently).
    ///
    /// # Errors
    ///
    /// See [`Scheme::add_attr`].
    pub fn add_attr(
        &mut self,
        attr: AttrDescriptor,
        layer_index: usize,
        index: Option<usize>,
    ) -> Result<(), crate::error::SchemeError> {
        if self.symmetric {
            self.encoding_scheme.add_attr(attr, layer_index, index)?;
            self.decoding_scheme = self.encoding_scheme.clone();
        } else {
            self.encoding_scheme
                .add_attr(attr.clone(), layer_index, index)?;
            self.decoding_scheme.add_attr(attr, layer_index, index)?;
        }
        Ok(())
    }

    /// Encodes a frame of attribute values into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a value's type cannot be encoded, or if
    /// its encoded length does not match its declared fixed size.
    pub fn encode(&self, input: &PreEncodeFrame) -> Result<Vec<u8>, CodecError> {
        let mut encoded = self.encode_type(input)?;
        for callback in &self.encode_callbacks {
            callback(&mut encoded);
        }
        self.encode_layers(&encoded)
    }

    fn encode_type(&self, input: &PreEncodeFrame) -> Result<Vec<Vec<Vec<u8>>>, CodecError> {
        let scheme = self.encoding_scheme.layers();
        let mut out = Vec::with_capacity(scheme.len());
        for (layer, values) in scheme.iter().zip(input.layers()) {
            let mut encoded_layer = Vec::with_capacity(values.len());
            for (attr, value) in layer.attrs().zip(values) {
                encoded_layer.push(encode_attr_type(attr, value)?);
            }
            out.push(encoded_layer);
        }
        Ok(out)
    }

    fn encode_layers(&self, encoded: &[Vec<Vec<u8>>]) -> Result<Vec<u8>, CodecError> {
        let scheme = self.encoding_scheme.layers();
        let mut out = Vec::new();

        // Headers: outermost layer first, down to the innermost.
        for (layer, encoded_layer) in scheme.iter().zip(encoded.iter()).rev() {
            for (attr, bytes) in layer.headers().iter().zip(encoded_layer.iter()) {
                validate_encoded_size(attr, bytes)?;
                out.extend_from_slice(bytes);
            }
        }

        // Trailers: innermost layer first, out to the outermost.
        for (layer, encoded_layer) in scheme.iter().zip(encoded.iter()) {
            let trailer_values = &encoded_layer[layer.headers().len()..];
            for (attr, bytes) in layer.trailers().iter().zip(trailer_values) {
                validate_encoded_size(attr, bytes)?;
                out.extend_from_slice(bytes);
            }
        }

        Ok(out)
    }

    /// Decodes wire bytes into a frame, against the decoding scheme.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the input runs out mid-attribute, a
    /// dependency cannot be resolved, or a value's bytes cannot be
    /// type-decoded.
    pub fn decode(&self, input: &[u8]) -> Result<(Frame, DecodeMeta), CodecError> {
        let (mut raw_layers, redundant_bytes) = self.decode_layers(input)?;
        for callback in &self.decode_callbacks {
            callback(&mut raw_layers)?;
        }
        let frame = self.decode_type(raw_layers)?;
        Ok((frame, DecodeMeta { redundant_bytes }))
    }

    fn decode_layers(&self, input: &[u8]) -> Result<(Vec<RawLayer>, Vec<u8>), CodecError> {
        let scheme = self.decoding_scheme.layers();
        let dependencies = self.decoding_scheme.dependencies();
        let mut buf: VecDeque<u8> = input.iter().copied().collect();

        let mut decoded: HashMap<usize, RawLayer> = HashMap::with_capacity(scheme.len());
        let mut ordered = Vec::with_capacity(scheme.len());

        for abs_idx in (0..scheme.len()).rev() {
            let layer = &scheme[abs_idx];
            let mut headers_done = IndexMap::new();

            for attr in layer.headers() {
                let size = resolve_size(attr, abs_idx, &headers_done, &decoded, dependencies)?;
                let bytes = pop_front_n(&mut buf, size, attr.name())?;
                headers_done.insert(attr.name().to_string(), bytes);
            }

            // Trailers were written to the wire in forward declaration order
            // (see `encode_layers`), so the last-declared trailer's bytes sit
            // at the very end of the buffer. Popping from the back must walk
            // declaration order in reverse to line bytes back up with their
            // attribute, then the results are re-ordered into `trailers_done`
            // so the output map still reflects declaration order.
            let trailers = layer.trailers();
            let mut trailer_bytes: Vec<Option<(String, Vec<u8>)>> = vec![None; trailers.len()];
            for (rev_pos, attr) in trailers.iter().enumerate().rev() {
                let size = resolve_size(attr, abs_idx, &headers_done, &decoded, dependencies)?;
                let bytes = pop_back_n(&mut buf, size, attr.name())?;
                trailer_bytes[rev_pos] = Some((attr.name().to_string(), bytes));
            }
            let mut trailers_done = IndexMap::new();
            for entry in trailer_bytes {
                let (name, bytes) = entry.expect("every trailer attribute was just filled");
                trailers_done.insert(name, bytes);
            }

            let mut raw_layer = headers_done;
            raw_layer.extend(trailers_done);
            decoded.insert(abs_idx, raw_layer.clone());
            ordered.push((abs_idx, raw_layer));
        }

        ordered.sort_by_key(|(idx, _)| *idx);
        let layers = ordered.into_iter().map(|(_, layer)| layer).collect();
        Ok((layers, buf.into_iter().collect()))
    }

    fn decode_type(&self, raw: Vec<RawLayer>) -> Result<Frame, CodecError> {
        let scheme = self.decoding_scheme.layers();
        let mut layers = Vec::with_capacity(raw.len());
        for (layer, raw_layer) in scheme.iter().zip(raw.into_iter()) {
            let mut frame_layer = FrameLayer::new();
            for (attr, (name, bytes)) in layer.attrs().zip(raw_layer.into_iter()) {
                frame_layer.insert(name, decode_attr_type(attr, &bytes)?);
            }
            layers.push(frame_layer);
        }
        Ok(Frame::new(layers))
    }
}

fn resolve_size(
    attr: &AttrDescriptor,
    abs_idx: usize,
    headers_so_far: &RawLayer,
    decoded_outer: &HashMap<usize, RawLayer>,
    dependencies: &std::collections::HashMap<String, crate::scheme::DependencyEntry>,
) -> Result<usize, CodecError> {
    if !attr.is_variable_size() {
        return Ok(attr.size());
    }

    let mut requisite: Vec<Vec<u8>> = Vec::new();
    if let Some(entry) = dependencies.get(attr.name()) {
        for (&layer_idx, names) in entry {
            let source: &RawLayer = if layer_idx == abs_idx {
                headers_so_far
            } else {
                decoded_outer
                    .get(&layer_idx)
                    .ok_or_else(|| CodecError::MissingDependency {
                        attr: attr.name().to_string(),
                        missing: names.first().cloned().unwrap_or_default(),
                    })?
            };
            for name in names {
                let bytes = source
                    .get(name)
                    .ok_or_else(|| CodecError::MissingDependency {
                        attr: attr.name().to_string(),
                        missing: name.clone(),
                    })?;
                requisite.push(bytes.clone());
            }
        }
    }

    let refs: Vec<&[u8]> = requisite.iter().map(Vec::as_slice).collect();
    // Validated at construction: a variable-size attribute always carries a
    // parsing_callback.
    let callback = attr
        .parsing_callback
        .as_ref()
        .expect("variable-size attribute missing its parsing callback");
    Ok(callback(&refs))
}

fn pop_front_n(buf: &mut VecDeque<u8>, n: usize, name: &str) -> Result<Vec<u8>, CodecError> {
    if buf.len() < n {
        return Err(CodecError::InputExhausted {
            name: name.to_string(),
            needed: n - buf.len(),
        });
    }
    Ok(buf.drain(..n).collect())
}

fn pop_back_n(buf: &mut VecDeque<u8>, n: usize, name: &str) -> Result<Vec<u8>, CodecError> {
    if buf.len() < n {
        return Err(CodecError::InputExhausted {
            name: name.to_string(),
            needed: n - buf.len(),
        });
    }
    let split_at = buf.len() - n;
    Ok(buf.split_off(split_at).into_iter().collect())
}

fn validate_encoded_size(attr: &AttrDescriptor, bytes: &[u8]) -> Result<(), CodecError> {
    if attr.is_variable_size() {
        return Ok(());
    }
    if bytes.len() != attr.size() {
        return Err(CodecError::UnexpectedInputSize {
            name: attr.name().to_string(),
            expected: attr.size(),
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn encode_attr_type(attr: &AttrDescriptor, value: &AttrValue) -> Result<Vec<u8>, CodecError> {
    if let Some(callback) = &attr.encode_type_callback {
        return callback(value).map_err(|reason| CodecError::TypeCodec {
            name: attr.name().to_string(),
            reason,
        });
    }

    match &attr.kind {
        AttrKind::Bytes => value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| type_mismatch(attr, "bytes")),
        AttrKind::Int(endianness) => {
            let v = value.as_int().ok_or_else(|| type_mismatch(attr, "int"))?;
            Ok(encode_int(v, attr.size(), *endianness))
        }
        AttrKind::Str => value
            .as_str()
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| type_mismatch(attr, "string")),
        AttrKind::Custom => Err(CodecError::TypeCodec {
            name: attr.name().to_string(),
            reason: "custom attribute has no encode callback".to_string(),
        }),
    }
}

fn decode_attr_type(attr: &AttrDescriptor, bytes: &[u8]) -> Result<AttrValue, CodecError> {
    if let Some(callback) = &attr.decode_type_callback {
        return callback(bytes).map_err(|reason| CodecError::TypeCodec {
            name: attr.name().to_string(),
            reason,
        });
    }

    match &attr.kind {
        AttrKind::Bytes => Ok(AttrValue::Bytes(bytes.to_vec())),
        AttrKind::Int(endianness) => Ok(AttrValue::Int(decode_int(bytes, *endianness))),
        AttrKind::Str => std::str::from_utf8(bytes)
            .map(|s| AttrValue::Str(s.to_string()))
            .map_err(|e| CodecError::TypeCodec {
                name: attr.name().to_string(),
                reason: e.to_string(),
            }),
        AttrKind::Custom => Err(CodecError::TypeCodec {
            name: attr.name().to_string(),
            reason: "custom attribute has no decode callback".to_string(),
        }),
    }
}

fn type_mismatch(attr: &AttrDescriptor, expected: &str) -> CodecError {
    CodecError::TypeCodec {
        name: attr.name().to_string(),
        reason: format!("expected a {expected} value"),
    }
}

fn encode_int(value: u64, size: usize, endianness: Endianness) -> Vec<u8> {
    let full = value.to_be_bytes();
    let be = full[8 - size.min(8)..].to_vec();
    match endianness {
        Endianness::Big => be,
        Endianness::Little => be.into_iter().rev().collect(),
    }
}

fn decode_int(bytes: &[u8], endianness: Endianness) -> u64 {
    let mut ordered = bytes.to_vec();
    if endianness == Endianness::Little {
        ordered.reverse();
    }
    let mut buf = [0u8; 8];
    let take = ordered.len().min(8);
    buf[8 - take..].copy_from_slice(&ordered[ordered.len() - take..]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{bytes_attr, int_attr, variable_bytes_attr, default_parsing_callback};

    fn fixed_scheme() -> Scheme {
        let headers = vec![int_attr("id", 2).unwrap(), bytes_attr("payload", 3).unwrap()];
        Scheme::with_layers(vec![crate::layer::Layer::new(headers, vec![]).unwrap()], HashMap::new())
            .unwrap()
    }

    #[test]
    fn round_trips_a_fixed_size_layer() {
        let scheme = fixed_scheme();
        let serializer = Serializer::new(scheme);

        let mut frame = PreEncodeFrame::new(1);
        frame.push(0, AttrValue::Int(7));
        frame.push(0, AttrValue::Bytes(vec![1, 2, 3]));

        let bytes = serializer.encode(&frame).unwrap();
        assert_eq!(bytes, vec![0, 7, 1, 2, 3]);

        let (decoded, meta) = serializer.decode(&bytes).unwrap();
        assert!(meta.redundant_bytes.is_empty());
        assert_eq!(decoded.get("id").unwrap().as_int(), Some(7));
        assert_eq!(decoded.get("payload").unwrap().as_bytes(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn resolves_variable_length_body_from_a_length_dependency() {
        let headers = vec![
            int_attr("len", 1).unwrap(),
            variable_bytes_attr("body", default_parsing_callback()).unwrap(),
        ];
        let layer = crate::layer::Layer::new(headers, vec![]).unwrap();
        let mut deps = HashMap::new();
        let mut entry = crate::scheme::DependencyEntry::new();
        entry.insert(0, vec!["len".to_string()]);
        deps.insert("body".to_string(), entry);

        let scheme = Scheme::with_layers(vec![layer], deps).unwrap();
        let serializer = Serializer::new(scheme);

        let mut frame = PreEncodeFrame::new(1);
        frame.push(0, AttrValue::Int(3));
        frame.push(0, AttrValue::Bytes(vec![9, 9, 9]));
        let bytes = serializer.encode(&frame).unwrap();
        assert_eq!(bytes, vec![3, 9, 9, 9]);

        let (decoded, _) = serializer.decode(&bytes).unwrap();
        assert_eq!(decoded.get("body").unwrap().as_bytes(), Some(&[9, 9, 9][..]));
    }

    #[test]
    fn header_and_trailer_layers_nest_outer_to_inner() {
        // outer layer (index 1): header "magic" + trailer "crc"
        // inner layer (index 0): header "seq"
        let outer = crate::layer::Layer::new(
            vec![bytes_attr("magic", 1).unwrap()],
            vec![bytes_attr("crc", 1).unwrap()],
        )
        .unwrap();
        let inner = crate::layer::Layer::new(vec![bytes_attr("seq", 1).unwrap()], vec![]).unwrap();

        let scheme = Scheme::with_layers(vec![inner, outer], HashMap::new()).unwrap();
        let serializer = Serializer::new(scheme);

        let mut frame = PreEncodeFrame::new(2);
        frame.push(0, AttrValue::Bytes(vec![0x42])); // seq
        frame.push(1, AttrValue::Bytes(vec![0xAA])); // magic
        frame.push(1, AttrValue::Bytes(vec![0xFF])); // crc

        let bytes = serializer.encode(&frame).unwrap();
        // magic (outer header) | seq (inner header) | crc (outer trailer)
        assert_eq!(bytes, vec![0xAA, 0x42, 0xFF]);

        let (decoded, _) = serializer.decode(&bytes).unwrap();
        assert_eq!(decoded.get("magic").unwrap().as_bytes(), Some(&[0xAA][..]));
        assert_eq!(decoded.get("seq").unwrap().as_bytes(), Some(&[0x42][..]));
        assert_eq!(decoded.get("crc").unwrap().as_bytes(), Some(&[0xFF][..]));
    }

    #[test]
    fn a_layer_with_multiple_trailers_round_trips_each_to_its_own_attribute() {
        let layer = crate::layer::Layer::new(
            vec![],
            vec![bytes_attr("first", 1).unwrap(), bytes_attr("second", 1).unwrap()],
        )
        .unwrap();
        let scheme = Scheme::with_layers(vec![layer], HashMap::new()).unwrap();
        let serializer = Serializer::new(scheme);

        let mut frame = PreEncodeFrame::new(1);
        frame.push(0, AttrValue::Bytes(vec![0x11])); // first
        frame.push(0, AttrValue::Bytes(vec![0x22])); // second

        let bytes = serializer.encode(&frame).unwrap();
        assert_eq!(bytes, vec![0x11, 0x22]);

        let (decoded, _) = serializer.decode(&bytes).unwrap();
        assert_eq!(decoded.get("first").unwrap().as_bytes(), Some(&[0x11][..]));
        assert_eq!(decoded.get("second").unwrap().as_bytes(), Some(&[0x22][..]));
    }

    #[test]
    fn input_exhausted_is_reported_with_the_attribute_name() {
        let serializer = Serializer::new(fixed_scheme());
        let err = serializer.decode(&[0, 7, 1]).unwrap_err();
        assert_eq!(
            err,
            CodecError::InputExhausted {
                name: "payload".to_string(),
                needed: 2,
            }
        );
    }
}
