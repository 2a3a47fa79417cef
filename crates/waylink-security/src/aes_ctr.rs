//! See [`AesCtrMeasure`].

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use aes::Aes128;
use cipher::generic_array::GenericArray;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use rand::RngCore;

use waylink_core::attr::bytes_attr;
use waylink_core::{AttrValue, CodecError, Frame, Meta, PreEncodeFrame, Serializer};

use crate::measure::{reject, DecodedLayers, EncodedLayers, Measure};
use crate::SecurityError;

type Aes128Ctr = Ctr128BE<Aes128>;

const IV_SIZE: usize = 16;
const KEY_SIZE: usize = 16;

/// Confidentiality measure: AES-128 in CTR mode over a configurable set of
/// attributes, with a fresh 16-byte IV per packet carried in a trailing
/// header of the highest-indexed targeted layer.
///
/// `target` maps a layer index to the positional indices (within that
/// layer's header+trailer attribute order) of the attributes to encrypt; the
/// IV attribute is appended to the layer with the greatest index in
/// `target`, which must therefore be a header-only layer (true of every
/// overlay layer in `waylink-net`) so a plain positional append lines up
/// with where `apply` inserted the attribute.
pub struct AesCtrMeasure {
    target: BTreeMap<usize, Vec<usize>>,
    enc_key: [u8; KEY_SIZE],
    dec_key: [u8; KEY_SIZE],
    iv_layer: usize,
    iv_attr_index: OnceLock<usize>,
    target_sizes: OnceLock<Vec<(usize, usize, usize)>>,
}

impl AesCtrMeasure {
    /// Builds a measure targeting the given `(layer_index, attr_indices)`
    /// pairs, symmetric if `enc_key == dec_key`.
    ///
    /// # Panics
    ///
    /// Panics if `target` is empty.
    #[must_use]
    pub fn new(target: BTreeMap<usize, Vec<usize>>, enc_key: [u8; KEY_SIZE], dec_key: [u8; KEY_SIZE]) -> Self {
        let iv_layer = *target.keys().max().expect("target must not be empty");
        Self {
            target,
            enc_key,
            dec_key,
            iv_layer,
            iv_attr_index: OnceLock::new(),
            target_sizes: OnceLock::new(),
        }
    }

    fn encode_bytes(&self, data: &mut EncodedLayers) {
        let iv_index = *self.iv_attr_index.get().expect("apply ran");
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut cipher = Aes128Ctr::new(
            GenericArray::from_slice(&self.enc_key),
            GenericArray::from_slice(&iv),
        );
        let sizes = self.target_sizes.get().expect("apply ran");

        let mut plaintext = Vec::new();
        for &(layer_idx, attr_idx, _) in sizes {
            plaintext.extend_from_slice(&data[layer_idx][attr_idx]);
        }
        let mut ciphertext = plaintext;
        cipher.apply_keystream(&mut ciphertext);

        let mut offset = 0;
        for &(layer_idx, attr_idx, size) in sizes {
            data[layer_idx][attr_idx] = ciphertext[offset..offset + size].to_vec();
            offset += size;
        }
        data[self.iv_layer][iv_index] = iv.to_vec();
    }

    fn decode_bytes(&self, data: &mut DecodedLayers) -> Result<(), CodecError> {
        let iv_index = *self.iv_attr_index.get().expect("apply ran");
        let sizes = self.target_sizes.get().expect("apply ran");

        let iv_bytes = data[self.iv_layer]
            .get_index(iv_index)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| reject("aes-ctr"))?;
        if iv_bytes.len() != IV_SIZE {
            return Err(reject("aes-ctr"));
        }
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&iv_bytes);

        let mut cipher = Aes128Ctr::new(
            GenericArray::from_slice(&self.dec_key),
            GenericArray::from_slice(&iv),
        );

        let mut ciphertext = Vec::new();
        for &(layer_idx, attr_idx, _) in sizes {
            let (_, bytes) = data[layer_idx].get_index(attr_idx).ok_or_else(|| reject("aes-ctr"))?;
            ciphertext.extend_from_slice(bytes);
        }
        let mut plaintext = ciphertext;
        cipher.apply_keystream(&mut plaintext);

        let mut offset = 0;
        for &(layer_idx, attr_idx, size) in sizes {
            if let Some((_, slot)) = data[layer_idx].get_index_mut(attr_idx) {
                *slot = plaintext[offset..offset + size].to_vec();
            }
            offset += size;
        }
        Ok(())
    }
}

impl Measure for AesCtrMeasure {
    fn name(&self) -> &'static str {
        "aes-ctr"
    }

    fn apply(self: Arc<Self>, serializer: &mut Serializer) -> Result<(), SecurityError> {
        let mut sizes = Vec::new();
        for (&layer_idx, attr_idxs) in &self.target {
            let layer = &serializer.encoding_scheme().layers()[layer_idx];
            for &attr_idx in attr_idxs {
                let attr = layer.attrs().nth(attr_idx).expect("target attribute index in range");
                sizes.push((layer_idx, attr_idx, attr.size()));
            }
        }
        let _ = self.target_sizes.set(sizes);

        let iv_index = serializer.encoding_scheme().layers()[self.iv_layer].headers().len();
        let _ = self.iv_attr_index.set(iv_index);
        serializer.add_attr(bytes_attr("ctr", IV_SIZE as i64)?, self.iv_layer, None)?;

        Ok(())
    }

    fn encode_callback(self: Arc<Self>) -> waylink_core::serializer::EncodeCallback {
        Arc::new(move |data| self.encode_bytes(data))
    }

    fn decode_callback(self: Arc<Self>) -> waylink_core::serializer::DecodeCallback {
        Arc::new(move |data| self.decode_bytes(data))
    }

    fn process_send(&self, frame: &mut PreEncodeFrame, _meta: &Meta) {
        frame.push(self.iv_layer, AttrValue::Bytes(vec![0u8; IV_SIZE]));
    }

    fn process_recv(&self, _frame: &Frame, _meta: &mut Meta) {}
}
