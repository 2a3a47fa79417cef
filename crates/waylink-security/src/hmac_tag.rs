//! See [`HmacMeasure`].

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use waylink_core::attr::bytes_attr;
use waylink_core::{AttrValue, CodecError, Frame, Meta, PreEncodeFrame, Serializer};

use crate::measure::{reject, DecodedLayers, EncodedLayers, Measure};
use crate::SecurityError;

type HmacSha256 = Hmac<Sha256>;

const MAC_SIZE: usize = 32;

/// Integrity measure: an HMAC-SHA256 digest over a configurable set of
/// attributes, carried in a trailing all-trailer layer of its own so it sits
/// outermost on the wire regardless of how the rest of the scheme nests.
///
/// `target` maps a layer index to the positional indices (within that
/// layer's header+trailer attribute order) of the attributes to authenticate.
pub struct HmacMeasure {
    target: BTreeMap<usize, Vec<usize>>,
    enc_key: Vec<u8>,
    dec_key: Vec<u8>,
    mac_layer: OnceLock<usize>,
}

impl HmacMeasure {
    /// Builds a measure authenticating the given `(layer_index, attr_indices)` pairs.
    #[must_use]
    pub fn new(target: BTreeMap<usize, Vec<usize>>, enc_key: Vec<u8>, dec_key: Vec<u8>) -> Self {
        Self {
            target,
            enc_key,
            dec_key,
            mac_layer: OnceLock::new(),
        }
    }

    fn digest(&self, key: &[u8], data: &[Vec<Vec<u8>>]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
        for (&layer_idx, attr_idxs) in &self.target {
            for &attr_idx in attr_idxs {
                mac.update(&data[layer_idx][attr_idx]);
            }
        }
        mac.finalize().into_bytes().to_vec()
    }

    fn encode_bytes(&self, data: &mut EncodedLayers) {
        let mac_layer = *self.mac_layer.get().expect("apply ran");
        let digest = self.digest(&self.enc_key, data);
        data[mac_layer][0] = digest;
    }

    fn decode_bytes(&self, data: &mut DecodedLayers) -> Result<(), CodecError> {
        let mac_layer = *self.mac_layer.get().expect("apply ran");
        let encoded: EncodedLayers = data
            .iter()
            .map(|layer| layer.values().cloned().collect())
            .collect();
        let expected = self.digest(&self.dec_key, &encoded);

        let (_, actual) = data[mac_layer].get_index(0).ok_or_else(|| reject("hmac"))?;
        if *actual != expected {
            return Err(reject("hmac"));
        }
        Ok(())
    }
}

impl Measure for HmacMeasure {
    fn name(&self) -> &'static str {
        "hmac"
    }

    fn apply(self: Arc<Self>, serializer: &mut Serializer) -> Result<(), SecurityError> {
        let layer = serializer.add_layer(vec![], vec![bytes_attr("hmac", MAC_SIZE as i64)?])?;
        let _ = self.mac_layer.set(layer);
        Ok(())
    }

    fn encode_callback(self: Arc<Self>) -> waylink_core::serializer::EncodeCallback {
        Arc::new(move |data| self.encode_bytes(data))
    }

    fn decode_callback(self: Arc<Self>) -> waylink_core::serializer::DecodeCallback {
        Arc::new(move |data| self.decode_bytes(data))
    }

    fn process_send(&self, frame: &mut PreEncodeFrame, _meta: &Meta) {
        let mac_layer = *self.mac_layer.get().expect("apply ran");
        frame.push(mac_layer, AttrValue::Bytes(vec![0u8; MAC_SIZE]));
    }

    fn process_recv(&self, _frame: &Frame, _meta: &mut Meta) {}
}
