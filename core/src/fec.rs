//! FEC codec (spec §4.3): Reed-Solomon(255,223) over the concatenated
//! header‖body‖trailer byte stream.
//!
//! Kept the teacher's `FecEncoder`/`FecDecoder` struct-wrapper shape from the
//! original `reed_solomon_erasure`-backed module, but the bodies now call
//! into [`crate::rs`]'s hand-rolled Berlekamp-Massey decoder, since no crate
//! in the retrieval pack corrects errors at unknown positions (only
//! erasures at caller-supplied positions).

use crate::error::Result;
use crate::rs;

#[derive(Debug, Default, Clone, Copy)]
pub struct FecEncoder;

#[derive(Debug, Default, Clone, Copy)]
pub struct FecDecoder;

impl FecEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encodes `data` as a sequence of RS(255,223) blocks, zero-padding the
    /// final block. Returns `(codewords, pad_len)`.
    pub fn encode(&self, data: &[u8]) -> (Vec<u8>, u8) {
        rs::encode_stream(data)
    }
}

impl FecDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes a sequence of RS(255,223) blocks, correcting up to 16 byte
    /// errors per block and stripping the trailing zero padding.
    pub fn decode(&self, codewords: &[u8], pad_len: u8) -> Result<Vec<u8>> {
        rs::decode_stream(codewords, pad_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_decoder_round_trip() {
        let encoder = FecEncoder::new();
        let decoder = FecDecoder::new();
        let data = b"Hello, Reed-Solomon wrapper".to_vec();
        let (encoded, pad_len) = encoder.encode(&data);
        assert_eq!(encoded.len() % rs::RS_TOTAL_BYTES, 0);
        let decoded = decoder.decode(&encoded, pad_len).unwrap();
        assert_eq!(decoded, data);
    }
}
