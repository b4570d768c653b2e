//! Top-level encode pipeline (spec §2 send path):
//! `payload -> Huffman -> crypto envelope -> framing -> FEC -> symbol framer
//! -> QAM -> OFDM -> samples`.
//!
//! The orchestration role mirrors the teacher's original `Encoder`: one
//! function strings the per-stage modules together in order. Every stage it
//! calls into is new, but the "thin conductor over small focused modules"
//! shape survives.

use rustfft::num_complex::Complex32;

use crate::config::Config;
use crate::crypto::{self, KeyProvider};
use crate::error::{CodecError, Result};
use crate::fec::FecEncoder;
use crate::framing::{self, SymbolFramer, Trailer};
use crate::huffman;
use crate::ofdm::OfdmCodec;
use crate::qam;
use crate::sync;
use crate::trace::{EventKind, TraceSink};

/// Encodes `payload` into a complete waveform at `cfg.sample_rate`: start
/// tone, OFDM preamble, data symbols, end tone.
pub fn encode_frame(
    payload: &[u8],
    cfg: &Config,
    keys: Option<&dyn KeyProvider>,
    trace: &dyn TraceSink,
) -> Result<Vec<f32>> {
    let layout = cfg.validate()?;
    let codec = OfdmCodec::new(cfg, &layout);

    let body_after_compression = if cfg.compress { huffman::encode(payload) } else { payload.to_vec() };

    let (body, wrapped_key, nonce, trailer) = if cfg.encrypt {
        let keys = keys.ok_or_else(|| {
            CodecError::InvalidConfig("encrypt=true requires a KeyProvider".into())
        })?;
        let recipient_public = keys.recipient_public_key()?;
        let session_key = crypto::generate_session_key();
        let nonce = crypto::generate_nonce();
        let (ciphertext, tag) = crypto::aead_seal(&session_key, &nonce, &body_after_compression)?;
        let wrapped_key = crypto::wrap_key(&recipient_public, &session_key)?;
        (ciphertext, Some(wrapped_key), Some(nonce), Trailer::Aead(tag))
    } else {
        (body_after_compression, None, None, Trailer::Crc)
    };

    let frame_bytes =
        framing::assemble(&body, cfg.compress, wrapped_key.as_deref(), nonce.as_ref(), trailer);

    let (fec_bytes, _pad_len) = FecEncoder::new().encode(&frame_bytes);

    let symbol_framer = SymbolFramer::new(layout.bytes_per_symbol())?;
    let symbol_chunks = symbol_framer.frame(&fec_bytes)?;

    let mut samples = sync::generate_start_tone(cfg.sample_rate, 1.0);
    samples.extend(codec.preamble_waveform());
    trace.trace(EventKind::PreambleDetected, "preamble emitted");

    let k = layout.data_bin_count();
    for chunk in &symbol_chunks {
        let groups = qam::bytes_to_groups(chunk, k);
        let constellation: Vec<Complex32> = groups.iter().map(|&g| qam::map_symbol(g)).collect();
        samples.extend(codec.modulate_symbol(&constellation)?);
    }
    trace.trace(
        EventKind::SymbolDecoded,
        &format!("{} data symbols emitted", symbol_chunks.len()),
    );

    samples.extend(sync::generate_end_tone(cfg.sample_rate, 1.0));
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StaticKeyProvider;
    use crate::trace::NullTraceSink;

    #[test]
    fn encode_produces_start_preamble_data_and_end_tone() {
        let cfg = Config::default();
        let layout = cfg.validate().unwrap();
        let codec = OfdmCodec::new(&cfg, &layout);
        let samples = encode_frame(b"hi", &cfg, None, &NullTraceSink).unwrap();

        let start_tone_len = (cfg.sample_rate * 200) / 1000;
        let end_tone_len = (cfg.sample_rate * 150) / 1000;
        let preamble_len = 2 * codec.symbol_len();
        assert!(samples.len() > start_tone_len + preamble_len + end_tone_len);
    }

    #[test]
    fn encrypted_encode_requires_key_provider() {
        let cfg = Config { encrypt: true, ..Config::default() };
        let err = encode_frame(b"secret", &cfg, None, &NullTraceSink).unwrap_err();
        assert!(matches!(err, CodecError::InvalidConfig(_)));
    }

    #[test]
    fn encrypted_encode_succeeds_with_key_provider() {
        let cfg = Config { encrypt: true, ..Config::default() };
        let (own_private, _own_public) = crypto::generate_keypair().unwrap();
        let (_recipient_private, recipient_public) = crypto::generate_keypair().unwrap();
        let keys = StaticKeyProvider { recipient_public, own_private };
        let samples = encode_frame(b"secret payload", &cfg, Some(&keys), &NullTraceSink).unwrap();
        assert!(!samples.is_empty());
    }

    #[test]
    fn empty_payload_still_produces_a_frame() {
        let cfg = Config::default();
        let samples = encode_frame(b"", &cfg, None, &NullTraceSink).unwrap();
        assert!(!samples.is_empty());
    }
}
