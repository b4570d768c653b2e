//! Top-level decode pipeline (spec §2 receive path): coarse/fine sync, CFO
//! and channel estimation, per-symbol demodulation, then the send path's
//! stages run in reverse: symbol framer -> FEC -> framing -> crypto envelope
//! -> Huffman -> payload.
//!
//! The `Stream` helper plays the role the teacher's decoder gave to raw
//! slice indexing, generalized to pull from an [`AudioSource`] lazily instead
//! of requiring the whole waveform up front (spec §4.9/§6: decoding is a
//! continuous-listen operation bounded by an idle timeout, not a one-shot
//! buffer decode).

use std::time::Instant;

use crate::audio::AudioSource;
use crate::config::Config;
use crate::crypto::{self, KeyProvider};
use crate::error::{CodecError, Result};
use crate::fec::FecDecoder;
use crate::framing::{self, SymbolFramer};
use crate::huffman;
use crate::ofdm::{self, OfdmCodec};
use crate::qam;
use crate::rs;
use crate::sync;
use crate::trace::{EventKind, TraceSink};

const PULL_CHUNK: usize = 4096;
const SCHMIDL_COX_THRESHOLD: f32 = 0.75;
const END_TONE_CHECK_RATIO: f32 = 0.25;

/// Rolling sample buffer fed lazily from an [`AudioSource`], with the idle
/// timeout and cancellation checks spec §7 requires living in one place.
struct Stream<'a> {
    source: &'a mut dyn AudioSource,
    cancel: &'a dyn Fn() -> bool,
    cancel_check_interval_chunks: usize,
    buffer: Vec<f32>,
    consumed: u64,
    pulls_since_check: usize,
}

impl<'a> Stream<'a> {
    fn new(source: &'a mut dyn AudioSource, cancel: &'a dyn Fn() -> bool, cancel_check_interval_chunks: usize) -> Self {
        Self {
            source,
            cancel,
            cancel_check_interval_chunks: cancel_check_interval_chunks.max(1),
            buffer: Vec::new(),
            consumed: 0,
            pulls_since_check: 0,
        }
    }

    /// Pulls from the source until the buffer holds at least `n` unconsumed
    /// samples, or the source is exhausted.
    fn ensure(&mut self, n: usize) -> Result<()> {
        while self.buffer.len() < n {
            let chunk = self.source.pull(PULL_CHUNK);
            if chunk.is_empty() {
                return Err(CodecError::IoExhausted);
            }
            self.buffer.extend(chunk);
            self.pulls_since_check += 1;
            if self.pulls_since_check >= self.cancel_check_interval_chunks {
                self.pulls_since_check = 0;
                if (self.cancel)() {
                    return Err(CodecError::Cancelled);
                }
            }
        }
        Ok(())
    }

    fn window(&self) -> &[f32] {
        &self.buffer
    }

    fn consume(&mut self, n: usize) {
        self.buffer.drain(..n);
        self.consumed += n as u64;
    }
}

/// Decodes one frame from `source`, per spec §4.9: coarse-then-fine sync,
/// CFO/channel estimation, symbol-by-symbol demodulation, then the inverse
/// of [`crate::encoder::encode_frame`]'s pipeline.
pub fn decode_stream(
    source: &mut dyn AudioSource,
    cfg: &Config,
    keys: Option<&dyn KeyProvider>,
    trace: &dyn TraceSink,
    cancel: &dyn Fn() -> bool,
) -> Result<Vec<u8>> {
    let layout = cfg.validate()?;
    let codec = OfdmCodec::new(cfg, &layout);
    let mut stream = Stream::new(source, cancel, cfg.cancel_check_interval_chunks);

    let deadline = Instant::now() + std::time::Duration::from_millis(cfg.idle_timeout_ms);
    let min_window = codec.fft_size() * 2;
    let coarse_start = loop {
        if Instant::now() >= deadline {
            return Err(CodecError::NoPreamble);
        }
        stream.ensure(min_window)?;
        match ofdm::detect_coarse(stream.window(), codec.fft_size(), SCHMIDL_COX_THRESHOLD) {
            Some(offset) => break offset,
            None => {
                // Keep only trailing half-symbol context; the rest has been
                // scanned with no hit and would only be rescanned otherwise.
                let keep = codec.fft_size() / 2;
                if stream.window().len() > keep {
                    let drop_n = stream.window().len() - keep;
                    stream.consume(drop_n);
                }
                stream.ensure(min_window)?;
            }
        }
    };
    trace.trace(EventKind::PreambleDetected, &format!("coarse offset {coarse_start}"));

    let preamble_total_len = 2 * codec.symbol_len();
    stream.ensure(coarse_start + preamble_total_len + codec.cp_len())?;

    let cfo_epsilon = ofdm::estimate_cfo(stream.window(), coarse_start, codec.fft_size());

    let approx_symbol2_body_start = coarse_start + codec.cp_len() + codec.symbol_len();
    let symbol2_body_start = ofdm::fine_timing(
        stream.window(),
        approx_symbol2_body_start,
        codec.preamble2_body(),
        codec.cp_len(),
    );
    let symbol2_with_cp_start = symbol2_body_start.saturating_sub(codec.cp_len());
    stream.ensure(symbol2_with_cp_start + codec.symbol_len())?;
    let channel = codec.estimate_channel(&stream.window()[symbol2_with_cp_start..])?;
    trace.trace(EventKind::ChannelEstimated, "channel estimated from preamble symbol 2");

    stream.consume(symbol2_with_cp_start + codec.symbol_len());
    let mut sample_offset = (symbol2_with_cp_start + codec.symbol_len()) as u64;

    let mut collected_bytes: Vec<u8> = Vec::new();
    let mut declared_symbols: Option<usize> = None;
    let mut symbols_decoded = 0usize;
    let symbol_framer = SymbolFramer::new(layout.bytes_per_symbol())?;

    loop {
        if let Some(total) = declared_symbols {
            if symbols_decoded >= total {
                break;
            }
        }
        stream.ensure(codec.symbol_len())?;
        let points = codec.demodulate_symbol(stream.window(), &channel, cfo_epsilon, sample_offset)?;
        let groups: Vec<u8> = points.iter().map(|&p| qam::demap_symbol(p)).collect();
        collected_bytes.extend(qam::groups_to_bytes(&groups));
        stream.consume(codec.symbol_len());
        sample_offset += codec.symbol_len() as u64;
        symbols_decoded += 1;
        trace.trace(EventKind::SymbolDecoded, &format!("symbol {symbols_decoded} decoded"));

        if declared_symbols.is_none() && collected_bytes.len() >= 2 {
            declared_symbols = Some(symbol_framer.declared_symbol_count(&collected_bytes)?);
        }
    }

    let deframed = symbol_framer.deframe(&collected_bytes)?;
    // `SymbolFramer::frame` pads the last symbol with 0x55 up to a whole
    // number of symbols, which can leave trailing bytes past the true
    // RS-codeword length; `framing::parse` tolerates trailing bytes past
    // what its own length field specifies, so truncating down to a whole
    // number of RS blocks here is enough to hand FecDecoder exactly what it
    // expects.
    let rs_whole_blocks = (deframed.len() / rs::RS_TOTAL_BYTES) * rs::RS_TOTAL_BYTES;
    let fec_bytes = &deframed[..rs_whole_blocks];

    let frame_bytes = FecDecoder::new().decode(fec_bytes, 0)?;
    trace.trace(EventKind::FecCorrected, "FEC decode complete");

    let parsed = framing::parse(&frame_bytes)?;

    let plaintext = if parsed.encrypted {
        let keys = keys.ok_or_else(|| {
            CodecError::InvalidConfig("encrypted frame requires a KeyProvider".into())
        })?;
        let own_private = keys.own_private_key()?;
        let wrapped_key = parsed
            .wrapped_key
            .as_deref()
            .ok_or(CodecError::AuthFailed)?;
        let session_key = crypto::unwrap_key(&own_private, wrapped_key)?;
        let nonce = parsed.nonce.ok_or(CodecError::AuthFailed)?;
        let tag = parsed.tag.ok_or(CodecError::AuthFailed)?;
        crypto::aead_open(&session_key, &nonce, &parsed.body, &tag)?
    } else {
        parsed.body
    };

    let payload = if parsed.compressed { huffman::decode(&plaintext)? } else { plaintext };

    // Best-effort end-tone check: informative only, a frame with a verified
    // CRC/AEAD tag is already trustworthy without it.
    let tail_len = (cfg.sample_rate as f32 * (sync::END_TONE_MS as f32 / 1000.0) * (1.0 + END_TONE_CHECK_RATIO)) as usize;
    let _ = stream.ensure(tail_len);
    if sync::detect_tone(stream.window(), cfg.sample_rate, sync::END_TONE_HZ, 0.1) {
        trace.trace(EventKind::SymbolDecoded, "end tone confirmed");
    }

    Ok(payload)
}

/// Listens on `source` until either the OFDM preamble is detected (`true`)
/// or `timeout_ms` elapses with no detection (`false`). Only a bad `cfg`
/// can still surface as an error.
pub fn detect(source: &mut dyn AudioSource, cfg: &Config, timeout_ms: u64) -> Result<bool> {
    let layout = cfg.validate()?;
    let codec = OfdmCodec::new(cfg, &layout);
    let cancel_fn: &dyn Fn() -> bool = &|| false;
    let mut stream = Stream::new(source, cancel_fn, cfg.cancel_check_interval_chunks);

    let deadline = Instant::now() + std::time::Duration::from_millis(timeout_ms);
    let min_window = codec.fft_size() * 2;
    loop {
        if Instant::now() >= deadline {
            return Ok(false);
        }
        if stream.ensure(min_window).is_err() {
            return Ok(false);
        }
        if ofdm::detect_coarse(stream.window(), codec.fft_size(), SCHMIDL_COX_THRESHOLD).is_some() {
            return Ok(true);
        }
        let keep = codec.fft_size() / 2;
        if stream.window().len() > keep {
            let drop_n = stream.window().len() - keep;
            stream.consume(drop_n);
        }
    }
}
