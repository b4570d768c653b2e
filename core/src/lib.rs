//! Acoustic OFDM modem codec: encodes binary payloads into 48 kHz audio
//! waveforms in the 18-22 kHz near-ultrasonic band and decodes them back,
//! with optional Huffman compression and an AES-256-GCM/RSA-OAEP crypto
//! envelope.
//!
//! The pipeline runs `payload -> Huffman -> crypto envelope -> framing ->
//! Reed-Solomon FEC -> symbol framer -> 64-QAM -> OFDM -> samples` on
//! encode, and its mirror on decode. Every stage is its own module; this
//! crate root only declares them and re-exports the collaborator traits and
//! top-level functions a caller needs.

pub mod audio;
pub mod config;
pub mod crypto;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fec;
pub mod framing;
pub mod huffman;
pub mod ofdm;
pub mod qam;
pub mod rs;
pub mod sync;
pub mod trace;

pub use audio::{AudioSink, AudioSource, MemorySink, MemorySource};
pub use config::{Config, FecScheme, SubcarrierLayout};
pub use crypto::{KeyProvider, StaticKeyProvider};
pub use decoder::{decode_stream, detect};
pub use encoder::encode_frame;
pub use error::{CodecError, Result};
pub use trace::{EventKind, LogTraceSink, NullTraceSink, TraceSink};
