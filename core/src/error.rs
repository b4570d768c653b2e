use thiserror::Error;

/// Every fatal outcome `encode_frame`/`decode_stream` can surface to the caller.
///
/// No partial payload is ever returned alongside one of these: either the full
/// verified payload or an error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("compressed stream is corrupt")]
    CorruptCompression,

    #[error("Reed-Solomon block {block_index} has {error_count} errors, exceeding the correction budget")]
    UncorrectableFec { block_index: usize, error_count: usize },

    #[error("AEAD tag verification failed")]
    AuthFailed,

    #[error("CRC-32 mismatch over header+body")]
    BadCrc,

    #[error("no preamble detected before timeout")]
    NoPreamble,

    #[error("pilot-derived residual phase exceeded the lock budget")]
    SyncLost,

    #[error("decode cancelled by caller")]
    Cancelled,

    #[error("audio source exhausted before the frame completed")]
    IoExhausted,
}

pub type Result<T> = std::result::Result<T, CodecError>;
